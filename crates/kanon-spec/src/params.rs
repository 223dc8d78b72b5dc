//! Parameter extraction and coercion.
//!
//! Parameters travel as strings. Before schema validation they are turned
//! into JSON values according to the schema's declared type, so that
//! `?limit=10` validates against `{"type": "integer"}`.

use http::HeaderMap;
use serde_json::{Number, Value};

/// Converts raw parameter values into a JSON value shaped by `schema`.
///
/// Array schemas accept either repeated values or a single comma-separated
/// value. Values that cannot be converted are left as strings so the schema
/// reports the type mismatch.
pub fn coerce(values: &[&str], schema: &Value) -> Value {
    match schema_type(schema) {
        Some("array") => {
            let items = schema.get("items").unwrap_or(&Value::Null);
            let parts: Vec<&str> = if values.len() == 1 {
                values[0].split(',').collect()
            } else {
                values.to_vec()
            };
            Value::Array(parts.iter().map(|part| coerce_scalar(part, items)).collect())
        }
        _ => values
            .first()
            .map_or(Value::Null, |value| coerce_scalar(value, schema)),
    }
}

fn coerce_scalar(raw: &str, schema: &Value) -> Value {
    match schema_type(schema) {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some("object") => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => Value::String(raw.to_string()),
    }
}

/// The declared `type`, looking through a nullable `anyOf` wrapper.
fn schema_type(schema: &Value) -> Option<&str> {
    if let Some(kind) = schema.get("type").and_then(Value::as_str) {
        return Some(kind);
    }

    schema
        .get("anyOf")
        .and_then(Value::as_array)
        .and_then(|variants| {
            variants
                .iter()
                .filter_map(|v| v.get("type").and_then(Value::as_str))
                .find(|kind| *kind != "null")
        })
}

/// Parses a raw query string into ordered name/value pairs.
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// All values of query parameter `name`, in order.
pub fn query_values<'a>(query: &'a [(String, String)], name: &str) -> Vec<&'a str> {
    query
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .collect()
}

/// Cookies from every `Cookie` header, in order.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

/// The value of cookie `name`, if sent.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    parse_cookies(headers)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce(&["42"], &json!({"type": "integer"})), json!(42));
        assert_eq!(coerce(&["4.2"], &json!({"type": "integer"})), json!("4.2"));
    }

    #[test]
    fn test_coerce_number_and_boolean() {
        assert_eq!(coerce(&["1.5"], &json!({"type": "number"})), json!(1.5));
        assert_eq!(coerce(&["true"], &json!({"type": "boolean"})), json!(true));
        assert_eq!(coerce(&["yes"], &json!({"type": "boolean"})), json!("yes"));
    }

    #[test]
    fn test_coerce_array_forms() {
        let schema = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(coerce(&["1,2,3"], &schema), json!([1, 2, 3]));
        assert_eq!(coerce(&["1", "2"], &schema), json!([1, 2]));
    }

    #[test]
    fn test_coerce_nullable_wrapper() {
        let schema = json!({"anyOf": [{"type": "integer"}, {"type": "null"}]});
        assert_eq!(coerce(&["7"], &schema), json!(7));
    }

    #[test]
    fn test_coerce_untyped_is_string() {
        assert_eq!(coerce(&["7"], &json!({})), json!("7"));
    }

    #[test]
    fn test_parse_query_decodes() {
        let query = parse_query(Some("name=a%20b&tag=x&tag=y"));
        assert_eq!(query[0], ("name".to_string(), "a b".to_string()));
        assert_eq!(query_values(&query, "tag"), vec!["x", "y"]);
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.append("cookie", HeaderValue::from_static("a=1; session=\"abc\""));
        headers.append("cookie", HeaderValue::from_static("b=2"));

        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert!(cookie_value(&headers, "missing").is_none());
    }
}
