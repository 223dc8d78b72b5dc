//! Specification loading from disk or HTTP.

use std::path::Path;

use tokio::fs;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::model::Specification;

/// Document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Unknown,
}

impl Format {
    fn detect(source: &str) -> Self {
        let trimmed = source.split(['?', '#']).next().unwrap_or(source);
        let lower = trimmed.to_ascii_lowercase();
        if lower.ends_with(".json") {
            Self::Json
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Self::Yaml
        } else {
            Self::Unknown
        }
    }
}

/// Loads OpenAPI documents.
///
/// `http://` and `https://` sources are fetched, anything else is read from
/// the filesystem. JSON and YAML are both accepted.
pub struct SpecificationLoader;

impl SpecificationLoader {
    /// Load a specification from a path or `http(s)` URI.
    pub async fn load(source: &str) -> Result<Specification, LoadError> {
        let content = if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(source).await?
        } else {
            Self::read(Path::new(source)).await?
        };

        let spec = Self::parse(source, &content, Format::detect(source))?;
        info!(
            source,
            title = %spec.info.title,
            operations = spec.operation_count(),
            "loaded specification"
        );
        Ok(spec)
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Specification, LoadError> {
        Self::parse("<inline json>", json, Format::Json)
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Specification, LoadError> {
        Self::parse("<inline yaml>", yaml, Format::Yaml)
    }

    async fn read(path: &Path) -> Result<String, LoadError> {
        debug!(path = %path.display(), "reading specification from file");
        fs::read_to_string(path).await.map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn fetch(uri: &str) -> Result<String, LoadError> {
        debug!(uri, "fetching specification");

        let response = reqwest::get(uri).await.map_err(|e| LoadError::Fetch {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(LoadError::Fetch {
                uri: uri.to_string(),
                message: format!("server returned status {}", response.status()),
            });
        }

        response.text().await.map_err(|e| LoadError::Fetch {
            uri: uri.to_string(),
            message: format!("failed to read response body: {}", e),
        })
    }

    fn parse(origin: &str, content: &str, format: Format) -> Result<Specification, LoadError> {
        let parse_error = |message: String| LoadError::Parse {
            origin: origin.to_string(),
            message,
        };

        match format {
            Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Format::Unknown => serde_json::from_str(content).or_else(|json_err| {
                serde_yaml::from_str(content).map_err(|yaml_err| {
                    parse_error(format!("not JSON ({}) nor YAML ({})", json_err, yaml_err))
                })
            }),
        }
    }
}
