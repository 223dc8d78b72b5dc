//! Server list manipulation.

use tracing::debug;
use url::Url;

use crate::model::{Server, Specification};

/// Returns a copy of `spec` with `additional` appended to its server list.
///
/// Entries that are empty or do not parse as absolute URIs with a scheme and
/// authority are skipped. Relative entries such as `/v1/api` are skipped too.
/// `ws://` and `wss://` are checked as `http://` and `https://` but stored
/// as given. Appended entries are described as `additional server <index>`,
/// where the index is the entry's position in `additional`.
pub fn with_additional_servers(spec: &Specification, additional: Option<&[String]>) -> Specification {
    let mut derived = spec.clone();

    let Some(additional) = additional else {
        return derived;
    };

    for (index, candidate) in additional.iter().enumerate() {
        if candidate.trim().is_empty() {
            continue;
        }

        if !is_absolute_server_url(candidate) {
            debug!(server = %candidate, "skipping unparsable additional server");
            continue;
        }

        derived.servers.push(Server::new(
            candidate.clone(),
            Some(format!("additional server {}", index)),
        ));
    }

    derived
}

fn is_absolute_server_url(candidate: &str) -> bool {
    let normalized = if let Some(rest) = candidate.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = candidate.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        candidate.to_string()
    };

    Url::parse(&normalized)
        .map(|url| url.has_host())
        .unwrap_or(false)
}
