//! Profile manager HTTP client
//!
//! Consumes the local antidetect manager's API:
//! `GET /status`, `GET /list`, `GET /profile/start/{id}`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

/// A started profile handle, exclusively owned by one in-flight task.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub websocket_link: String,
}

/// Errors constructing the client. Everything past construction is a soft
/// failure surfaced through empty/None return values.
#[derive(Error, Debug)]
pub enum ProfileClientError {
    #[error("invalid profile manager URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

#[derive(Deserialize)]
struct StatusResponse {
    code: i64,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct StartResponse {
    data: StartedProfile,
}

#[derive(Deserialize)]
struct StartedProfile {
    websocket_link: String,
}

/// Client for the profile manager API
pub struct ProfileClient {
    base_url: Url,
    client: Client,
}

impl ProfileClient {
    /// Create a new client against the manager's base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProfileClientError> {
        let base_url = Url::parse(base_url)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileClientError::Http(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> Option<Url> {
        match self.base_url.join(path) {
            Ok(url) => Some(url),
            Err(e) => {
                error!("Invalid profile manager endpoint {}: {}", path, e);
                None
            }
        }
    }

    /// Check whether the manager is up and ready (`code == 0`).
    pub async fn is_available(&self) -> bool {
        let Some(url) = self.endpoint("status") else {
            return false;
        };

        match self.client.get(url).send().await {
            Ok(response) => match response.json::<StatusResponse>().await {
                Ok(status) => status.code == 0,
                Err(e) => {
                    error!("Error parsing status response: {}", e);
                    false
                }
            },
            Err(e) => {
                error!("Error fetching status: {}", e);
                false
            }
        }
    }

    /// List available profile ids.
    pub async fn list(&self) -> Vec<String> {
        let Some(url) = self.endpoint("list") else {
            return Vec::new();
        };

        match self.client.get(url).send().await {
            Ok(response) => match response.json::<ListResponse>().await {
                Ok(list) => {
                    debug!("Profile manager reports {} profiles", list.data.len());
                    list.data.into_keys().collect()
                }
                Err(e) => {
                    error!("Error parsing profile list: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                error!("Error fetching profiles: {}", e);
                Vec::new()
            }
        }
    }

    /// Start a profile and return its browser connection endpoint.
    pub async fn start(&self, profile_id: &str) -> Option<Profile> {
        info!("Starting profile: {}", profile_id);

        let url = self.endpoint(&format!("profile/start/{}", profile_id))?;

        match self.client.get(url).send().await {
            Ok(response) => match response.json::<StartResponse>().await {
                Ok(started) => Some(Profile {
                    id: profile_id.to_string(),
                    websocket_link: started.data.websocket_link,
                }),
                Err(e) => {
                    error!("Error parsing start response for {}: {}", profile_id, e);
                    None
                }
            },
            Err(e) => {
                error!("Error starting profile {}: {}", profile_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_response() {
        let status: StatusResponse = serde_json::from_str(r#"{"code": 0}"#).unwrap();
        assert_eq!(status.code, 0);
    }

    #[test]
    fn parses_profile_list_keys() {
        let json = r#"{"data": {"p1": {"name": "first"}, "p2": {"name": "second"}}}"#;
        let list: ListResponse = serde_json::from_str(json).unwrap();

        let mut ids: Vec<String> = list.data.into_keys().collect();
        ids.sort();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn parses_start_response() {
        let json = r#"{"data": {"websocket_link": "ws://127.0.0.1:9222/devtools/browser/abc", "status": "started"}}"#;
        let started: StartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            started.data.websocket_link,
            "ws://127.0.0.1:9222/devtools/browser/abc"
        );
    }

    #[test]
    fn joins_endpoints_against_base() {
        let client = ProfileClient::new("http://127.0.0.1:25325", Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.endpoint("status").unwrap().as_str(),
            "http://127.0.0.1:25325/status"
        );
        assert_eq!(
            client.endpoint("profile/start/p1").unwrap().as_str(),
            "http://127.0.0.1:25325/profile/start/p1"
        );
    }
}
