//! HTTP implementation of the control API

use super::types::*;
use super::ControlApi;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use xytable_core::{Axis, CommandError, ConnectionError, DigitalOutput, Error, Result};

/// Control API client speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpControlClient {
    /// Create a client for the backend at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Backend root such as `http://localhost:8000`
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| ConnectionError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConnectionError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: "expected an http or https URL".to_string(),
            }
            .into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectionError::Transport {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: parsed,
            timeout,
        })
    }

    /// Backend root URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL of an endpoint from path segments
    ///
    /// Segments are percent-encoded, so program names containing `/` or
    /// spaces stay a single segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ConnectionError::InvalidEndpoint {
                    url: self.base_url.to_string(),
                    reason: "URL cannot carry a path".to_string(),
                }
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        tracing::debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let reason = extract_detail(&body).unwrap_or_else(|| fallback_reason(status, &body));
            tracing::warn!("Backend rejected request ({}): {}", status.as_u16(), reason);
            return Err(CommandError::Rejected {
                status: status.as_u16(),
                reason,
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|e| {
            CommandError::InvalidResponse {
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let request = self.request(Method::GET, segments)?;
        self.send(request).await
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let request = self.request(Method::POST, segments)?;
        self.send(request).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let request = self.request(method, segments)?.json(body);
        self.send(request).await
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            ConnectionError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .into()
        } else {
            ConnectionError::Transport {
                reason: err.to_string(),
            }
            .into()
        }
    }
}

/// Extract the reason from a FastAPI-style error body
///
/// `{"detail": "text"}` yields the text; validation errors of the form
/// `{"detail": [{"msg": ...}, ...]}` yield the messages joined by `"; "`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

fn fallback_reason(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl ControlApi for HttpControlClient {
    async fn status(&self) -> Result<StatusResponse> {
        self.get(&["status"]).await
    }

    async fn limits(&self) -> Result<LimitsResponse> {
        self.get(&["limits"]).await
    }

    async fn move_relative(
        &self,
        axis: Axis,
        distance: f64,
        speed: Option<f64>,
    ) -> Result<CommandResponse> {
        let body = MoveRequest {
            axis,
            distance,
            speed,
        };
        self.send_json(Method::POST, &["move"], &body).await
    }

    async fn move_absolute(&self, x: f64, y: f64, speed: Option<f64>) -> Result<CommandResponse> {
        let body = PositionRequest { x, y, speed };
        self.send_json(Method::POST, &["move_to"], &body).await
    }

    async fn emergency_stop(&self) -> Result<CommandResponse> {
        self.post(&["emergency_stop"]).await
    }

    async fn clear_emergency_stop(&self) -> Result<CommandResponse> {
        self.post(&["clear_emergency_stop"]).await
    }

    async fn home(&self) -> Result<CommandResponse> {
        self.post(&["api", "home"]).await
    }

    async fn set_output(&self, output: DigitalOutput, state: bool) -> Result<CommandResponse> {
        let body = SetIoRequest {
            io_name: output,
            state,
        };
        self.send_json(Method::POST, &["set_io"], &body).await
    }

    async fn list_programs(&self) -> Result<ProgramList> {
        self.get(&["programs"]).await
    }

    async fn load_program(&self, name: &str) -> Result<Program> {
        self.get(&["programs", name]).await
    }

    async fn save_program(&self, program: &Program) -> Result<CommandResponse> {
        self.send_json(Method::POST, &["programs"], program).await
    }

    async fn update_program(&self, name: &str, program: &Program) -> Result<CommandResponse> {
        self.send_json(Method::PUT, &["programs", name], program)
            .await
    }

    async fn delete_program(&self, name: &str) -> Result<CommandResponse> {
        let request = self.request(Method::DELETE, &["programs", name])?;
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpControlClient {
        HttpControlClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("http://localhost:8000");
        assert_eq!(
            c.endpoint(&["api", "home"]).unwrap().as_str(),
            "http://localhost:8000/api/home"
        );

        let prefixed = client("http://table.local:8000/backend/");
        assert_eq!(
            prefixed.endpoint(&["status"]).unwrap().as_str(),
            "http://table.local:8000/backend/status"
        );
    }

    #[test]
    fn test_endpoint_encodes_program_names() {
        let c = client("http://localhost:8000");
        assert_eq!(
            c.endpoint(&["programs", "big square/v2"]).unwrap().as_str(),
            "http://localhost:8000/programs/big%20square%2Fv2"
        );
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let err = HttpControlClient::new("ftp://localhost", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::InvalidEndpoint { .. })
        ));
        assert!(HttpControlClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"Mesa board not connected"}"#).as_deref(),
            Some("Mesa board not connected")
        );
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","io_name"],"msg":"IO name must be \"down\" (mist) or \"start\" (flood)","type":"value_error"},{"msg":"second"}]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("IO name must be \"down\" (mist) or \"start\" (flood); second")
        );
    }

    #[test]
    fn test_extract_detail_missing() {
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"message":"x"}"#), None);
        assert_eq!(
            fallback_reason(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway".to_string()
        );
    }
}
