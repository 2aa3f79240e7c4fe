//! Persistent duplex link carrying start/stop jog commands

pub mod manager;
pub mod protocol;
pub mod transport;

pub use manager::{JogLinkManager, LinkOutcome};
pub use protocol::{JogAction, JogCommand, JogReply};
pub use transport::{
    JogTransport, LinkEvent, LinkEventKind, LinkHandle, LinkId, WebSocketTransport,
};

use reqwest::Url;
use xytable_core::{ConnectionError, Result};

/// Default jog link path on the backend
pub const DEFAULT_JOG_PATH: &str = "/ws/jog";

/// Derive the jog link URL from the backend's HTTP URL
///
/// `http` becomes `ws` and `https` becomes `wss`; `path` is appended to
/// any path prefix the backend URL carries.
pub fn websocket_url(base_url: &str, path: &str) -> Result<String> {
    let invalid = |reason: &str| ConnectionError::InvalidEndpoint {
        url: base_url.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid("expected an http or https URL").into()),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a WebSocket scheme"))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| invalid("URL cannot carry a path"))?;
        segments
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_schemes() {
        assert_eq!(
            websocket_url("http://localhost:8000", DEFAULT_JOG_PATH).unwrap(),
            "ws://localhost:8000/ws/jog"
        );
        assert_eq!(
            websocket_url("https://table.example.com/api/", "ws/jog").unwrap(),
            "wss://table.example.com/api/ws/jog"
        );
    }

    #[test]
    fn test_websocket_url_rejects_other_schemes() {
        assert!(websocket_url("file:///tmp/x", DEFAULT_JOG_PATH).is_err());
        assert!(websocket_url("localhost:8000", DEFAULT_JOG_PATH).is_err());
    }
}
