//! Connect handshake.
//!
//! Exactly one `connect` exchange per connection, sent immediately on
//! socket open and before any chat traffic. The gateway's rejection
//! payload is logged for diagnosis but never shown to the user; the
//! UI gets a generic message and a retry affordance instead.

use aifredo_protocol::{ClientInfo, ConnectParams, RequestFrame, ResponseFrame};
use log::warn;

use crate::config::GatewayConfig;

/// Generic user-facing text for a rejected handshake. Deliberately
/// free of credential and protocol detail.
pub(crate) const REJECTED_NOTICE: &str = "The gateway rejected the connection.";

/// Build the connect request from the configured client identity.
pub(crate) fn connect_request(
    config: &GatewayConfig,
    token: &str,
    id: String,
) -> serde_json::Result<RequestFrame> {
    let client = ClientInfo {
        id: config.client_id.clone(),
        version: config.client_version.clone(),
        platform: config.platform.clone(),
        mode: config.client_mode.clone(),
    };
    let params = ConnectParams::operator(client, token.to_string(), config.locale.clone());
    RequestFrame::connect(id, &params)
}

/// Handle the handshake response. Returns `true` when the gateway
/// accepted the connection.
pub(crate) fn accepted(response: &ResponseFrame) -> bool {
    if response.ok {
        return true;
    }
    match &response.error {
        Some(detail) => warn!("gateway rejected connect: {detail}"),
        None => warn!("gateway rejected connect"),
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_connect_request_carries_configured_identity() {
        let mut config = GatewayConfig::default();
        config.client_mode = "dashboard".to_string();
        config.locale = "de-DE".to_string();

        let frame = connect_request(&config, "tok-123", "req-1-42".to_string()).unwrap();
        let wire: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(wire["id"], "req-1-42");
        assert_eq!(wire["method"], "connect");
        assert_eq!(wire["params"]["client"]["id"], "webchat");
        assert_eq!(wire["params"]["client"]["mode"], "dashboard");
        assert_eq!(wire["params"]["auth"]["token"], "tok-123");
        assert_eq!(wire["params"]["locale"], "de-DE");
    }

    #[test]
    fn test_rejection_is_not_accepted() {
        let response = ResponseFrame {
            id: "req-1-1".to_string(),
            ok: false,
            error: Some(serde_json::json!({"code": "bad-token"})),
        };
        assert!(!accepted(&response));
    }
}
