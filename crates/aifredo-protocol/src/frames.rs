//! Frame types and the inbound decoder.
//!
//! Outbound frames serialize to `{"type":"req","id":...,"method":...,"params":...}`.
//! Inbound text decodes to a tagged union of response frames, chat
//! events, and an explicit `Ignored` bucket for everything else. The
//! decoder never fails: malformed or unrecognized input is swallowed
//! so protocol drift on the gateway side cannot take the client down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OPERATOR_ROLE, OPERATOR_SCOPES, PROTOCOL_VERSION};

/// Request method names understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "connect")]
    Connect,
    #[serde(rename = "chat.send")]
    ChatSend,
    #[serde(rename = "chat.abort")]
    ChatAbort,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::ChatSend => write!(f, "chat.send"),
            Self::ChatAbort => write!(f, "chat.abort"),
        }
    }
}

/// An outbound request frame. Sent once; never retried by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "req")]
pub struct RequestFrame {
    /// Caller-chosen id, unique within a session.
    pub id: String,
    pub method: Method,
    pub params: Value,
}

impl RequestFrame {
    pub fn connect(id: String, params: &ConnectParams) -> serde_json::Result<Self> {
        Ok(Self {
            id,
            method: Method::Connect,
            params: serde_json::to_value(params)?,
        })
    }

    pub fn chat_send(id: String, params: &ChatSendParams) -> serde_json::Result<Self> {
        Ok(Self {
            id,
            method: Method::ChatSend,
            params: serde_json::to_value(params)?,
        })
    }

    pub fn chat_abort(id: String, params: &ChatAbortParams) -> serde_json::Result<Self> {
        Ok(Self {
            id,
            method: Method::ChatAbort,
            params: serde_json::to_value(params)?,
        })
    }

    /// Serialize to the wire representation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Client identity sent with the connect handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    pub platform: String,
    /// Distinguishes the embedded widget from the full dashboard chat.
    pub mode: String,
}

/// Credential wrapper for the connect handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthParams {
    pub token: String,
}

/// Parameters for the `connect` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientInfo,
    pub role: String,
    pub scopes: Vec<String>,
    pub auth: AuthParams,
    pub locale: String,
}

impl ConnectParams {
    /// Build connect params with the fixed protocol bounds, operator
    /// role, and operator scopes this client always requests.
    pub fn operator(client: ClientInfo, token: String, locale: String) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client,
            role: OPERATOR_ROLE.to_string(),
            scopes: OPERATOR_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth: AuthParams { token },
            locale,
        }
    }
}

/// Parameters for the `chat.send` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams {
    pub session_key: String,
    pub message: String,
    pub idempotency_key: String,
}

/// Parameters for the `chat.abort` stop signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAbortParams {
    pub session_key: String,
}

/// An inbound response frame, correlated to a request by id.
///
/// Only the connect handshake is confirmed this way; chat replies
/// arrive out-of-band as events.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<Value>,
}

/// State tag on a chat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    /// Incremental partial output.
    Delta,
    /// Terminal success frame for the turn.
    Final,
    /// Terminal failure frame for the turn.
    Error,
}

/// An inbound chat event, uncorrelated with any request id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub state: ChatState,
    #[serde(default)]
    pub message: Option<ChatEventMessage>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Message body inside a chat event. Content is kept as raw JSON and
/// normalized with [`extract_text`](crate::extract_text) because the
/// gateway sends it either as a plain string or as a list of parts.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatEventMessage {
    #[serde(default)]
    pub content: Value,
}

impl ChatEvent {
    /// Extracted text content, if the event carries any.
    pub fn text(&self) -> Option<String> {
        let msg = self.message.as_ref()?;
        let text = crate::extract_text(&msg.content);
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Response(ResponseFrame),
    Chat(ChatEvent),
    /// Unknown frame type, unknown event name, or malformed input.
    Ignored,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawFrame {
    #[serde(rename = "res")]
    Response {
        id: String,
        ok: bool,
        #[serde(default)]
        error: Option<Value>,
    },
    #[serde(rename = "event")]
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Decode a raw text frame. Never errors: anything that does not
/// parse as a known frame shape comes back as [`InboundFrame::Ignored`].
pub fn decode(raw: &str) -> InboundFrame {
    let frame: RawFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(_) => return InboundFrame::Ignored,
    };

    match frame {
        RawFrame::Response { id, ok, error } => {
            InboundFrame::Response(ResponseFrame { id, ok, error })
        }
        RawFrame::Event { event, payload } if event == "chat" => {
            match serde_json::from_value::<ChatEvent>(payload) {
                Ok(evt) => InboundFrame::Chat(evt),
                Err(_) => InboundFrame::Ignored,
            }
        }
        RawFrame::Event { .. } => InboundFrame::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_frame_wire_shape() {
        let params = ConnectParams::operator(
            ClientInfo {
                id: "webchat".to_string(),
                version: "1.0.0".to_string(),
                platform: "cli".to_string(),
                mode: "webchat".to_string(),
            },
            "secret-token".to_string(),
            "en-US".to_string(),
        );
        let frame = RequestFrame::connect("req-1-1700000000000".to_string(), &params).unwrap();
        let wire: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(wire["type"], "req");
        assert_eq!(wire["method"], "connect");
        assert_eq!(wire["params"]["minProtocol"], 3);
        assert_eq!(wire["params"]["maxProtocol"], 3);
        assert_eq!(wire["params"]["role"], "operator");
        assert_eq!(
            wire["params"]["scopes"],
            json!(["operator.read", "operator.write"])
        );
        assert_eq!(wire["params"]["auth"]["token"], "secret-token");
        assert_eq!(wire["params"]["client"]["mode"], "webchat");
        assert_eq!(wire["params"]["locale"], "en-US");
    }

    #[test]
    fn test_chat_send_frame_wire_shape() {
        let frame = RequestFrame::chat_send(
            "req-2-1700000000001".to_string(),
            &ChatSendParams {
                session_key: "agent:main:main".to_string(),
                message: "Hello".to_string(),
                idempotency_key: "1700000000001-abcd1234".to_string(),
            },
        )
        .unwrap();
        let wire: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(wire["method"], "chat.send");
        assert_eq!(wire["params"]["sessionKey"], "agent:main:main");
        assert_eq!(wire["params"]["message"], "Hello");
        assert_eq!(wire["params"]["idempotencyKey"], "1700000000001-abcd1234");
    }

    #[test]
    fn test_decode_response() {
        let raw = r#"{"type":"res","id":"req-1-5","ok":true}"#;
        match decode(raw) {
            InboundFrame::Response(res) => {
                assert_eq!(res.id, "req-1-5");
                assert!(res.ok);
                assert!(res.error.is_none());
            }
            other => panic!("expected response frame, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejected_response_keeps_error() {
        let raw = r#"{"type":"res","id":"req-1-5","ok":false,"error":{"code":"auth"}}"#;
        match decode(raw) {
            InboundFrame::Response(res) => {
                assert!(!res.ok);
                assert_eq!(res.error.unwrap()["code"], "auth");
            }
            other => panic!("expected response frame, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_chat_delta() {
        let raw = r#"{"type":"event","event":"chat","payload":{"state":"delta","message":{"content":"Hi"}}}"#;
        match decode(raw) {
            InboundFrame::Chat(evt) => {
                assert_eq!(evt.state, ChatState::Delta);
                assert_eq!(evt.text().unwrap(), "Hi");
            }
            other => panic!("expected chat event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_chat_error_event() {
        let raw = r#"{"type":"event","event":"chat","payload":{"state":"error","errorMessage":"timeout"}}"#;
        match decode(raw) {
            InboundFrame::Chat(evt) => {
                assert_eq!(evt.state, ChatState::Error);
                assert_eq!(evt.error_message.as_deref(), Some("timeout"));
                assert!(evt.text().is_none());
            }
            other => panic!("expected chat event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_swallows_garbage() {
        // Arbitrary malformed input must never produce an error.
        let cases = [
            "",
            "not json",
            "42",
            "[1,2,3]",
            r#"{"type":"unknown"}"#,
            r#"{"type":"event","event":"presence","payload":{}}"#,
            r#"{"type":"event","event":"chat","payload":{"state":"launch"}}"#,
            r#"{"type":"req","id":"x","method":"connect","params":{}}"#,
            r#"{"type":"res"}"#,
        ];
        for raw in cases {
            assert!(
                matches!(decode(raw), InboundFrame::Ignored | InboundFrame::Response(_)),
                "unexpected decode for {raw:?}"
            );
        }
        assert!(matches!(decode(r#"{"type":"res"}"#), InboundFrame::Ignored));
    }

    #[test]
    fn test_decode_event_with_part_list_content() {
        let raw = r#"{"type":"event","event":"chat","payload":{"state":"final","message":{"content":["Hello ",{"text":"world"},{}]}}}"#;
        match decode(raw) {
            InboundFrame::Chat(evt) => assert_eq!(evt.text().unwrap(), "Hello world"),
            other => panic!("expected chat event, got {other:?}"),
        }
    }
}
