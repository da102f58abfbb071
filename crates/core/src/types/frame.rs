//! Outbound frames on the real-time channel and remote call envelopes

use serde::{Deserialize, Serialize};

use super::{ChatMessage, Contact, Conversation, PresenceStatus};
use crate::auth::Credentials;
use crate::{CoreError, Result, APP_VERSION_STRING, PROTOCOL_VERSION};

/// Frame sent by the client on the real-time channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Channel handshake, first frame on every fresh link
    Hello {
        protocol_version: u32,
        app_version: String,
        user_id: String,
        token: String,
    },

    /// Heartbeat while a conversation is open
    Activity { conversation_id: String },

    /// Explicit presence change (idle fallback, return from idle)
    Presence { status: PresenceStatus },

    /// Liveness probe
    Ping { timestamp: u64 },

    /// Graceful close
    Close,
}

impl ClientFrame {
    /// Create hello frame for the given account
    pub fn hello(credentials: &Credentials) -> Self {
        Self::Hello {
            protocol_version: PROTOCOL_VERSION,
            app_version: APP_VERSION_STRING.to_string(),
            user_id: credentials.user_id.clone(),
            token: credentials.token.to_hex(),
        }
    }

    /// Create activity frame
    pub fn activity(conversation_id: impl Into<String>) -> Self {
        Self::Activity {
            conversation_id: conversation_id.into(),
        }
    }

    /// Create ping frame stamped with the current time
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: super::now_millis(),
        }
    }

    /// Validate a hello frame (gateway side, and loopback tests)
    pub fn validate_handshake(&self) -> Result<()> {
        match self {
            ClientFrame::Hello { protocol_version, .. } if *protocol_version == PROTOCOL_VERSION => Ok(()),
            ClientFrame::Hello { protocol_version, .. } => Err(CoreError::ProtocolVersionMismatch {
                expected: PROTOCOL_VERSION,
                got: *protocol_version,
            }),
            _ => Err(CoreError::InvalidHandshake),
        }
    }
}

/// Request/response call to the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum GatewayCall {
    ListConversations,
    FetchHistory { conversation_id: String, limit: usize },
    SendMessage { conversation_id: String, body: String },
    ListContacts,
}

impl GatewayCall {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayCall::ListConversations => "list_conversations",
            GatewayCall::FetchHistory { .. } => "fetch_history",
            GatewayCall::SendMessage { .. } => "send_message",
            GatewayCall::ListContacts => "list_contacts",
        }
    }
}

/// Authenticated request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayRequest {
    pub user_id: String,
    pub token: String,
    #[serde(flatten)]
    pub call: GatewayCall,
}

impl GatewayRequest {
    pub fn new(credentials: &Credentials, call: GatewayCall) -> Self {
        Self {
            user_id: credentials.user_id.clone(),
            token: credentials.token.to_hex(),
            call,
        }
    }
}

/// Response payload for a [`GatewayCall`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    Conversations { conversations: Vec<Conversation> },
    History { messages: Vec<ChatMessage> },
    Sent { message: ChatMessage },
    Contacts { contacts: Vec<Contact> },
    Empty,
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "empty_body")]
    pub body: ResponseBody,
}

fn empty_body() -> ResponseBody {
    ResponseBody::Empty
}

impl GatewayResponse {
    pub fn ok(body: ResponseBody) -> Self {
        Self {
            status: 200,
            message: None,
            body,
        }
    }

    /// Turn non-success statuses into [`CoreError::Status`]
    pub fn into_result(self) -> Result<ResponseBody> {
        if self.status >= 400 {
            return Err(CoreError::status(
                self.status,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        Ok(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;

    fn creds() -> Credentials {
        Credentials::new("alice", AuthToken::from_hex(&"ab".repeat(32)).unwrap())
    }

    #[test]
    fn test_hello_frame_carries_credentials() {
        let frame = ClientFrame::hello(&creds());
        match &frame {
            ClientFrame::Hello { user_id, token, protocol_version, .. } => {
                assert_eq!(user_id, "alice");
                assert_eq!(token, &"ab".repeat(32));
                assert_eq!(*protocol_version, PROTOCOL_VERSION);
            }
            other => panic!("Expected Hello, got {:?}", other),
        }
        assert!(frame.validate_handshake().is_ok());
    }

    #[test]
    fn test_handshake_validation_invalid_version() {
        let frame = ClientFrame::Hello {
            protocol_version: 999,
            app_version: "0.0.0".into(),
            user_id: "alice".into(),
            token: String::new(),
        };
        match frame.validate_handshake().unwrap_err() {
            CoreError::ProtocolVersionMismatch { expected, got } => {
                assert_eq!(expected, PROTOCOL_VERSION);
                assert_eq!(got, 999);
            }
            other => panic!("Expected ProtocolVersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_handshake_validation_invalid_frame_type() {
        let result = ClientFrame::Close.validate_handshake();
        assert!(matches!(result.unwrap_err(), CoreError::InvalidHandshake));
    }

    #[test]
    fn test_activity_frame_json_shape() {
        let json = serde_json::to_string(&ClientFrame::activity("c1")).unwrap();
        assert_eq!(json, r#"{"type":"activity","conversation_id":"c1"}"#);
    }

    #[test]
    fn test_request_envelope_is_flat() {
        let req = GatewayRequest::new(
            &creds(),
            GatewayCall::FetchHistory {
                conversation_id: "c1".into(),
                limit: 50,
            },
        );
        let value: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["method"], "fetch_history");
        assert_eq!(value["conversation_id"], "c1");
        assert_eq!(value["user_id"], "alice");
    }

    #[test]
    fn test_error_response_maps_to_status_error() {
        let json = r#"{"status":401,"message":"token expired"}"#;
        let response: GatewayResponse = serde_json::from_str(json).unwrap();
        let err = response.into_result().unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert!(err.is_authorization());
    }

    #[test]
    fn test_ok_response_yields_body() {
        let response = GatewayResponse::ok(ResponseBody::Conversations {
            conversations: vec![Conversation::new("c1", "Team")],
        });
        match response.into_result().unwrap() {
            ResponseBody::Conversations { conversations } => assert_eq!(conversations.len(), 1),
            other => panic!("Expected Conversations, got {:?}", other),
        }
    }
}
