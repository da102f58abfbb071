//! Request/response calls to the gateway
//!
//! Each call opens its own bi stream on a shared connection, writes one
//! framed [`GatewayRequest`], finishes the send side and reads one framed
//! [`GatewayResponse`]. A broken connection is dropped and re-established on
//! the next call; retrying is the caller's job.

use std::sync::Arc;
use tokio::sync::Mutex;

use quinn::Connection;

use super::reader::FrameReader;
use super::Connector;
use crate::auth::Credentials;
use crate::config::GatewayConfig;
use crate::error::{CoreError, Result};
use crate::protocol::MessageCodec;
use crate::types::{
    ChatMessage, Contact, Conversation, GatewayCall, GatewayRequest, GatewayResponse, ResponseBody,
};

struct ClientInner {
    connector: Connector,
    credentials: Credentials,
    connection: Mutex<Option<Connection>>,
}

/// Cheaply cloneable handle for remote calls
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

impl GatewayClient {
    pub fn new(gateway: &GatewayConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self::with_connector(Connector::new(gateway)?, credentials))
    }

    pub fn with_connector(connector: Connector, credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connector,
                credentials,
                connection: Mutex::new(None),
            }),
        }
    }

    async fn connection(&self) -> Result<Connection> {
        let mut slot = self.inner.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            if connection.close_reason().is_none() {
                return Ok(connection.clone());
            }
            tracing::debug!("Gateway connection closed, reconnecting");
        }
        let connection = self.inner.connector.connect().await?;
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn forget_connection(&self) {
        self.inner.connection.lock().await.take();
    }

    /// Perform one remote call
    pub async fn call(&self, call: GatewayCall) -> Result<ResponseBody> {
        let method = call.name();
        let request = GatewayRequest::new(&self.inner.credentials, call);

        match self.exchange(&request).await {
            Ok(response) => {
                tracing::debug!("{} -> {}", method, response.status);
                response.into_result()
            }
            Err(e) => {
                tracing::debug!("{} failed: {}", method, e);
                self.forget_connection().await;
                Err(e)
            }
        }
    }

    async fn exchange(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
        let connection = self.connection().await?;
        let (mut send, recv) = connection.open_bi().await?;

        send.write_all(&MessageCodec::encode(request)?).await?;
        let _ = send.finish();

        let mut reader = FrameReader::new(recv);
        let payload = reader.next_frame().await?.ok_or(CoreError::ConnectionClosed)?;
        MessageCodec::from_payload(&payload)
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        match self.call(GatewayCall::ListConversations).await? {
            ResponseBody::Conversations { conversations } => Ok(conversations),
            other => Err(unexpected("list_conversations", &other)),
        }
    }

    pub async fn fetch_history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let call = GatewayCall::FetchHistory {
            conversation_id: conversation_id.to_string(),
            limit,
        };
        match self.call(call).await? {
            ResponseBody::History { messages } => Ok(messages),
            other => Err(unexpected("fetch_history", &other)),
        }
    }

    pub async fn send_message(&self, conversation_id: &str, body: &str) -> Result<ChatMessage> {
        let call = GatewayCall::SendMessage {
            conversation_id: conversation_id.to_string(),
            body: body.to_string(),
        };
        match self.call(call).await? {
            ResponseBody::Sent { message } => Ok(message),
            other => Err(unexpected("send_message", &other)),
        }
    }

    pub async fn list_contacts(&self) -> Result<Vec<Contact>> {
        match self.call(GatewayCall::ListContacts).await? {
            ResponseBody::Contacts { contacts } => Ok(contacts),
            other => Err(unexpected("list_contacts", &other)),
        }
    }
}

fn unexpected(method: &str, body: &ResponseBody) -> CoreError {
    CoreError::Protocol(format!("unexpected response body for {}: {:?}", method, body))
}
