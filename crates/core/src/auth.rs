//! Gateway credentials
//!
//! The gateway issues a 256-bit session token per account. It travels as a
//! 64-character hex string in config files and on the wire, and is never
//! printed in full by `Debug`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token size in bytes (256-bit)
const TOKEN_SIZE: usize = 32;

/// Session token issued by the gateway
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthToken([u8; TOKEN_SIZE]);

impl AuthToken {
    /// Parse a token from its hexadecimal form
    ///
    /// # Errors
    /// `InvalidTokenFormat` unless the input is exactly 64 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        let hex = hex.trim();
        if hex.len() != TOKEN_SIZE * 2 || !hex.is_ascii() {
            return Err(CoreError::InvalidTokenFormat);
        }

        let mut bytes = [0u8; TOKEN_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidTokenFormat)?;
        }
        Ok(Self(bytes))
    }

    /// Lowercase hex form, as sent to the gateway
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Short prefix that is safe to log
    pub fn redacted(&self) -> String {
        format!("{}…", &self.to_hex()[..8])
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&self.redacted()).finish()
    }
}

impl TryFrom<String> for AuthToken {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<AuthToken> for String {
    fn from(token: AuthToken) -> Self {
        token.to_hex()
    }
}

/// Account identity used for the channel handshake and remote calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub token: AuthToken,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: AuthToken) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }
}
