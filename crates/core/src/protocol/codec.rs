//! Length-prefixed JSON codec for channel frames and remote calls
//!
//! Wire format: `[4 bytes length (big endian)] [JSON payload]`.

use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, Result};

/// Maximum payload size (1MB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Message codec for serialization/deserialization
pub struct MessageCodec;

impl MessageCodec {
    /// Serialize a value to a bare JSON payload (no length prefix)
    pub fn to_payload<T: Serialize>(value: &T) -> Result<Bytes> {
        let payload = serde_json::to_vec(value)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CoreError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(Bytes::from(payload))
    }

    /// Parse a bare JSON payload
    pub fn from_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
        serde_json::from_slice(payload).map_err(CoreError::from)
    }

    /// Encode a value with its length prefix
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let payload = Self::to_payload(value)?;
        Ok(Self::frame(&payload))
    }

    /// Prefix an already serialized payload with its length
    pub fn frame(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u32;
        let mut buf = Vec::with_capacity(4 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    /// Decode one length-prefixed value
    pub fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T> {
        if buf.len() < 4 {
            return Err(CoreError::InvalidMessageFormat(
                "Buffer too small for length prefix".into(),
            ));
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(CoreError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if buf.len() < 4 + len {
            return Err(CoreError::InvalidMessageFormat(
                "Buffer too small for payload".into(),
            ));
        }

        Self::from_payload(&buf[4..4 + len])
    }

    /// Split every complete frame off the front of `buf`
    ///
    /// Incomplete trailing bytes stay in the buffer for the next read.
    pub fn split_frames(buf: &mut BytesMut) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();

        while buf.len() >= 4 {
            let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
            if len > MAX_MESSAGE_SIZE {
                return Err(CoreError::MessageTooLarge {
                    size: len,
                    max: MAX_MESSAGE_SIZE,
                });
            }
            if buf.len() < 4 + len {
                break;
            }
            buf.advance(4);
            frames.push(buf.split_to(len).freeze());
        }

        Ok(frames)
    }
}
