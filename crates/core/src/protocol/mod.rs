//! Wire protocol: framing and codec

pub mod codec;

pub use codec::{MessageCodec, MAX_MESSAGE_SIZE};
