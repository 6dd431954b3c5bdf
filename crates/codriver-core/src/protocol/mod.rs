//! Protocol module containing message types, the binary codec, and the
//! command-id allocator.

pub mod codec;
pub mod command_id;
pub mod messages;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use command_id::CommandIdAllocator;
pub use messages::*;
