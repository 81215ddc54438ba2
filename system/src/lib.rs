pub extern crate bincode;
pub extern crate serde;
pub extern crate serde_json;

pub mod codec;
mod message;
mod types;

pub use codec::{CodecError, Frame, WireFormat};
pub use message::*;
pub use types::*;
