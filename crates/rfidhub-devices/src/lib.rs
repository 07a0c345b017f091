//! RFID reader support.
//!
//! ## Architecture
//!
//! - **DeviceCodec**: pure translation between typed commands/responses and
//!   the reader's CR-terminated text frames
//! - **DeviceLink**: TCP connect plus version handshake
//! - **DeviceWriter**: the outgoing half, owned by the station actor
//! - **DeviceReader**: the incoming half, run as its own task and feeding
//!   [`DeviceEvent`]s into the station inbox
//!
//! Responses carry no correlation id, so callers must keep at most one
//! command in flight per reader.

pub mod codec;
pub mod error;
pub mod link;

pub use codec::{
    CodecError, DeviceCodec, DeviceCommand, DeviceResponse, TagId, FRAME_TERMINATOR,
    MAX_FRAME_LEN,
};
pub use error::DeviceError;
pub use link::{DeviceEvent, DeviceLink, DeviceReader, DeviceWriter, TcpDeviceWriter};
