//! Wire protocol: framing, typed messages, encode and decode.

mod dispatch;
mod frame_decoder;
mod frame_encoder;
mod message;
mod wire_format;

pub use dispatch::dispatch;
pub use frame_decoder::{FrameDecoder, RawFrame, MAX_GARBAGE_TOLERANCE};
pub use frame_encoder::FrameEncoder;
pub use message::Message;
pub use wire_format::{
    frame_length, TypeMarker, DATA_TYPE_SIZE, FRAME_LENGTH_SIZE, FRAME_OVERHEAD,
    LENGTH_PREFIX_SIZE, START_MARKER, START_MARKER_SIZE,
};
