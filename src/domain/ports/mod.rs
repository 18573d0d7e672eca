//! Ports the services depend on.

mod codec_port;
mod decoder_port;
mod resource_port;

pub use codec_port::{CodecPort, TransformOptions};
pub use decoder_port::DecoderPort;
pub use resource_port::ResourcePort;
