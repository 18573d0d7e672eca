//! Image codec adapters.
//!
//! Both adapters move decoding and encoding onto tokio's blocking pool.

pub mod codec;
pub mod decoder;

pub use codec::ImageCrateCodec;
pub use decoder::ImageCrateDecoder;
