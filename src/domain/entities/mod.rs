//! Domain entity definitions.

mod analysis;
mod batch_item;
mod image_input;

pub use analysis::{ImageInfo, PixelBuffer, Rgb};
pub use batch_item::{BatchItemRecord, ItemId, ItemStatus, RecordPatch, ResourceHandle};
pub use image_input::{Dimensions, ImageFormat, ImageInput};
