use std::path::Path;

use async_trait::async_trait;

use crate::errors::ScreenCueResult;
use crate::perception::types::Region;

/// Writes one full-screen raster image to `output`.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    fn name(&self) -> &str;

    async fn capture(&self, output: &Path) -> ScreenCueResult<()>;
}

/// Crops `input` to `geometry` (`WxH+X+Y`) and writes the result to `output`.
#[async_trait]
pub trait Cropper: Send + Sync {
    fn name(&self) -> &str;

    async fn crop(&self, input: &Path, geometry: &str, output: &Path) -> ScreenCueResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected(Region),
    /// The user dismissed the selector. Not an error.
    Cancelled,
}

/// Interactive screen-region picker.
#[async_trait]
pub trait RegionSelector: Send + Sync {
    async fn select(&self) -> ScreenCueResult<Selection>;
}
