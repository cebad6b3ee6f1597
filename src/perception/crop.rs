/// Image croppers. Both take a GraphicsMagick-style geometry (`WxH+X+Y`)
/// so the automation stage does not care which backend is configured.
use std::ffi::OsStr;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::perception::external_tool::ExternalTool;
use crate::perception::traits::Cropper;
use crate::perception::types::Region;

/// Parses `WxH+X+Y` (offsets may be negative) back into a region.
pub fn parse_geometry(geometry: &str) -> ScreenCueResult<Region> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\d+)x(\d+)([+-]\d+)([+-]\d+)$").expect("static geometry regex")
    });
    let caps = re
        .captures(geometry.trim())
        .ok_or_else(|| ScreenCueError::Crop(format!("invalid crop geometry '{geometry}'")))?;
    let num = |i: usize| -> ScreenCueResult<i64> {
        caps[i]
            .parse::<i64>()
            .map_err(|e| ScreenCueError::Crop(format!("invalid crop geometry '{geometry}': {e}")))
    };
    let (w, h, x, y) = (num(1)?, num(2)?, num(3)?, num(4)?);
    if w == 0 || h == 0 {
        return Err(ScreenCueError::Crop(format!("zero-size crop '{geometry}'")));
    }
    let fits = |v: i64| i32::try_from(v).is_ok();
    if !(fits(w) && fits(h) && fits(x) && fits(y)) {
        return Err(ScreenCueError::Crop(format!("crop geometry out of range '{geometry}'")));
    }
    Ok(Region::new(x as i32, y as i32, w as u32, h as u32))
}

/// `gm convert <in> -crop <geometry> +repage <out>`
pub struct GmCropper {
    tool: ExternalTool,
}

impl GmCropper {
    pub fn new() -> Self {
        Self {
            tool: ExternalTool::graphicsmagick(),
        }
    }

    pub fn with_tool(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Default for GmCropper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cropper for GmCropper {
    fn name(&self) -> &str {
        &self.tool.program
    }

    async fn crop(&self, input: &Path, geometry: &str, output: &Path) -> ScreenCueResult<()> {
        let args = [
            OsStr::new("convert"),
            input.as_os_str(),
            OsStr::new("-crop"),
            OsStr::new(geometry),
            OsStr::new("+repage"),
            output.as_os_str(),
        ];
        self.tool.run_checked(args).await?;
        tracing::debug!(geometry, path = %output.display(), "cropped screenshot written");
        Ok(())
    }
}

/// In-process cropper on top of the `image` crate. The crop rectangle is
/// clamped to the source bounds; a crop that falls entirely outside is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCropper;

/// Intersects `region` with a `width`×`height` image, returning `(x, y, w, h)`.
pub fn clamp_to_image(region: &Region, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x1 = i64::from(region.x).max(0);
    let y1 = i64::from(region.y).max(0);
    let x2 = (i64::from(region.x) + i64::from(region.width)).min(i64::from(width));
    let y2 = (i64::from(region.y) + i64::from(region.height)).min(i64::from(height));
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}

#[async_trait]
impl Cropper for ImageCropper {
    fn name(&self) -> &str {
        "image"
    }

    async fn crop(&self, input: &Path, geometry: &str, output: &Path) -> ScreenCueResult<()> {
        let region = parse_geometry(geometry)?;
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> ScreenCueResult<()> {
            let img = image::open(&input)?;
            let (cx, cy, cw, ch) = clamp_to_image(&region, img.width(), img.height())
                .ok_or_else(|| {
                    ScreenCueError::Crop(format!(
                        "region {region} lies outside the {}x{} screenshot",
                        img.width(),
                        img.height()
                    ))
                })?;
            img.crop_imm(cx, cy, cw, ch)
                .save_with_format(&output, image::ImageFormat::Png)?;
            tracing::debug!(x = cx, y = cy, w = cw, h = ch, path = %output.display(), "cropped screenshot written");
            Ok(())
        })
        .await
        .map_err(|e| ScreenCueError::Crop(format!("crop worker failed: {e}")))?
    }
}
