// Interactive region selection via `slurp`.
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::perception::external_tool::ExternalTool;
use crate::perception::traits::{RegionSelector, Selection};
use crate::perception::types::Region;

/// Parses the selector's `X,Y WxH` descriptor. X/Y may be negative; W/H must be positive.
pub fn parse_region_descriptor(descriptor: &str) -> ScreenCueResult<Region> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(-?\d+),(-?\d+)\s+(-?\d+)x(-?\d+)$").expect("static region regex")
    });
    let invalid = || ScreenCueError::InvalidRequest(format!("invalid region format '{descriptor}'"));
    let caps = re.captures(descriptor.trim()).ok_or_else(invalid)?;
    let x: i32 = caps[1].parse().map_err(|_| invalid())?;
    let y: i32 = caps[2].parse().map_err(|_| invalid())?;
    let w: i64 = caps[3].parse().map_err(|_| invalid())?;
    let h: i64 = caps[4].parse().map_err(|_| invalid())?;
    let width = u32::try_from(w).ok().filter(|v| *v > 0);
    let height = u32::try_from(h).ok().filter(|v| *v > 0);
    match (width, height) {
        (Some(width), Some(height)) => Ok(Region::new(x, y, width, height)),
        _ => Err(ScreenCueError::InvalidRequest(format!(
            "region '{descriptor}' must have a positive width and height"
        ))),
    }
}

pub struct SlurpSelector {
    tool: ExternalTool,
}

impl SlurpSelector {
    pub fn new() -> Self {
        Self {
            tool: ExternalTool::slurp(),
        }
    }

    pub fn with_tool(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Default for SlurpSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegionSelector for SlurpSelector {
    async fn select(&self) -> ScreenCueResult<Selection> {
        let no_args: [&str; 0] = [];
        let out = self.tool.run(no_args).await?;
        match out.status.code() {
            Some(0) => {
                let region = parse_region_descriptor(&out.stdout)?;
                tracing::info!(%region, "region selected");
                Ok(Selection::Selected(region))
            }
            // slurp exits 1 when the user presses Escape
            Some(1) => {
                tracing::info!("region selection cancelled by user");
                Ok(Selection::Cancelled)
            }
            _ => Err(ScreenCueError::ToolFailed {
                tool: self.tool.program.clone(),
                message: if out.stderr.trim().is_empty() {
                    format!("exited with {}", out.status)
                } else {
                    out.stderr.trim().to_string()
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::Point;

    #[test]
    fn parses_selector_output() {
        let r = parse_region_descriptor("100,200 300x150\n").unwrap();
        assert_eq!(r, Region::new(100, 200, 300, 150));
        assert_eq!(r.crop_geometry(), "300x150+100+200");
    }

    #[test]
    fn accepts_negative_origin() {
        let r = parse_region_descriptor("-1920,-40 10x20").unwrap();
        assert_eq!((r.x, r.y), (-1920, -40));
    }

    #[test]
    fn rejects_bad_descriptors() {
        assert!(parse_region_descriptor("100,200").is_err());
        assert!(parse_region_descriptor("100 200 300x150").is_err());
        assert!(parse_region_descriptor("1,2 0x5").is_err());
        assert!(parse_region_descriptor("1,2 -5x5").is_err());
    }

    #[test]
    fn insertion_point_is_region_center() {
        let r = parse_region_descriptor("10,10 20x30").unwrap();
        assert_eq!(r.center(), Point::new(20, 25));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_code_one_is_cancellation() {
        let selector = SlurpSelector::with_tool(ExternalTool::new("false", ""));
        assert_eq!(selector.select().await.unwrap(), Selection::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_is_invalid_region() {
        let selector = SlurpSelector::with_tool(ExternalTool::new("true", ""));
        let err = selector.select().await.unwrap_err();
        assert!(matches!(err, ScreenCueError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_selector_names_the_tool() {
        let selector =
            SlurpSelector::with_tool(ExternalTool::new("screencue-missing-slurp", "Install slurp."));
        let err = selector.select().await.unwrap_err();
        assert_eq!(err.to_string(), "'screencue-missing-slurp' not found. Install slurp.");
    }
}
