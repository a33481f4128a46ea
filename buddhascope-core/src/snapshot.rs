//! A captured frame with the view and policies that produced it.

use crate::{StepVariant, ViewState};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB samples, row-major, origin top-left.
    #[serde(skip)]
    pub pixels: Vec<u32>,
    pub view: ViewState,
    pub variant: StepVariant,
    pub show_diff: bool,
    pub frame: u64,
}

impl Snapshot {
    /// File stem encoding the view and policies, e.g.
    /// `buddhabrot_s1.3_x-0.5_y0_t0_constant_none`.
    pub fn file_stem(&self) -> String {
        let center = self.view.center();
        let mut stem = format!(
            "buddhabrot_s{}_x{}_y{}_t{}_{}_{}",
            self.view.scale(),
            center.x,
            center.y,
            self.view.theta(),
            self.variant.path,
            self.variant.score,
        );
        if self.show_diff {
            stem.push_str("_diff");
        }
        stem
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.file_stem())
    }

    /// Samples clamped to 8 bits.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels.iter().map(|&v| v.min(255) as u8).collect()
    }

    pub fn metadata_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
