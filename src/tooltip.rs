//! Hover tooltip state. The browser script mirrors this machine; the content
//! it shows is computed here and embedded per region.

use crate::types::RenderedRegion;
use serde::Serialize;

pub const FADE_IN_MS: u32 = 200;
pub const FADE_OUT_MS: u32 = 500;
pub const VISIBLE_OPACITY: f64 = 0.9;
/// Offset from the pointer so the cursor doesn't cover the label.
pub const POINTER_OFFSET: (f64, f64) = (5.0, -28.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TooltipState {
    Hidden,
    Visible { content: String, anchor: Anchor },
}

#[derive(Debug)]
pub struct TooltipController {
    state: TooltipState,
}

impl Default for TooltipController {
    fn default() -> Self {
        Self::new()
    }
}

impl TooltipController {
    pub fn new() -> Self {
        Self { state: TooltipState::Hidden }
    }

    pub fn state(&self) -> &TooltipState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, TooltipState::Visible { .. })
    }

    /// Text for a region, or `None` when there is no real data to show.
    pub fn content_for(region: &RenderedRegion) -> Option<String> {
        region.record.as_ref().map(|r| {
            format!("{}, {}: {}%", r.area_name, r.state, r.bachelors_or_higher)
        })
    }

    pub fn show(&mut self, pointer: Anchor, content: String) {
        self.state = TooltipState::Visible {
            content,
            anchor: Anchor {
                x: pointer.x + POINTER_OFFSET.0,
                y: pointer.y + POINTER_OFFSET.1,
            },
        };
    }

    pub fn hide(&mut self) {
        self.state = TooltipState::Hidden;
    }

    /// Unmatched regions hide the tooltip instead of showing placeholder text.
    pub fn pointer_enter(&mut self, region: &RenderedRegion, pointer: Anchor) {
        match Self::content_for(region) {
            Some(content) => self.show(pointer, content),
            None => self.hide(),
        }
    }

    pub fn pointer_leave(&mut self) {
        self.hide();
    }
}
