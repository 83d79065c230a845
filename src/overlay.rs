//! Floating affordance geometry.
//!
//! The quick-insert button rides the tracked candidate: vertically
//! centered on it, tucked just inside its right edge, positioned in
//! document coordinates so it stays put while the page scrolls
//! underneath. This module only computes placements and emits
//! [`OverlayUpdate`] commands; drawing them is the host surface's
//! problem. Clicking the button opens the prompt library and never
//! inserts anything itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::page::{NodeId, PageDom, Rect, Viewport};

/// Button edge length in CSS pixels.
pub const BUTTON_SIZE: f64 = 32.0;
/// Gap between the button and the anchor's right edge.
pub const EDGE_PADDING: f64 = 8.0;
/// How long the success state shows after an insertion.
pub const SUCCESS_FLASH: Duration = Duration::from_millis(1500);

/// Absolute document coordinates for the button's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
}

/// What the host surface should do with the button.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum OverlayUpdate {
    Show { placement: Placement },
    Hide,
    FlashSuccess,
}

/// Converts an anchor's viewport rect to a document-coordinate
/// placement beside its right edge.
pub fn placement(anchor: Rect, viewport: Viewport) -> Placement {
    Placement {
        top: anchor.top() + viewport.scroll_y + anchor.height / 2.0 - BUTTON_SIZE / 2.0,
        left: anchor.right() + viewport.scroll_x - BUTTON_SIZE - EDGE_PADDING,
    }
}

/// The button is visible exactly when a candidate is held; geometry is
/// recomputed on every call so self-transitions refresh stale rects.
pub fn update_for(dom: &dyn PageDom, candidate: Option<NodeId>) -> OverlayUpdate {
    match candidate {
        Some(node) => OverlayUpdate::Show {
            placement: placement(dom.rect(node), dom.viewport()),
        },
        None => OverlayUpdate::Hide,
    }
}
