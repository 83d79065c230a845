//! Host-page abstraction.
//!
//! The engine never owns the page it works on; it sees the DOM through
//! the [`PageDom`] trait. A [`NodeId`] is an opaque handle into one
//! page and confers no liveness: the page mutates underneath us at any
//! time, so every operation revalidates and reports [`DomError`] rather
//! than trusting a held handle. [`memdom::MemDom`] is the in-memory
//! implementation backing tests and the replay runner.

pub mod memdom;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::Selector;

/// Opaque element handle, valid only for the page that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Element geometry in viewport coordinates, like a bounding client
/// rect: `y` is relative to the top of the viewport, not the document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Viewport height and page scroll offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub height: f64,
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            height: 768.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

/// What kind of editable surface an element is, as far as insertion is
/// concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableKind {
    TextArea,
    TextInput,
    /// `contenteditable="true"` region (rich-text editor host).
    RichText,
    /// Anything else; insertion does not know how to write into it.
    Other,
}

/// Synthetic notifications dispatched after a mutation so the page's
/// framework sees the change. Both bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticEvent {
    Input,
    Change,
}

/// Why a DOM operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node is no longer attached to the page")]
    Detached,
    #[error("operation does not apply to this element kind")]
    WrongKind,
}

/// The page surface the engine runs against.
///
/// Queries walk the attached tree in document order. Accessors that
/// take a [`NodeId`] treat a detached node as gone: geometry collapses
/// to a zero rect and mutations fail with [`DomError::Detached`].
/// `value`/`set_value` apply to plain fields only, `text_content`/
/// `set_text_content` to everything else; the wrong pairing is a
/// [`DomError::WrongKind`].
pub trait PageDom {
    fn host_path(&self) -> &str;
    fn viewport(&self) -> Viewport;

    /// First attached element matching `selector`, in document order.
    fn query_first(&self, selector: &Selector) -> Option<NodeId>;
    /// Whether this element itself matches, ancestors included.
    fn element_matches(&self, node: NodeId, selector: &Selector) -> bool;

    fn focused(&self) -> Option<NodeId>;
    fn is_attached(&self, node: NodeId) -> bool;
    fn rect(&self, node: NodeId) -> Rect;
    fn kind(&self, node: NodeId) -> EditableKind;

    fn value(&self, node: NodeId) -> Result<String, DomError>;
    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError>;
    fn text_content(&self, node: NodeId) -> Result<String, DomError>;
    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError>;

    fn focus(&mut self, node: NodeId) -> Result<(), DomError>;
    /// Caret offset in characters. On a rich region this is
    /// best-effort: without a text node it silently does nothing.
    fn set_caret(&mut self, node: NodeId, offset: usize) -> Result<(), DomError>;
    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent) -> Result<(), DomError>;
}
