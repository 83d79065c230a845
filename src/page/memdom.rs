//! In-memory page implementation.
//!
//! Backs tests and the replay runner with a small element arena loaded
//! from a JSON fixture. Synthetic event dispatches are recorded on a
//! log, which stands in for the listeners a real page framework would
//! attach. Script-level mutation helpers (`remove`, `set_rect`,
//! `set_viewport_height`, `set_scroll`) let a trace change the page
//! between events the way a live site would.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DomError, EditableKind, NodeId, PageDom, Rect, SyntheticEvent, Viewport};
use crate::selector::{self, ElementView, Selector};

/// Serialized page description. `body` is the root of the element tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFixture {
    pub host_path: String,
    #[serde(default)]
    pub viewport: Viewport,
    pub body: NodeFixture,
}

/// One element in a fixture tree. Everything except the tag defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFixture {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub value: String,
    pub text: String,
    pub rect: Rect,
    pub children: Vec<NodeFixture>,
}

impl Default for NodeFixture {
    fn default() -> Self {
        Self {
            tag: "div".to_owned(),
            attrs: BTreeMap::new(),
            value: String::new(),
            text: String::new(),
            rect: Rect::ZERO,
            children: Vec::new(),
        }
    }
}

impl NodeFixture {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_owned();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn child(mut self, child: NodeFixture) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read page fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed page fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A synthetic event that reached the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub target: NodeId,
    pub event: SyntheticEvent,
}

#[derive(Debug, Clone)]
struct MemNode {
    tag: String,
    attrs: BTreeMap<String, String>,
    value: String,
    text: String,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
    caret: Option<usize>,
}

/// Arena-backed [`PageDom`]. Node ids are arena indices; removal marks
/// a subtree detached but never reuses ids.
#[derive(Debug, Clone)]
pub struct MemDom {
    host_path: String,
    viewport: Viewport,
    nodes: Vec<MemNode>,
    root: NodeId,
    focused: Option<NodeId>,
    dispatched: Vec<Dispatched>,
}

impl MemDom {
    pub fn from_fixture(fixture: &PageFixture) -> Self {
        let mut dom = Self {
            host_path: fixture.host_path.clone(),
            viewport: fixture.viewport,
            nodes: Vec::new(),
            root: NodeId(0),
            focused: None,
            dispatched: Vec::new(),
        };
        dom.root = dom.insert_subtree(&fixture.body, None);
        dom
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        let fixture: PageFixture = serde_json::from_str(&raw)?;
        Ok(Self::from_fixture(&fixture))
    }

    /// Attached tree as a fixture again, for dumps and state asserts.
    pub fn to_fixture(&self) -> PageFixture {
        PageFixture {
            host_path: self.host_path.clone(),
            viewport: self.viewport,
            body: self.subtree_fixture(self.root),
        }
    }

    /// Resolves a selector string to the first match, for scripted
    /// traces addressing elements by pattern rather than id.
    pub fn first_match(&self, pattern: &str) -> Option<NodeId> {
        let sel = selector::parse(pattern).ok()?;
        self.query_first(&sel)
    }

    /// Detaches `node` and its subtree. Focus inside the subtree is
    /// cleared, geometry collapses to zero.
    pub fn remove(&mut self, node: NodeId) {
        self.mark_detached(node);
        if let Some(parent) = self.node(node).parent {
            let parent = self.node_mut(parent);
            parent.children.retain(|&c| c != node);
        }
        if let Some(focused) = self.focused {
            if self.node(focused).detached {
                self.focused = None;
            }
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.node_mut(node).rect = rect;
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport.height = height;
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.viewport.scroll_x = x;
        self.viewport.scroll_y = y;
    }

    #[allow(dead_code)]
    pub fn dispatched(&self) -> &[Dispatched] {
        &self.dispatched
    }

    #[allow(dead_code)]
    pub fn dispatched_on(&self, node: NodeId) -> Vec<SyntheticEvent> {
        self.dispatched
            .iter()
            .filter(|d| d.target == node)
            .map(|d| d.event)
            .collect()
    }

    /// Last caret offset applied to `node`, if any.
    #[allow(dead_code)]
    pub fn caret(&self, node: NodeId) -> Option<usize> {
        self.node(node).caret
    }

    fn insert_subtree(&mut self, fixture: &NodeFixture, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(MemNode {
            tag: fixture.tag.to_ascii_lowercase(),
            attrs: fixture.attrs.clone(),
            value: fixture.value.clone(),
            text: fixture.text.clone(),
            rect: fixture.rect,
            parent,
            children: Vec::new(),
            detached: false,
            caret: None,
        });
        for child in &fixture.children {
            let child_id = self.insert_subtree(child, Some(id));
            self.node_mut(id).children.push(child_id);
        }
        id
    }

    fn subtree_fixture(&self, id: NodeId) -> NodeFixture {
        let node = self.node(id);
        NodeFixture {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            value: node.value.clone(),
            text: node.text.clone(),
            rect: node.rect,
            children: node.children.iter().map(|&c| self.subtree_fixture(c)).collect(),
        }
    }

    fn mark_detached(&mut self, id: NodeId) {
        self.node_mut(id).detached = true;
        let children = self.node(id).children.clone();
        for child in children {
            self.mark_detached(child);
        }
    }

    fn node(&self, id: NodeId) -> &MemNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MemNode {
        &mut self.nodes[id.0 as usize]
    }

    fn live(&self, id: NodeId) -> Result<&MemNode, DomError> {
        let node = self.node(id);
        if node.detached {
            return Err(DomError::Detached);
        }
        Ok(node)
    }

    fn node_kind(&self, id: NodeId) -> EditableKind {
        let node = self.node(id);
        match node.tag.as_str() {
            "textarea" => EditableKind::TextArea,
            "input" => EditableKind::TextInput,
            _ if node.attrs.get("contenteditable").map(String::as_str) == Some("true") => {
                EditableKind::RichText
            }
            _ => EditableKind::Other,
        }
    }

    fn is_field(&self, id: NodeId) -> bool {
        matches!(
            self.node_kind(id),
            EditableKind::TextArea | EditableKind::TextInput
        )
    }

    fn matches_node(&self, id: NodeId, selector: &Selector) -> bool {
        let view = View { dom: self, id };
        let ancestors = Ancestors {
            dom: self,
            next: self.node(id).parent,
        };
        selector.matches(&view, ancestors)
    }
}

impl PageDom for MemDom {
    fn host_path(&self) -> &str {
        &self.host_path
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn query_first(&self, selector: &Selector) -> Option<NodeId> {
        // DFS preorder is document order; children pushed reversed.
        // Detached nodes are pruned here: a removed subtree keeps its
        // internal links, and the root has no parent to unlink from.
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.node(id).detached {
                continue;
            }
            if self.matches_node(id, selector) {
                return Some(id);
            }
            for &child in self.node(id).children.iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    fn element_matches(&self, node: NodeId, selector: &Selector) -> bool {
        !self.node(node).detached && self.matches_node(node, selector)
    }

    fn focused(&self) -> Option<NodeId> {
        self.focused.filter(|&id| !self.node(id).detached)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        !self.node(node).detached
    }

    fn rect(&self, node: NodeId) -> Rect {
        let node = self.node(node);
        if node.detached { Rect::ZERO } else { node.rect }
    }

    fn kind(&self, node: NodeId) -> EditableKind {
        if self.node(node).detached {
            return EditableKind::Other;
        }
        self.node_kind(node)
    }

    fn value(&self, node: NodeId) -> Result<String, DomError> {
        let live = self.live(node)?;
        if !self.is_field(node) {
            return Err(DomError::WrongKind);
        }
        Ok(live.value.clone())
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.live(node)?;
        if !self.is_field(node) {
            return Err(DomError::WrongKind);
        }
        self.node_mut(node).value = value.to_owned();
        Ok(())
    }

    fn text_content(&self, node: NodeId) -> Result<String, DomError> {
        let live = self.live(node)?;
        if self.is_field(node) {
            return Err(DomError::WrongKind);
        }
        Ok(live.text.clone())
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.live(node)?;
        if self.is_field(node) {
            return Err(DomError::WrongKind);
        }
        self.node_mut(node).text = text.to_owned();
        Ok(())
    }

    fn focus(&mut self, node: NodeId) -> Result<(), DomError> {
        self.live(node)?;
        self.focused = Some(node);
        Ok(())
    }

    fn set_caret(&mut self, node: NodeId, offset: usize) -> Result<(), DomError> {
        self.live(node)?;
        match self.node_kind(node) {
            EditableKind::TextArea | EditableKind::TextInput => {
                let len = self.node(node).value.chars().count();
                self.node_mut(node).caret = Some(offset.min(len));
                Ok(())
            }
            EditableKind::RichText => {
                let len = self.node(node).text.chars().count();
                // No text node to anchor a range on; skip quietly.
                if len == 0 {
                    return Ok(());
                }
                self.node_mut(node).caret = Some(offset.min(len));
                Ok(())
            }
            EditableKind::Other => Err(DomError::WrongKind),
        }
    }

    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent) -> Result<(), DomError> {
        self.live(node)?;
        self.dispatched.push(Dispatched { target: node, event });
        Ok(())
    }
}

struct View<'a> {
    dom: &'a MemDom,
    id: NodeId,
}

impl ElementView for View<'_> {
    fn tag(&self) -> &str {
        &self.dom.node(self.id).tag
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.dom.node(self.id).attrs.get(name).map(String::as_str)
    }
}

struct Ancestors<'a> {
    dom: &'a MemDom,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = View<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.dom.node(id).parent;
        Some(View { dom: self.dom, id })
    }
}
