//! Prompt insertion.
//!
//! One entry point, [`insert`], takes the text to place and works out
//! where it goes: re-resolve the page (never trust a stale
//! resolution), probe the resolved selectors in order, fall back to
//! the tracked candidate and then to the focused element, classify the
//! winner exactly once, and prepend. New content goes in front of
//! whatever is already there, separated by a newline, with the caret
//! parked right after the inserted text. Every DOM failure along the
//! way converts to a failure result; this path never panics over a
//! malformed page.

use serde::Serialize;
use thiserror::Error;

use crate::page::{DomError, EditableKind, NodeId, PageDom, SyntheticEvent};
use crate::resolve;
use crate::selector;

/// How the chosen element accepts text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    PlainField,
    RichEditable,
}

/// Classified insertion target. Classification happens once, before
/// any mutation, so the write path cannot change its mind halfway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditableTarget {
    PlainField(NodeId),
    RichEditable(NodeId),
}

impl EditableTarget {
    fn node(self) -> NodeId {
        match self {
            EditableTarget::PlainField(node) | EditableTarget::RichEditable(node) => node,
        }
    }

    fn kind(self) -> TargetKind {
        match self {
            EditableTarget::PlainField(_) => TargetKind::PlainField,
            EditableTarget::RichEditable(_) => TargetKind::RichEditable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("this page is not a recognized chat platform")]
    UnrecognizedPlatform,
    #[error("no input field found; click a text input or textarea first")]
    NoTarget,
    #[error("no usable input field on this {platform} page; click a text input first")]
    UnsupportedTarget { platform: &'static str },
}

impl InsertError {
    /// Stable reason code for logs and transcripts.
    pub fn reason(&self) -> &'static str {
        match self {
            InsertError::UnrecognizedPlatform => "unrecognized_platform",
            InsertError::NoTarget => "no_target",
            InsertError::UnsupportedTarget { .. } => "unsupported_target",
        }
    }
}

/// What a successful insertion did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Insertion {
    pub node: NodeId,
    pub kind: TargetKind,
    /// Caret offset in characters after the inserted text.
    pub caret: usize,
}

/// Inserts `text` into the best available input on the page. `held` is
/// the tracker's candidate, consulted only when no resolved selector
/// matches anything document-wide.
pub fn insert(
    dom: &mut dyn PageDom,
    text: &str,
    held: Option<NodeId>,
) -> Result<Insertion, InsertError> {
    let resolution = resolve::resolve(dom.host_path());
    let Some(platform) = resolution.platform else {
        return Err(InsertError::UnrecognizedPlatform);
    };

    let node = find_target(dom, &resolution.selectors, held).ok_or(InsertError::NoTarget)?;
    let target = classify(dom, node).ok_or(InsertError::UnsupportedTarget { platform })?;
    let node = target.node();

    let existing = match target {
        EditableTarget::PlainField(_) => dom.value(node),
        EditableTarget::RichEditable(_) => dom.text_content(node),
    }
    .map_err(|err| dom_failure(err, platform))?;

    let (combined, caret) = compose(text, &existing);

    match target {
        EditableTarget::PlainField(_) => dom.set_value(node, &combined),
        EditableTarget::RichEditable(_) => dom.set_text_content(node, &combined),
    }
    .map_err(|err| dom_failure(err, platform))?;

    dom.focus(node).map_err(|err| dom_failure(err, platform))?;
    dom.set_caret(node, caret)
        .map_err(|err| dom_failure(err, platform))?;
    dom.dispatch(node, SyntheticEvent::Input)
        .map_err(|err| dom_failure(err, platform))?;
    dom.dispatch(node, SyntheticEvent::Change)
        .map_err(|err| dom_failure(err, platform))?;

    Ok(Insertion {
        node,
        kind: target.kind(),
        caret,
    })
}

/// Current text of an element the way the popup wants it: field value
/// or text content, whichever applies, trimmed, empty on any failure.
pub fn read_text(dom: &dyn PageDom, node: NodeId) -> String {
    let raw = match dom.kind(node) {
        EditableKind::TextArea | EditableKind::TextInput => dom.value(node).unwrap_or_default(),
        EditableKind::RichText | EditableKind::Other => {
            dom.text_content(node).unwrap_or_default()
        }
    };
    raw.trim().to_owned()
}

fn find_target(dom: &dyn PageDom, patterns: &[&str], held: Option<NodeId>) -> Option<NodeId> {
    for sel in selector::parse_all(patterns) {
        if let Some(node) = dom.query_first(&sel) {
            return Some(node);
        }
    }
    if let Some(node) = held {
        if dom.is_attached(node) {
            return Some(node);
        }
    }
    dom.focused()
}

fn classify(dom: &dyn PageDom, node: NodeId) -> Option<EditableTarget> {
    match dom.kind(node) {
        EditableKind::TextArea | EditableKind::TextInput => {
            Some(EditableTarget::PlainField(node))
        }
        EditableKind::RichText => Some(EditableTarget::RichEditable(node)),
        EditableKind::Other => None,
    }
}

/// Prepend semantics: inserted text first, then a newline separator
/// when the element already had content, then the old content. The
/// caret offset counts characters, matching `set_caret`.
fn compose(text: &str, existing: &str) -> (String, usize) {
    let separator = if existing.is_empty() { "" } else { "\n" };
    let combined = format!("{text}{separator}{existing}");
    let caret = text.chars().count() + separator.chars().count();
    (combined, caret)
}

fn dom_failure(err: DomError, platform: &'static str) -> InsertError {
    match err {
        DomError::Detached => InsertError::NoTarget,
        DomError::WrongKind => InsertError::UnsupportedTarget { platform },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memdom::{MemDom, NodeFixture, PageFixture};
    use crate::page::Viewport;

    fn page(host_path: &str, body: NodeFixture) -> MemDom {
        MemDom::from_fixture(&PageFixture {
            host_path: host_path.to_owned(),
            viewport: Viewport::default(),
            body,
        })
    }

    fn chatgpt_page() -> MemDom {
        page(
            "chatgpt.com",
            NodeFixture::new("body")
                .child(
                    NodeFixture::new("form").child(
                        NodeFixture::new("textarea")
                            .attr("id", "prompt-textarea")
                            .rect(100.0, 600.0, 500.0, 60.0),
                    ),
                )
                .child(NodeFixture::new("textarea").attr("id", "other")),
        )
    }

    // -- Composition --

    #[test]
    fn prepends_with_newline_onto_existing_content() {
        let mut dom = chatgpt_page();
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        dom.set_value(textarea, "foo").unwrap();

        let done = insert(&mut dom, "bar", None).unwrap();

        assert_eq!(done.node, textarea);
        assert_eq!(done.kind, TargetKind::PlainField);
        assert_eq!(done.caret, 4);
        assert_eq!(dom.value(textarea).unwrap(), "bar\nfoo");
        assert_eq!(dom.caret(textarea), Some(4));
        assert_eq!(dom.focused(), Some(textarea));
        assert_eq!(
            dom.dispatched_on(textarea),
            vec![SyntheticEvent::Input, SyntheticEvent::Change]
        );
    }

    #[test]
    fn empty_field_gets_no_separator() {
        let mut dom = chatgpt_page();
        let textarea = dom.first_match("#prompt-textarea").unwrap();

        let done = insert(&mut dom, "bar", None).unwrap();

        assert_eq!(done.caret, 3);
        assert_eq!(dom.value(textarea).unwrap(), "bar");
    }

    #[test]
    fn caret_counts_characters_not_bytes() {
        let mut dom = chatgpt_page();
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        dom.set_value(textarea, "x").unwrap();

        let done = insert(&mut dom, "héllo", None).unwrap();

        assert_eq!(done.caret, 6);
        assert_eq!(dom.value(textarea).unwrap(), "héllo\nx");
    }

    #[test]
    fn rich_region_uses_text_content() {
        let mut dom = page(
            "claude.ai",
            NodeFixture::new("body").child(
                NodeFixture::new("div")
                    .attr("class", "ProseMirror")
                    .attr("contenteditable", "true")
                    .text("draft")
                    .rect(100.0, 100.0, 600.0, 200.0),
            ),
        );
        let rich = dom.first_match(".ProseMirror").unwrap();

        let done = insert(&mut dom, "hi", None).unwrap();

        assert_eq!(done.kind, TargetKind::RichEditable);
        assert_eq!(dom.text_content(rich).unwrap(), "hi\ndraft");
        assert_eq!(dom.caret(rich), Some(3));
        assert_eq!(
            dom.dispatched_on(rich),
            vec![SyntheticEvent::Input, SyntheticEvent::Change]
        );
    }

    // -- Target choice --

    #[test]
    fn selector_probe_beats_the_held_candidate() {
        let mut dom = chatgpt_page();
        let primary = dom.first_match("#prompt-textarea").unwrap();
        let other = dom.first_match("#other").unwrap();

        let done = insert(&mut dom, "text", Some(other)).unwrap();

        assert_eq!(done.node, primary);
    }

    #[test]
    fn held_candidate_is_used_when_selectors_miss() {
        // No perplexity selector or fallback matches a bare input.
        let mut dom = page(
            "perplexity.ai",
            NodeFixture::new("body").child(NodeFixture::new("input").attr("id", "search")),
        );
        let input = dom.first_match("#search").unwrap();

        let done = insert(&mut dom, "text", Some(input)).unwrap();

        assert_eq!(done.node, input);
        assert_eq!(done.kind, TargetKind::PlainField);
        assert_eq!(dom.value(input).unwrap(), "text");
    }

    #[test]
    fn detached_held_candidate_falls_through_to_focus() {
        let mut dom = page(
            "perplexity.ai",
            NodeFixture::new("body")
                .child(NodeFixture::new("input").attr("id", "gone"))
                .child(NodeFixture::new("input").attr("id", "focused")),
        );
        let gone = dom.first_match("#gone").unwrap();
        let focused = dom.first_match("#focused").unwrap();
        dom.remove(gone);
        dom.focus(focused).unwrap();

        let done = insert(&mut dom, "text", Some(gone)).unwrap();

        assert_eq!(done.node, focused);
    }

    // -- Failures --

    #[test]
    fn unrecognized_platform_blocks_even_with_inputs() {
        let mut dom = page(
            "example.org",
            NodeFixture::new("body").child(NodeFixture::new("textarea")),
        );
        let before = dom.to_fixture();

        let err = insert(&mut dom, "text", None).unwrap_err();

        assert_eq!(err, InsertError::UnrecognizedPlatform);
        assert_eq!(err.reason(), "unrecognized_platform");
        assert_eq!(dom.to_fixture(), before);
        assert!(dom.dispatched().is_empty());
    }

    #[test]
    fn torn_down_page_reports_no_target() {
        // Removing the body detaches every input but leaves the query
        // walk's entry node in place; neither the selector scan nor
        // the held candidate may resurface a detached element.
        let mut dom = chatgpt_page();
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        let body = dom.first_match("body").unwrap();
        dom.focus(textarea).unwrap();
        dom.remove(body);

        let err = insert(&mut dom, "text", Some(textarea)).unwrap_err();

        assert_eq!(err, InsertError::NoTarget);
        assert_eq!(err.reason(), "no_target");
    }

    #[test]
    fn no_target_leaves_the_page_untouched() {
        let mut dom = page(
            "perplexity.ai",
            NodeFixture::new("body").child(NodeFixture::new("div").attr("class", "results")),
        );
        let before = dom.to_fixture();

        let err = insert(&mut dom, "text", None).unwrap_err();

        assert_eq!(err, InsertError::NoTarget);
        assert_eq!(err.reason(), "no_target");
        assert_eq!(dom.to_fixture(), before);
        assert!(dom.dispatched().is_empty());
    }

    #[test]
    fn non_editable_selector_hit_reports_unsupported_target() {
        // A page where the platform selector matches a plain div.
        let mut dom = page(
            "copilot.microsoft.com",
            NodeFixture::new("body").child(NodeFixture::new("div").attr("id", "userInput")),
        );
        let before = dom.to_fixture();

        let err = insert(&mut dom, "text", None).unwrap_err();

        assert_eq!(
            err,
            InsertError::UnsupportedTarget {
                platform: "Microsoft AI"
            }
        );
        assert_eq!(err.reason(), "unsupported_target");
        assert!(err.to_string().contains("Microsoft AI"));
        assert_eq!(dom.to_fixture(), before);
    }

    // -- read_text --

    #[test]
    fn read_text_trims_field_values() {
        let mut dom = chatgpt_page();
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        dom.set_value(textarea, "  hello\n").unwrap();
        assert_eq!(read_text(&dom, textarea), "hello");
    }

    #[test]
    fn read_text_falls_back_to_text_content() {
        let dom = page(
            "claude.ai",
            NodeFixture::new("body").child(
                NodeFixture::new("div")
                    .attr("contenteditable", "true")
                    .text(" spaced out "),
            ),
        );
        let rich = dom.first_match("[contenteditable=\"true\"]").unwrap();
        assert_eq!(read_text(&dom, rich), "spaced out");
    }

    #[test]
    fn read_text_is_empty_for_bare_elements() {
        let dom = page(
            "claude.ai",
            NodeFixture::new("body").child(NodeFixture::new("div").attr("id", "plain")),
        );
        let div = dom.first_match("#plain").unwrap();
        assert_eq!(read_text(&dom, div), "");
    }
}
