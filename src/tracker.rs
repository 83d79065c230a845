//! Input candidate tracking.
//!
//! At most one element per page is the insertion candidate at a time,
//! and this state machine is the only thing that decides which. Focus
//! events either adopt the focused element (when it matches a resolved
//! selector) or drop the current candidate; periodic rechecks drop a
//! candidate that has left the page or become invisible. Holding a
//! candidate asserts nothing about the future, so every decision
//! revalidates against the live page.

use crate::page::{NodeId, PageDom};
use crate::selector::{self, Selector};

/// Tracker state. Either arm can follow either arm; adopting while one
/// is already held just replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    NoCandidate,
    HasCandidate(NodeId),
}

pub struct InputTracker {
    selectors: Vec<Selector>,
    state: TrackState,
}

impl InputTracker {
    /// Builds a tracker for the resolved selector list. Patterns the
    /// selector subset cannot parse are skipped, same as a probe-time
    /// query error would be.
    pub fn new(patterns: &[&str]) -> Self {
        Self {
            selectors: selector::parse_all(patterns),
            state: TrackState::NoCandidate,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn candidate(&self) -> Option<NodeId> {
        match self.state {
            TrackState::HasCandidate(id) => Some(id),
            TrackState::NoCandidate => None,
        }
    }

    /// Focus moved to `target`. A match adopts it, anything else drops
    /// the held candidate. Returns the candidate after the transition.
    pub fn on_focus_in(&mut self, dom: &dyn PageDom, target: NodeId) -> Option<NodeId> {
        let matched = self
            .selectors
            .iter()
            .any(|sel| dom.element_matches(target, sel));
        self.state = if matched {
            TrackState::HasCandidate(target)
        } else {
            TrackState::NoCandidate
        };
        self.candidate()
    }

    /// Revalidates the held candidate against the live page: gone or
    /// invisible means dropped. Keeping it is a self-transition; the
    /// caller recomputes overlay geometry either way.
    pub fn recheck(&mut self, dom: &dyn PageDom) -> Option<NodeId> {
        if let TrackState::HasCandidate(id) = self.state {
            if !dom.is_attached(id) || !is_visible(dom, id) {
                self.state = TrackState::NoCandidate;
            }
        }
        self.candidate()
    }
}

/// Visibility for tracking purposes: a positive-area rect that has not
/// entirely left the vertical viewport range. Partial overlap counts as
/// visible. A detached node reports a zero rect and fails the area
/// test.
pub fn is_visible(dom: &dyn PageDom, node: NodeId) -> bool {
    let rect = dom.rect(node);
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return false;
    }
    let viewport_height = dom.viewport().height;
    rect.bottom() > 0.0 && rect.top() < viewport_height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memdom::{MemDom, NodeFixture, PageFixture};
    use crate::page::{Rect, Viewport};

    const SELECTORS: &[&str] = &["#prompt-textarea", "form textarea", "textarea"];

    fn page() -> MemDom {
        MemDom::from_fixture(&PageFixture {
            host_path: "chatgpt.com".to_owned(),
            viewport: Viewport {
                height: 600.0,
                scroll_x: 0.0,
                scroll_y: 0.0,
            },
            body: NodeFixture::new("body")
                .child(
                    NodeFixture::new("form").child(
                        NodeFixture::new("textarea")
                            .attr("id", "prompt-textarea")
                            .rect(50.0, 400.0, 500.0, 60.0),
                    ),
                )
                .child(
                    NodeFixture::new("div")
                        .attr("class", "sidebar")
                        .rect(0.0, 0.0, 200.0, 600.0),
                )
                .child(
                    NodeFixture::new("textarea")
                        .attr("id", "other")
                        .rect(50.0, 500.0, 500.0, 40.0),
                ),
        })
    }

    // -- Focus transitions --

    #[test]
    fn matching_focus_adopts_the_target() {
        let dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();

        assert_eq!(tracker.on_focus_in(&dom, textarea), Some(textarea));
        assert_eq!(tracker.state(), TrackState::HasCandidate(textarea));
    }

    #[test]
    fn non_matching_focus_drops_the_candidate() {
        let dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        let sidebar = dom.first_match(".sidebar").unwrap();

        tracker.on_focus_in(&dom, textarea);
        assert_eq!(tracker.on_focus_in(&dom, sidebar), None);
        assert_eq!(tracker.state(), TrackState::NoCandidate);
    }

    #[test]
    fn refocusing_replaces_the_candidate() {
        let dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let first = dom.first_match("#prompt-textarea").unwrap();
        let second = dom.first_match("#other").unwrap();

        tracker.on_focus_in(&dom, first);
        assert_eq!(tracker.on_focus_in(&dom, second), Some(second));
        assert_eq!(tracker.state(), TrackState::HasCandidate(second));
    }

    // -- Rechecks --

    #[test]
    fn recheck_keeps_a_live_visible_candidate() {
        let dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();

        tracker.on_focus_in(&dom, textarea);
        assert_eq!(tracker.recheck(&dom), Some(textarea));
    }

    #[test]
    fn recheck_drops_a_removed_candidate() {
        let mut dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();

        tracker.on_focus_in(&dom, textarea);
        dom.remove(textarea);
        assert_eq!(tracker.recheck(&dom), None);
        assert_eq!(tracker.state(), TrackState::NoCandidate);
    }

    #[test]
    fn recheck_drops_a_zero_area_candidate() {
        let mut dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();

        tracker.on_focus_in(&dom, textarea);
        dom.set_rect(textarea, Rect::new(50.0, 400.0, 0.0, 0.0));
        assert_eq!(tracker.recheck(&dom), None);
    }

    #[test]
    fn recheck_drops_a_candidate_scrolled_fully_out() {
        let mut dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        tracker.on_focus_in(&dom, textarea);

        // Entirely below the viewport.
        dom.set_rect(textarea, Rect::new(50.0, 600.0, 500.0, 60.0));
        assert_eq!(tracker.recheck(&dom), None);

        tracker.on_focus_in(&dom, textarea);
        // Entirely above.
        dom.set_rect(textarea, Rect::new(50.0, -80.0, 500.0, 60.0));
        assert_eq!(tracker.recheck(&dom), None);
    }

    #[test]
    fn partial_visibility_is_still_visible() {
        let mut dom = page();
        let mut tracker = InputTracker::new(SELECTORS);
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        tracker.on_focus_in(&dom, textarea);

        // Bottom half hangs below the fold.
        dom.set_rect(textarea, Rect::new(50.0, 570.0, 500.0, 60.0));
        assert_eq!(tracker.recheck(&dom), Some(textarea));

        // Top half above the viewport.
        dom.set_rect(textarea, Rect::new(50.0, -30.0, 500.0, 60.0));
        assert_eq!(tracker.recheck(&dom), Some(textarea));
    }

    // -- Selector handling --

    #[test]
    fn unparsable_patterns_are_skipped() {
        let dom = page();
        let mut tracker = InputTracker::new(&["div:focus-within", "#prompt-textarea"]);
        let textarea = dom.first_match("#prompt-textarea").unwrap();
        assert_eq!(tracker.on_focus_in(&dom, textarea), Some(textarea));
    }
}
