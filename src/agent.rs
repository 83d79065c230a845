//! Page agent.
//!
//! One agent runs per page and owns everything that makes the page
//! live: the init gate, the resolved platform, the input tracker, and
//! the affordance state. Event handling is synchronous; the runner
//! owns all timers and calls in here on the edges it schedules
//! (debounced resize, periodic recheck, init retries). On an
//! unrecognized page the agent initializes dormant: no tracking, no
//! overlay, but protocol requests are still answered so an explicit
//! insertion can fail with a precise reason instead of vanishing.

use crate::insert::{self, InsertError};
use crate::overlay::{self, OverlayUpdate};
use crate::page::{NodeId, PageDom};
use crate::protocol::{Outbound, Request, Response};
use crate::resolve;
use crate::tracker::InputTracker;

/// Liveness probe for the hosting runtime. A content script can
/// outlive its extension context (update, reload), so init waits for
/// the probe before wiring anything up.
pub trait HostRuntime {
    fn ready(&self) -> bool;
}

/// Outcome of one init attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Recognized platform; detection is live.
    Activated { platform: &'static str },
    /// Unrecognized page; staying passive but answering requests.
    Dormant,
    /// Init already ran; guarded no-op.
    AlreadyInitialized,
    /// Host runtime unavailable; retry later.
    NotReady,
}

/// What handling one request asks the runner to do. The response goes
/// back over the message channel; the alert and overlay command go to
/// the page surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub response: Response,
    pub alert: Option<String>,
    pub overlay: Option<OverlayUpdate>,
}

enum Phase {
    Uninitialized,
    Dormant,
    Active(Active),
}

struct Active {
    platform: &'static str,
    tracker: InputTracker,
}

pub struct PageAgent {
    phase: Phase,
}

impl PageAgent {
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
        }
    }

    /// True once init ran, dormant or active.
    pub fn initialized(&self) -> bool {
        !matches!(self.phase, Phase::Uninitialized)
    }

    #[allow(dead_code)]
    pub fn platform(&self) -> Option<&'static str> {
        match &self.phase {
            Phase::Active(active) => Some(active.platform),
            _ => None,
        }
    }

    pub fn candidate(&self) -> Option<NodeId> {
        match &self.phase {
            Phase::Active(active) => active.tracker.candidate(),
            _ => None,
        }
    }

    /// Attempts initialization. Idempotent by construction: whatever
    /// the first completed attempt decided stays decided.
    pub fn init(&mut self, dom: &dyn PageDom, runtime: &dyn HostRuntime) -> InitOutcome {
        if self.initialized() {
            return InitOutcome::AlreadyInitialized;
        }
        if !runtime.ready() {
            tracing::debug!("host runtime not ready, deferring init");
            return InitOutcome::NotReady;
        }

        let resolution = resolve::resolve(dom.host_path());
        match resolution.platform {
            Some(platform) => {
                tracing::info!(platform, host = dom.host_path(), "platform recognized");
                self.phase = Phase::Active(Active {
                    platform,
                    tracker: InputTracker::new(&resolution.selectors),
                });
                InitOutcome::Activated { platform }
            }
            None => {
                tracing::info!(host = dom.host_path(), "unrecognized host, staying dormant");
                self.phase = Phase::Dormant;
                InitOutcome::Dormant
            }
        }
    }

    /// Focus moved to `target`. Returns the overlay command to apply,
    /// or `None` when the page is not active.
    pub fn on_focus_in(&mut self, dom: &dyn PageDom, target: NodeId) -> Option<OverlayUpdate> {
        let Phase::Active(active) = &mut self.phase else {
            return None;
        };
        let candidate = active.tracker.on_focus_in(dom, target);
        Some(overlay::update_for(dom, candidate))
    }

    /// Revalidates the candidate and recomputes overlay geometry. The
    /// runner calls this on the debounced resize edge and the periodic
    /// tick.
    pub fn on_recheck(&mut self, dom: &dyn PageDom) -> Option<OverlayUpdate> {
        let Phase::Active(active) = &mut self.phase else {
            return None;
        };
        let candidate = active.tracker.recheck(dom);
        Some(overlay::update_for(dom, candidate))
    }

    /// The affordance never inserts; it asks for the library UI.
    pub fn on_overlay_click(&self) -> Outbound {
        Outbound::OpenPopup
    }

    pub fn handle_request(&mut self, dom: &mut dyn PageDom, request: Request) -> RequestOutcome {
        match request {
            Request::InsertPrompt { content } => self.insert_prompt(dom, &content),
            Request::GetTextareaContent => RequestOutcome {
                response: Response::Content {
                    content: self.current_text(dom),
                },
                alert: None,
                overlay: None,
            },
        }
    }

    fn insert_prompt(&mut self, dom: &mut dyn PageDom, content: &str) -> RequestOutcome {
        match insert::insert(dom, content, self.candidate()) {
            Ok(done) => {
                tracing::info!(node = done.node.0, kind = ?done.kind, caret = done.caret, "prompt inserted");
                RequestOutcome {
                    response: Response::Insert { success: true },
                    alert: None,
                    overlay: Some(OverlayUpdate::FlashSuccess),
                }
            }
            Err(err) => {
                tracing::warn!(reason = err.reason(), "insertion failed");
                RequestOutcome {
                    response: Response::Insert { success: false },
                    alert: Some(alert_text(&err)),
                    overlay: None,
                }
            }
        }
    }

    fn current_text(&self, dom: &dyn PageDom) -> String {
        match self.candidate() {
            Some(node) => insert::read_text(dom, node),
            None => String::new(),
        }
    }
}

/// A user asked for this insertion, so a failure must say why, not
/// disappear.
fn alert_text(err: &InsertError) -> String {
    format!("Cannot insert prompt: {err}.")
}
