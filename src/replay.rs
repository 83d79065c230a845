//! Scripted page sessions.
//!
//! `promptdock replay <PAGE>` loads an in-memory page fixture and runs
//! a live agent loop against it: trace events arrive as JSON lines on
//! stdin, and every observable effect leaves as a JSON line on stdout.
//! The loop here owns the production timing for a page: the debounced
//! resize edge, the periodic candidate recheck, init retries with
//! backoff and a liveness re-attempt, and the success-flash window, so
//! a trace exercises the same scheduling a real page would. A `wait`
//! event parks the reader and lets that scheduled work run; end of
//! input ends the session.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::agent::{HostRuntime, InitOutcome, PageAgent};
use crate::overlay::{self, OverlayUpdate};
use crate::page::memdom::{FixtureError, MemDom};
use crate::page::{PageDom, Rect};
use crate::protocol::{Outbound, Request, Response};
use crate::schedule::{self, Alarm, Backoff, Debouncer};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error("event stream failed: {0}")]
    Stream(#[from] LinesCodecError),
    #[error("line {line}: bad trace event: {source}")]
    BadEvent {
        line: usize,
        source: serde_json::Error,
    },
    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct ReplayOptions {
    pub page: PathBuf,
    pub runtime_delay: Option<Duration>,
    pub dump: bool,
}

/// One line of the inbound trace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum TraceEvent {
    /// Focus lands on the first element matching `target`.
    FocusIn { target: String },
    /// Viewport height changes; runs through the resize debouncer.
    Resize { height: f64 },
    /// Page scroll offsets change. No handler runs for this, just
    /// like the page: the periodic recheck picks up the new geometry.
    Scroll { x: f64, y: f64 },
    /// The first element matching `target` leaves the page.
    Remove { target: String },
    /// Move or resize the first element matching `target`.
    SetRect {
        target: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// The floating affordance is clicked.
    OverlayClick,
    /// A protocol request arriving from a UI surface.
    Message { message: Request },
    /// Park the reader and let scheduled work run for `ms`.
    Wait { ms: u64 },
}

/// One line of the outbound transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "output", rename_all = "camelCase")]
enum TraceOutput {
    Init {
        outcome: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        platform: Option<&'static str>,
    },
    Overlay {
        #[serde(flatten)]
        update: OverlayUpdate,
    },
    Alert {
        message: String,
    },
    Response {
        #[serde(flatten)]
        response: Response,
    },
    Outbound {
        #[serde(flatten)]
        message: Outbound,
    },
    Dropped {
        reason: &'static str,
    },
}

/// Host runtime that becomes ready a fixed delay after construction,
/// standing in for an extension context that is still starting up.
pub struct DelayedRuntime {
    ready_at: Instant,
}

impl DelayedRuntime {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            ready_at: Instant::now() + delay.unwrap_or(Duration::ZERO),
        }
    }
}

impl HostRuntime for DelayedRuntime {
    fn ready(&self) -> bool {
        Instant::now() >= self.ready_at
    }
}

pub async fn run(options: ReplayOptions) -> Result<(), ReplayError> {
    let mut dom = MemDom::load(&options.page)?;
    let runtime = DelayedRuntime::new(options.runtime_delay);
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    drive(&mut dom, &runtime, stdin, &mut stdout).await?;

    if options.dump {
        let mut dump = serde_json::to_string_pretty(&dom.to_fixture())?;
        dump.push('\n');
        stdout.write_all(dump.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn drive<R, W>(
    dom: &mut MemDom,
    runtime: &dyn HostRuntime,
    input: R,
    out: &mut W,
) -> Result<(), ReplayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(input, LinesCodec::new());
    let mut session = Session {
        dom,
        runtime,
        agent: PageAgent::new(),
        backoff: Backoff::new(schedule::INIT_BACKOFF),
        overlay: OverlaySink::default(),
        out,
    };
    let mut resize = Debouncer::new(schedule::RESIZE_DEBOUNCE);
    let mut init_retry = Alarm::new();
    let mut gate = Alarm::new();
    let mut flash = Alarm::new();
    let mut recheck = interval_at(
        Instant::now() + schedule::RECHECK_INTERVAL,
        schedule::RECHECK_INTERVAL,
    );
    recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut liveness = interval_at(
        Instant::now() + schedule::INIT_LIVENESS_INTERVAL,
        schedule::INIT_LIVENESS_INTERVAL,
    );
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut line_no = 0usize;

    session.attempt_init(&mut init_retry).await?;

    loop {
        tokio::select! {
            maybe_line = lines.next(), if !gate.is_armed() => {
                let Some(line) = maybe_line else { break };
                let line = line?;
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let event = serde_json::from_str(&line)
                    .map_err(|source| ReplayError::BadEvent { line: line_no, source })?;
                session
                    .handle_event(event, &mut resize, &mut gate, &mut flash)
                    .await?;
            }
            _ = gate.fired(), if gate.is_armed() => {}
            _ = resize.fired(), if resize.is_pending() => {
                let update = session.agent.on_recheck(session.dom);
                session.emit_overlay(update).await?;
            }
            _ = flash.fired() => {
                // The flash window closed; put the button back in its
                // steady state, which may have moved meanwhile.
                session.overlay.clear();
                let update = session.agent.on_recheck(session.dom);
                session.emit_overlay(update).await?;
            }
            _ = recheck.tick() => {
                let update = session.agent.on_recheck(session.dom);
                session.emit_overlay(update).await?;
            }
            _ = init_retry.fired(), if !session.agent.initialized() => {
                session.attempt_init(&mut init_retry).await?;
            }
            _ = liveness.tick(), if !session.agent.initialized() => {
                session.attempt_init(&mut init_retry).await?;
            }
        }
    }
    Ok(())
}

struct Session<'a, W> {
    dom: &'a mut MemDom,
    runtime: &'a dyn HostRuntime,
    agent: PageAgent,
    backoff: Backoff,
    overlay: OverlaySink,
    out: &'a mut W,
}

impl<W: AsyncWrite + Unpin> Session<'_, W> {
    async fn attempt_init(&mut self, retry: &mut Alarm) -> Result<(), ReplayError> {
        match self.agent.init(self.dom, self.runtime) {
            InitOutcome::Activated { platform } => {
                // A liveness attempt can win while a backoff retry is
                // still armed.
                retry.cancel();
                self.emit(TraceOutput::Init {
                    outcome: "activated",
                    platform: Some(platform),
                })
                .await
            }
            InitOutcome::Dormant => {
                retry.cancel();
                self.emit(TraceOutput::Init {
                    outcome: "dormant",
                    platform: None,
                })
                .await
            }
            InitOutcome::NotReady => {
                retry.arm(self.backoff.next_delay());
                self.emit(TraceOutput::Init {
                    outcome: "deferred",
                    platform: None,
                })
                .await
            }
            InitOutcome::AlreadyInitialized => Ok(()),
        }
    }

    async fn handle_event(
        &mut self,
        event: TraceEvent,
        resize: &mut Debouncer,
        gate: &mut Alarm,
        flash: &mut Alarm,
    ) -> Result<(), ReplayError> {
        match event {
            TraceEvent::FocusIn { target } => match self.dom.first_match(&target) {
                Some(node) => {
                    let _ = self.dom.focus(node);
                    let update = self.agent.on_focus_in(self.dom, node);
                    self.emit_overlay(update).await?;
                }
                None => tracing::warn!(target, "focus target not found in page"),
            },
            TraceEvent::Resize { height } => {
                self.dom.set_viewport_height(height);
                resize.touch();
            }
            TraceEvent::Scroll { x, y } => self.dom.set_scroll(x, y),
            TraceEvent::Remove { target } => match self.dom.first_match(&target) {
                Some(node) => self.dom.remove(node),
                None => tracing::warn!(target, "removal target not found in page"),
            },
            TraceEvent::SetRect {
                target,
                x,
                y,
                width,
                height,
            } => match self.dom.first_match(&target) {
                Some(node) => self.dom.set_rect(node, Rect::new(x, y, width, height)),
                None => tracing::warn!(target, "rect target not found in page"),
            },
            TraceEvent::OverlayClick => {
                let message = self.agent.on_overlay_click();
                self.emit(TraceOutput::Outbound { message }).await?;
            }
            TraceEvent::Message { message } => self.handle_message(message, flash).await?,
            TraceEvent::Wait { ms } => gate.arm(Duration::from_millis(ms)),
        }
        Ok(())
    }

    async fn handle_message(
        &mut self,
        request: Request,
        flash: &mut Alarm,
    ) -> Result<(), ReplayError> {
        if !self.agent.initialized() {
            // No listener is installed before init completes.
            tracing::warn!("request before initialization, dropping");
            return self
                .emit(TraceOutput::Dropped {
                    reason: "not_initialized",
                })
                .await;
        }
        let outcome = self.agent.handle_request(self.dom, request);
        if let Some(message) = outcome.alert {
            self.emit(TraceOutput::Alert { message }).await?;
        }
        if outcome.overlay == Some(OverlayUpdate::FlashSuccess) {
            flash.arm(overlay::SUCCESS_FLASH);
        }
        self.emit_overlay(outcome.overlay).await?;
        self.emit(TraceOutput::Response {
            response: outcome.response,
        })
        .await
    }

    async fn emit_overlay(&mut self, update: Option<OverlayUpdate>) -> Result<(), ReplayError> {
        let Some(update) = update else {
            return Ok(());
        };
        if let Some(update) = self.overlay.filter(update) {
            self.emit(TraceOutput::Overlay { update }).await?;
        }
        Ok(())
    }

    async fn emit(&mut self, output: TraceOutput) -> Result<(), ReplayError> {
        let mut line = serde_json::to_string(&output)?;
        line.push('\n');
        self.out.write_all(line.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Collapses consecutive identical show/hide commands so the periodic
/// recheck does not spam the transcript. Success flashes always pass.
#[derive(Debug, Default)]
struct OverlaySink {
    last: Option<OverlayUpdate>,
}

impl OverlaySink {
    /// Forgets the last steady state, forcing the next show or hide
    /// through even if it repeats.
    fn clear(&mut self) {
        self.last = None;
    }

    fn filter(&mut self, update: OverlayUpdate) -> Option<OverlayUpdate> {
        match update {
            OverlayUpdate::FlashSuccess => Some(update),
            other => {
                if self.last == Some(other) {
                    return None;
                }
                self.last = Some(other);
                Some(other)
            }
        }
    }
}
