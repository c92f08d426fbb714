//! Runtime integration – DoorAgent drives the door service and serves
//! trigger sources.
//!
//! ## Inbound
//!
//! Trigger sources (command layer, redstone adapter, the auto-close
//! scheduler) send [`ToggleRequest`]s into the agent's request channel. Each
//! request gets its own orchestrator task, so a slow pipeline never holds up
//! the tick loop.
//!
//! ## Outbound
//!
//! | Subject               | Payload type                       |
//! |-----------------------|------------------------------------|
//! | `doors.toggle.start`  | `DoorEvent<ToggleStartEvent>`      |
//! | `doors.toggle.end`    | `DoorEvent<ToggleEndEvent>`        |
//! | `doors.toggle.failed` | `DoorEvent<ToggleFailedEvent>`     |
//! | `doors.outcome`       | `DoorEvent<OutcomeMsg>`            |
//!
//! Outbound messages are serialised JSON on a Tokio broadcast channel of
//! [`Published`] frames; observers subscribe with [`Outbound::subscribe`].
//!
//! Transport adapters feed raw inbound messages to
//! [`DoorAgent::handle_command`].

use crate::events::{ToggleEndEvent, ToggleFailedEvent, ToggleListener, ToggleStartEvent};
use crate::orchestrator::ToggleOrchestrator;
use crate::protocol::{parse_request, subjects, CmdAbort, DoorEvent, OutcomeMsg};
use crate::request::ToggleRequest;
use crate::service::DoorService;
use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// Outbound channel
// ---------------------------------------------------------------------------

/// One serialised outbound message.
#[derive(Debug, Clone)]
pub struct Published {
    pub subject: &'static str,
    pub payload: Bytes,
}

/// Broadcast sink for outbound messages, stamped with session and frame.
#[derive(Clone)]
pub struct Outbound {
    session: String,
    frame: Arc<AtomicU64>,
    tx: broadcast::Sender<Published>,
}

impl Outbound {
    pub fn new(session: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            session: session.into(),
            frame: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn set_frame(&self, frame: u64) {
        self.frame.store(frame, Ordering::Relaxed);
    }

    /// Serialise `payload` and publish it on `subject`.
    ///
    /// Errors are logged and swallowed; a failed publish must not disturb a
    /// toggle.
    pub fn publish<T: Serialize>(&self, subject: &'static str, payload: &T) {
        let event = DoorEvent::new(
            self.session.as_str(),
            self.frame.load(Ordering::Relaxed),
            payload,
        );
        match serde_json::to_vec(&event) {
            Ok(bytes) => {
                // No subscribers is fine.
                let _ = self.tx.send(Published {
                    subject,
                    payload: Bytes::from(bytes),
                });
            }
            Err(e) => warn!("Failed to serialise event for {}: {}", subject, e),
        }
    }
}

impl ToggleListener for Outbound {
    fn on_start(&self, event: &ToggleStartEvent) {
        self.publish(subjects::TOGGLE_START, event);
    }

    fn on_end(&self, event: &ToggleEndEvent) {
        self.publish(subjects::TOGGLE_END, event);
    }

    fn on_failed(&self, event: &ToggleFailedEvent) {
        self.publish(subjects::TOGGLE_FAILED, event);
    }
}

// ---------------------------------------------------------------------------
// Config for DoorAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DoorAgentConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for DoorAgentConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 20.0 }
    }
}

// ---------------------------------------------------------------------------
// DoorAgent
// ---------------------------------------------------------------------------

/// Ticks a [`DoorService`] and turns incoming requests into orchestrator
/// pipelines.
///
/// Call [`DoorAgent::run`] inside a Tokio runtime to start the agent.
pub struct DoorAgent {
    config: DoorAgentConfig,
    service: Arc<Mutex<DoorService>>,
    orchestrator: Arc<ToggleOrchestrator>,
    requests: mpsc::UnboundedReceiver<ToggleRequest>,
    outbound: Outbound,
}

impl DoorAgent {
    pub fn new(
        config: DoorAgentConfig,
        service: Arc<Mutex<DoorService>>,
        orchestrator: Arc<ToggleOrchestrator>,
        requests: mpsc::UnboundedReceiver<ToggleRequest>,
        outbound: Outbound,
    ) -> Self {
        Self {
            config,
            service,
            orchestrator,
            requests,
            outbound,
        }
    }

    /// Run the tick loop and serve requests until Ctrl-C or until every
    /// request sender is gone.
    pub async fn run(mut self) -> Result<()> {
        if !(self.config.tick_rate_hz > 0.0) {
            anyhow::bail!("tick rate must be positive, got {}", self.config.tick_rate_hz);
        }
        info!("DoorAgent active – ticking at {:.0}Hz", self.config.tick_rate_hz);

        // -------------------------------------------------------------------
        // Spawn tick loop
        // -------------------------------------------------------------------

        let service_tick = Arc::clone(&self.service);
        let tick_outbound = self.outbound.clone();
        let interval = std::time::Duration::from_secs_f32(1.0 / self.config.tick_rate_hz);

        let tick_handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;

                // Hold the lock only for the tick itself.
                let events = service_tick.lock().tick();
                tick_outbound.set_frame(events.tick);

                for id in &events.started {
                    debug!("Tick {}: structure {} picked up", events.tick, id);
                }
                for report in &events.completed {
                    debug!(
                        "Tick {}: structure {} settled in {} ({} blocks)",
                        events.tick, report.structure_id, report.destination, report.committed
                    );
                }
                for (id, e) in &events.aborted {
                    warn!("Tick {}: structure {} aborted: {}", events.tick, id, e);
                }
            }
        });

        // -------------------------------------------------------------------
        // Serve requests until shutdown
        // -------------------------------------------------------------------

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        info!("DoorAgent request channel closed");
                        break;
                    };
                    self.dispatch(request);
                }
                result = &mut shutdown => {
                    result.context("Failed to listen for Ctrl-C")?;
                    info!("DoorAgent shutting down (SIGINT)");
                    break;
                }
            }
        }

        tick_handle.abort();
        self.orchestrator.auto_close().cancel_all();
        let stopped = self.service.lock().shutdown();
        if stopped > 0 {
            info!("Stopped {} in-flight animation(s)", stopped);
        }
        Ok(())
    }

    /// Answer one inbound message from a transport adapter.
    ///
    /// | Subject            | Payload          | Reply                      |
    /// |--------------------|------------------|----------------------------|
    /// | `doors.request`    | `ToggleRequest`  | `{"accepted": true}`       |
    /// | `doors.cmd.stats`  | *(empty)*        | `DoorStats`                |
    /// | `doors.cmd.abort`  | `CmdAbort`       | `{"aborted": bool}`        |
    ///
    /// Toggle outcomes are not part of the reply; they arrive later on
    /// `doors.outcome`.
    pub fn handle_command(&self, subject: &str, payload: &[u8]) -> Result<Bytes> {
        let reply = match subject {
            subjects::REQUEST => {
                let request = parse_request(payload).context("Invalid toggle request")?;
                self.dispatch(request);
                json!({ "accepted": true })
            }
            subjects::CMD_STATS => serde_json::to_value(self.service.lock().stats())?,
            subjects::CMD_ABORT => {
                let cmd: CmdAbort =
                    serde_json::from_slice(payload).context("Invalid abort command")?;
                json!({ "aborted": self.orchestrator.abort(cmd.structure_id) })
            }
            other => anyhow::bail!("unknown subject '{}'", other),
        };
        Ok(Bytes::from(serde_json::to_vec(&reply)?))
    }

    fn dispatch(&self, request: ToggleRequest) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            for (id, outcome) in orchestrator.submit(request).await {
                info!("Structure {}: {}", id, outcome);
                outbound.publish(subjects::OUTCOME, &OutcomeMsg::from_outcome(id, &outcome));
            }
        });
    }
}
