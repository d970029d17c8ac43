//! Session lifecycle: device and channel acquisition, inbound dispatch,
//! teardown.

use crate::audio::recorder::CaptureSource;
use crate::channel::{ChannelCloser, ChannelConnector, ChannelEvent};
use crate::codec::{self, WireAudioPayload};
use crate::config::Config;
use crate::defaults::PLAYBACK_REAP_MS;
use crate::error::{LivelingoError, Result};
use crate::playback::PlaybackScheduler;
use crate::protocol::SessionSetup;
use crate::session::backend::AudioBackend;
use crate::session::pump::{CaptureFailure, CapturePump};
use crate::session::state::{SessionEvent, SessionId, SessionState};
use crate::transcript::{TranscriptAggregator, TranscriptHistory, TranscriptTurn};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Capacity of each observer queue. Events beyond it are dropped.
const OBSERVER_QUEUE: usize = 256;

/// Resources owned by the running session.
struct LiveSession {
    id: SessionId,
    /// Acquired at start, handed to the pump once the channel is open.
    capture: Option<Box<dyn CaptureSource>>,
    pump: Option<CapturePump>,
    scheduler: PlaybackScheduler,
    outbound: UnboundedSender<WireAudioPayload>,
    events: UnboundedReceiver<ChannelEvent>,
    closer: ChannelCloser,
    /// Kept so `failures` never reports closed while the session lives.
    failures_tx: UnboundedSender<CaptureFailure>,
    failures: UnboundedReceiver<CaptureFailure>,
}

enum Step {
    Shutdown,
    Event(SessionId, Option<ChannelEvent>),
    CaptureFailed(Option<CaptureFailure>),
    Reap,
}

/// Owns one streaming session at a time and everything it touches.
///
/// All mutation goes through `&mut self` from a single task. Inbound events
/// carry the identity of the session they belong to; events for any other
/// session, or arriving outside `Connecting`/`Active`, are dropped.
pub struct SessionController {
    config: Config,
    backend: Arc<dyn AudioBackend>,
    connector: Arc<dyn ChannelConnector>,
    state: SessionState,
    aggregator: TranscriptAggregator,
    live: Option<LiveSession>,
    next_session: u64,
    last_error: Option<String>,
    observers: Vec<Sender<SessionEvent>>,
}

impl SessionController {
    pub fn new(
        config: Config,
        backend: Arc<dyn AudioBackend>,
        connector: Arc<dyn ChannelConnector>,
    ) -> Self {
        let aggregator = TranscriptAggregator::new(config.session.history_capacity);
        Self {
            config,
            backend,
            connector,
            state: SessionState::Idle,
            aggregator,
            live: None,
            next_session: 0,
            last_error: None,
            observers: Vec::new(),
        }
    }

    /// Register an observer for state changes, turns and errors.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = crossbeam_channel::bounded(OBSERVER_QUEUE);
        self.observers.push(tx);
        rx
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity of the running session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.live.as_ref().map(|live| live.id)
    }

    /// Most recent user-facing error, cleared by the next `start`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> &TranscriptHistory {
        self.aggregator.history()
    }

    pub fn latest_turn(&self) -> Option<&TranscriptTurn> {
        self.aggregator.latest()
    }

    pub fn aggregator(&self) -> &TranscriptAggregator {
        &self.aggregator
    }

    /// Playback state of the running session.
    pub fn playback(&self) -> Option<&PlaybackScheduler> {
        self.live.as_ref().map(|live| &live.scheduler)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Begin a session: check the credential, acquire both audio devices and
    /// open the channel.
    ///
    /// On failure the error is also surfaced to observers and through
    /// `last_error`, everything acquired so far is released and the state
    /// returns to `Idle`.
    pub async fn start(&mut self) -> Result<SessionId> {
        if self.state != SessionState::Idle {
            return Err(LivelingoError::Other(format!(
                "cannot start a session while {}",
                self.state
            )));
        }
        self.last_error = None;

        // No device or network work without a credential.
        let credential = match self.config.credential() {
            Ok(key) => key.to_string(),
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        self.set_state(SessionState::Connecting);
        self.next_session += 1;
        let id = SessionId(self.next_session);
        log::info!("starting session {id} ({})", self.config.session.mode);

        let capture = match self.backend.open_capture(&self.config.audio) {
            Ok(capture) => capture,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        let output = match self.backend.open_output(&self.config.audio) {
            Ok(output) => output,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        let mut scheduler = PlaybackScheduler::new(output);

        let setup = SessionSetup::from_config(&self.config);
        let link = match self.connector.open(&credential, &setup).await {
            Ok(link) => link,
            Err(e) => {
                scheduler.shutdown();
                self.fail(&e);
                return Err(e);
            }
        };

        let (failures_tx, failures) = mpsc::unbounded_channel();
        self.live = Some(LiveSession {
            id,
            capture: Some(capture),
            pump: None,
            scheduler,
            outbound: link.outbound,
            events: link.events,
            closer: link.closer,
            failures_tx,
            failures,
        });
        Ok(id)
    }

    /// Apply one inbound channel event to the session it belongs to.
    pub fn dispatch(&mut self, session: SessionId, event: ChannelEvent) {
        if self.session_id() != Some(session) || !self.state.accepts_events() {
            log::debug!(
                "dropping {} event for session {session} while {}",
                event.kind(),
                self.state
            );
            return;
        }
        // Until the service confirms the setup only lifecycle events count.
        if self.state == SessionState::Connecting
            && !matches!(
                event,
                ChannelEvent::Opened | ChannelEvent::Error(_) | ChannelEvent::Closed
            )
        {
            log::debug!(
                "dropping {} event for session {session} before setup completed",
                event.kind()
            );
            return;
        }

        match event {
            ChannelEvent::Opened => self.on_opened(),
            ChannelEvent::SourceFragment(text) => self.aggregator.source_fragment(&text),
            ChannelEvent::TargetFragment(text) => self.aggregator.target_fragment(&text),
            ChannelEvent::TurnComplete => {
                if let Some(turn) = self.aggregator.turn_complete() {
                    self.emit(SessionEvent::Turn(turn));
                }
            }
            ChannelEvent::Audio(payload) => self.on_audio(&payload),
            ChannelEvent::Interrupted => {
                if let Some(live) = self.live.as_mut() {
                    live.scheduler.interrupt();
                }
            }
            ChannelEvent::Error(detail) => {
                self.fail(&LivelingoError::ChannelProtocol { message: detail });
            }
            ChannelEvent::Closed => {
                log::info!("session {session} closed by the service");
                self.stop();
            }
        }
    }

    fn on_opened(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        let frame_samples = self.config.audio.frame_samples;
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let Some(capture) = live.capture.take() else {
            return;
        };

        match CapturePump::spawn(
            capture,
            live.outbound.clone(),
            frame_samples,
            live.id,
            live.failures_tx.clone(),
        ) {
            Ok(pump) => {
                live.pump = Some(pump);
                self.set_state(SessionState::Active);
            }
            Err(e) => self.fail(&e),
        }
    }

    /// End the session whose capture pump gave up on the microphone.
    ///
    /// Reports from an earlier session are ignored.
    pub fn capture_failed(&mut self, failure: CaptureFailure) {
        if self.session_id() != Some(failure.session) || !self.state.accepts_events() {
            log::debug!(
                "ignoring capture failure of session {} while {}",
                failure.session,
                self.state
            );
            return;
        }
        self.fail(&failure.error);
    }

    fn on_audio(&mut self, payload: &WireAudioPayload) {
        let channels = self.config.audio.playback_channels;
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let frame = match codec::decode(payload, payload.sample_rate(), channels) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("skipping undecodable audio frame: {e}");
                return;
            }
        };
        if let Err(e) = live.scheduler.schedule(&frame) {
            log::warn!("skipping audio frame: {e}");
        }
    }

    /// End the session and release everything it holds.
    ///
    /// Valid in any state, idempotent and never fails. Finalized transcript
    /// history is kept; unfinished text is dropped.
    pub fn stop(&mut self) {
        if self.live.is_none() && self.state == SessionState::Idle {
            return;
        }
        self.set_state(SessionState::Closing);
        self.teardown();
        self.set_state(SessionState::Idle);
    }

    fn teardown(&mut self) {
        if let Some(mut live) = self.live.take() {
            if let Some(mut pump) = live.pump.take() {
                pump.stop();
            }
            // Never started; dropping releases the device.
            drop(live.capture.take());
            live.closer.close();
            live.scheduler.shutdown();
            log::info!("session {} stopped", live.id);
        }
        self.aggregator.discard_pending();
    }

    /// Surface `error`, tear down and return to `Idle`.
    fn fail(&mut self, error: &LivelingoError) {
        let message = error.user_message();
        log::warn!("session failed: {error}");
        self.set_state(SessionState::Errored);
        self.last_error = Some(message.clone());
        self.emit(SessionEvent::Error(message));
        self.teardown();
        self.set_state(SessionState::Idle);
    }

    /// Dispatch inbound events in arrival order until the session ends or
    /// `shutdown` resolves, reaping finished playback along the way.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut reap = tokio::time::interval(Duration::from_millis(PLAYBACK_REAP_MS));
        reap.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let step = {
                let Some(live) = self.live.as_mut() else {
                    return;
                };
                let id = live.id;
                tokio::select! {
                    _ = &mut shutdown => Step::Shutdown,
                    event = live.events.recv() => Step::Event(id, event),
                    failure = live.failures.recv() => Step::CaptureFailed(failure),
                    _ = reap.tick() => Step::Reap,
                }
            };

            match step {
                Step::Shutdown => {
                    self.stop();
                    return;
                }
                Step::Event(id, Some(event)) => self.dispatch(id, event),
                Step::Event(id, None) => self.dispatch(id, ChannelEvent::Closed),
                Step::CaptureFailed(Some(failure)) => self.capture_failed(failure),
                // Unreachable while the session holds `failures_tx`.
                Step::CaptureFailed(None) => {}
                Step::Reap => {
                    if let Some(live) = self.live.as_mut() {
                        live.scheduler.reap_completed();
                    }
                }
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        log::debug!("session state {} -> {}", self.state, state);
        self.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.observers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("observer queue full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
