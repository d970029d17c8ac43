//! In-memory connector for tests and offline runs.

use crate::channel::{ChannelCloser, ChannelConnector, ChannelEvent, ChannelLink};
use crate::codec::WireAudioPayload;
use crate::error::{LivelingoError, Result};
use crate::protocol::SessionSetup;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct ScriptedState {
    initial_events: Vec<ChannelEvent>,
    open_error: Option<String>,
    events_tx: Option<mpsc::UnboundedSender<ChannelEvent>>,
    outbound_rx: Option<mpsc::UnboundedReceiver<WireAudioPayload>>,
    sent: Vec<WireAudioPayload>,
    setups: Vec<SessionSetup>,
    credentials: Vec<String>,
    closes: usize,
}

impl ScriptedState {
    fn drain_outbound(&mut self) {
        if let Some(rx) = self.outbound_rx.as_mut() {
            while let Ok(payload) = rx.try_recv() {
                self.sent.push(payload);
            }
        }
    }
}

/// Connector whose service side is driven by the test.
///
/// Clones share state: keep one clone to push events and inspect what the
/// session sent after handing another to the controller.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered as soon as a link opens, e.g. `Opened`.
    pub fn with_initial_events(self, events: Vec<ChannelEvent>) -> Self {
        self.lock().initial_events = events;
        self
    }

    /// Make every `open` fail with `message`.
    pub fn with_open_failure(self, message: &str) -> Self {
        self.lock().open_error = Some(message.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an event on the most recently opened link.
    ///
    /// Returns false when no link is open or its receiver is gone.
    pub fn push_event(&self, event: ChannelEvent) -> bool {
        match &self.lock().events_tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Every payload sent on any link so far, in send order.
    pub fn sent_payloads(&self) -> Vec<WireAudioPayload> {
        let mut state = self.lock();
        state.drain_outbound();
        state.sent.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().setups.len()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    pub fn last_setup(&self) -> Option<SessionSetup> {
        self.lock().setups.last().cloned()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.lock().credentials.last().cloned()
    }
}

#[async_trait]
impl ChannelConnector for ScriptedConnector {
    async fn open(&self, credential: &str, setup: &SessionSetup) -> Result<ChannelLink> {
        let mut state = self.lock();
        // Keep what the previous link sent before replacing its receiver.
        state.drain_outbound();
        if let Some(message) = &state.open_error {
            return Err(LivelingoError::ChannelOpen {
                message: message.clone(),
            });
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        for event in state.initial_events.clone() {
            if events_tx.send(event).is_err() {
                break;
            }
        }

        state.setups.push(setup.clone());
        state.credentials.push(credential.to_string());
        state.events_tx = Some(events_tx);
        state.outbound_rx = Some(outbound_rx);

        let shared = Arc::clone(&self.state);
        let closer = ChannelCloser::new(move || {
            let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
            state.closes += 1;
            state.events_tx = None;
        });

        Ok(ChannelLink {
            outbound: outbound_tx,
            events: events_rx,
            closer,
        })
    }
}
