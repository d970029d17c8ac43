//! Duplex channel to the translation service.
//!
//! A connector opens a [`ChannelLink`]: an unbounded outbound queue of
//! encoded frames, a single ordered queue of inbound [`ChannelEvent`]s and a
//! closer. Sends made before the service confirms the session are queued,
//! never dropped.

#[cfg(feature = "live-channel")]
pub mod live;
pub mod scripted;

use crate::codec::WireAudioPayload;
use crate::error::Result;
use crate::protocol::SessionSetup;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

#[cfg(feature = "live-channel")]
pub use live::LiveConnector;
pub use scripted::ScriptedConnector;

/// Something the service told us, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The service accepted the session setup.
    Opened,
    /// Recognized text of the user's speech.
    SourceFragment(String),
    /// Text of the translated output.
    TargetFragment(String),
    TurnComplete,
    /// Synthesized speech.
    Audio(WireAudioPayload),
    /// The user started speaking over the synthesized output.
    Interrupted,
    Error(String),
    Closed,
}

impl ChannelEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::Opened => "opened",
            ChannelEvent::SourceFragment(_) => "source-fragment",
            ChannelEvent::TargetFragment(_) => "target-fragment",
            ChannelEvent::TurnComplete => "turn-complete",
            ChannelEvent::Audio(_) => "audio",
            ChannelEvent::Interrupted => "interrupted",
            ChannelEvent::Error(_) => "error",
            ChannelEvent::Closed => "closed",
        }
    }
}

/// Closes the underlying connection once.
pub struct ChannelCloser {
    close: Option<Box<dyn FnOnce() + Send>>,
}

impl ChannelCloser {
    pub fn new(close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            close: Some(Box::new(close)),
        }
    }

    /// A closer with nothing to close.
    pub fn noop() -> Self {
        Self { close: None }
    }

    /// Run the close action. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(close) = self.close.take() {
            close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_none()
    }
}

impl fmt::Debug for ChannelCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCloser")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An open session with the service.
#[derive(Debug)]
pub struct ChannelLink {
    pub outbound: mpsc::UnboundedSender<WireAudioPayload>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub closer: ChannelCloser,
}

/// Opens duplex sessions with the service.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connect and send the session setup.
    ///
    /// Returns once the connection is up; acceptance of the setup arrives
    /// later as [`ChannelEvent::Opened`].
    async fn open(&self, credential: &str, setup: &SessionSetup) -> Result<ChannelLink>;
}
