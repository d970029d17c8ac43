//! WebSocket connector for the live translation service.

use crate::channel::{ChannelCloser, ChannelConnector, ChannelEvent, ChannelLink};
use crate::codec::WireAudioPayload;
use crate::error::{LivelingoError, Result};
use crate::protocol::{SessionSetup, parse_server_message, realtime_input_message, setup_message};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Connects to the service's bidirectional streaming endpoint.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    endpoint: String,
}

impl LiveConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, credential: &str) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, &[("key", credential)]).map_err(|e| {
            LivelingoError::ChannelOpen {
                message: format!("invalid endpoint '{}': {}", self.endpoint, e),
            }
        })
    }
}

#[async_trait]
impl ChannelConnector for LiveConnector {
    async fn open(&self, credential: &str, setup: &SessionSetup) -> Result<ChannelLink> {
        let url = self.url(credential)?;
        let (ws_stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|e| LivelingoError::ChannelOpen {
                    message: e.to_string(),
                })?;
        log::info!("connected to {}", self.endpoint);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        ws_tx
            .send(Message::Text(setup_message(setup).into()))
            .await
            .map_err(|e| LivelingoError::ChannelOpen {
                message: format!("failed to send session setup: {}", e),
            })?;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireAudioPayload>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => break,
                    payload = outbound_rx.recv() => {
                        let Some(payload) = payload else { break };
                        let message = Message::Text(realtime_input_message(&payload).into());
                        if let Err(e) = ws_tx.send(message).await {
                            log::warn!("failed to send audio frame: {}", e);
                            break;
                        }
                    }
                }
            }
            if let Err(e) = ws_tx.close().await {
                log::debug!("websocket close failed: {}", e);
            }
        });

        let default_rate = setup.output_sample_rate;
        tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                let events = match message {
                    Ok(Message::Text(text)) => parse_server_message(text.as_str(), default_rate),
                    // The service frames its JSON as binary messages.
                    Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                        Ok(text) => parse_server_message(text, default_rate),
                        Err(_) => {
                            log::debug!("dropping non-UTF-8 binary message");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        match frame {
                            Some(frame) => {
                                log::info!("websocket closed: {} {}", frame.code, frame.reason)
                            }
                            None => log::info!("websocket closed"),
                        }
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => vec![ChannelEvent::Error(e.to_string())],
                };
                for event in events {
                    if events_tx.send(event).is_err() {
                        return;
                    }
                }
            }
            if events_tx.send(ChannelEvent::Closed).is_err() {
                log::debug!("session gone before channel close");
            }
        });

        let closer = ChannelCloser::new(move || {
            if close_tx.send(()).is_err() {
                log::debug!("channel writer already finished");
            }
        });

        Ok(ChannelLink {
            outbound: outbound_tx,
            events: events_rx,
            closer,
        })
    }
}
