//! Wire format of the live translation service.
//!
//! The client sends one `setup` message, then a `realtimeInput` message per
//! captured frame. The server answers with `setupComplete`, incremental
//! `serverContent` messages and occasionally an `error` object.

use crate::channel::ChannelEvent;
use crate::codec::WireAudioPayload;
use crate::config::{Config, LanguageMode};
use serde::Deserialize;
use serde_json::json;

/// Parameters of one live session, sent in the setup message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub model: String,
    pub voice: String,
    pub mode: LanguageMode,
    /// Rate assumed for returned audio that carries no rate in its MIME type.
    pub output_sample_rate: u32,
}

impl SessionSetup {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.api.model.clone(),
            voice: config.session.voice.clone(),
            mode: config.session.mode,
            output_sample_rate: config.audio.playback_sample_rate,
        }
    }

    fn qualified_model(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}

/// The first message on a fresh connection.
pub fn setup_message(setup: &SessionSetup) -> String {
    json!({
        "setup": {
            "model": setup.qualified_model(),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": {
                            "voiceName": setup.voice
                        }
                    }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": setup.mode.system_instruction() }]
            },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {}
        }
    })
    .to_string()
}

/// One captured frame as a streaming input message.
pub fn realtime_input_message(payload: &WireAudioPayload) -> String {
    json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": payload.mime_type(),
                "data": payload.as_base64()
            }]
        }
    })
    .to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    error: Option<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    #[serde(default)]
    turn_complete: bool,
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct ServerError {
    #[serde(default)]
    message: String,
}

/// Extract `rate=N` from a MIME type such as `audio/pcm;rate=24000`.
fn rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

/// Translate one server message into channel events.
///
/// Within a message, events come out in the order input transcription,
/// output transcription, turn complete, audio, interrupted. Unknown or
/// malformed messages yield a protocol error event rather than failing.
pub fn parse_server_message(text: &str, default_rate: u32) -> Vec<ChannelEvent> {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("unparseable server message: {e}");
            return vec![ChannelEvent::Error(format!("malformed server message: {e}"))];
        }
    };

    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(ChannelEvent::Opened);
    }

    if let Some(content) = message.server_content {
        if let Some(input) = content.input_transcription
            && !input.text.is_empty()
        {
            events.push(ChannelEvent::SourceFragment(input.text));
        }
        if let Some(output) = content.output_transcription
            && !output.text.is_empty()
        {
            events.push(ChannelEvent::TargetFragment(output.text));
        }
        if content.turn_complete {
            events.push(ChannelEvent::TurnComplete);
        }
        if let Some(turn) = content.model_turn {
            for inline in turn.parts.into_iter().filter_map(|p| p.inline_data) {
                if inline.data.is_empty() {
                    continue;
                }
                let rate = rate_from_mime(&inline.mime_type).unwrap_or(default_rate);
                events.push(ChannelEvent::Audio(WireAudioPayload::from_base64(
                    inline.data,
                    rate,
                )));
            }
        }
        if content.interrupted {
            events.push(ChannelEvent::Interrupted);
        }
    }

    if let Some(error) = message.error {
        let detail = if error.message.is_empty() {
            "service reported an error".to_string()
        } else {
            error.message
        };
        events.push(ChannelEvent::Error(detail));
    }

    events
}
