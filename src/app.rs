//! Translation application entry point.
//!
//! Wires the real devices and the live service into a session controller:
//! microphone → service → speaker, with the transcript printed as it forms.

use crate::audio::device::suppress_audio_warnings;
use crate::channel::LiveConnector;
use crate::config::Config;
use crate::error::{LivelingoError, Result};
use crate::output::render_event;
use crate::session::{CpalBackend, SessionController, SessionEvent};
use std::sync::Arc;
use std::thread;

/// Run one translation session until Ctrl-C or until the service ends it.
///
/// Status lines and finished turns are written to stderr; `quiet` keeps only
/// errors. Returns the user-facing error if the session failed.
pub async fn run_session_command(config: Config, quiet: bool) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    config.validate()?;

    if !quiet {
        eprintln!(
            "livelingo {} · mode {} · voice {}",
            crate::version_string(),
            config.session.mode,
            config.session.voice
        );
    }

    let connector = Arc::new(LiveConnector::new(config.api.endpoint.clone()));
    let mut controller = SessionController::new(config, Arc::new(CpalBackend), connector);

    let events = controller.subscribe();
    let renderer = thread::spawn(move || {
        for event in events.iter() {
            if quiet && !matches!(event, SessionEvent::Error(_)) {
                continue;
            }
            render_event(&event);
        }
    });

    let result = match controller.start().await {
        Ok(_) => {
            controller.run(wait_for_ctrl_c()).await;
            match controller.last_error() {
                Some(message) => Err(LivelingoError::Other(message.to_string())),
                None => Ok(()),
            }
        }
        Err(e) => Err(e),
    };

    // Dropping the controller closes the observer queue and ends the renderer.
    drop(controller);
    if renderer.join().is_err() {
        eprintln!("livelingo: output thread panicked");
    }
    result
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
