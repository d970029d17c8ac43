//! Device discovery shared by capture and playback (CPAL).

use crate::error::{LivelingoError, Result};
use cpal::traits::{DeviceTrait, HostTrait};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub(crate) fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA messages that occur during audio backend probing.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for a conversation.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "S/PDIF",
];

/// Which side of the device list to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

fn device_error(direction: Direction, error: impl std::fmt::Display) -> LivelingoError {
    let message = format!("Failed to enumerate {} devices: {}", direction.label(), error);
    match direction {
        Direction::Input => LivelingoError::AudioCapture { message },
        Direction::Output => LivelingoError::AudioPlayback { message },
    }
}

fn enumerate(host: &cpal::Host, direction: Direction) -> Result<Vec<cpal::Device>> {
    let devices: Vec<cpal::Device> = match direction {
        Direction::Input => host
            .input_devices()
            .map_err(|e| device_error(direction, e))?
            .collect(),
        Direction::Output => host
            .output_devices()
            .map_err(|e| device_error(direction, e))?
            .collect(),
    };
    Ok(devices)
}

/// List device names, preferred devices marked with "\[recommended\]".
pub fn list_devices(direction: Direction) -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        enumerate(&host, direction)
    })?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                names.push(format!("{} [recommended]", name));
            } else {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Resolve a device by exact name, or the best default when `name` is None.
///
/// Without a name, PipeWire/PulseAudio devices win over the system default.
pub fn open_device(direction: Direction, name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = enumerate(&host, direction)?;

        if let Some(wanted) = name {
            return devices
                .into_iter()
                .find(|dev| dev.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| LivelingoError::AudioDeviceNotFound {
                    device: wanted.to_string(),
                });
        }

        let preferred = devices
            .into_iter()
            .find(|dev| dev.name().map(|n| is_preferred_device(&n)).unwrap_or(false));
        if let Some(device) = preferred {
            return Ok(device);
        }

        let fallback = match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        };
        fallback.ok_or_else(|| LivelingoError::AudioDeviceNotFound {
            device: format!("default {}", direction.label()),
        })
    })
}
