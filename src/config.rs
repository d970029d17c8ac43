use crate::defaults;
use crate::error::{LivelingoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

/// Audio device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub playback_channels: u16,
    pub frame_samples: usize,
}

/// Translation session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: LanguageMode,
    pub voice: String,
    pub history_capacity: usize,
}

/// Translation direction requested from the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum LanguageMode {
    /// Detect Japanese or Traditional Chinese and translate to the other
    #[default]
    Auto,
    /// Japanese speech to Traditional Chinese
    JaToZh,
    /// Traditional Chinese speech to Japanese
    ZhToJa,
}

impl LanguageMode {
    /// System instruction sent to the remote service for this mode.
    pub fn system_instruction(self) -> &'static str {
        match self {
            LanguageMode::Auto => {
                "You are a professional real-time interpreter for Japanese and Traditional Chinese (Taiwan). \
                 If you hear Japanese, translate it into Traditional Chinese. \
                 If you hear Traditional Chinese, translate it into Japanese. \
                 Output only the translation, concise and fast."
            }
            LanguageMode::JaToZh => {
                "You are a professional real-time interpreter. \
                 Translate everything you hear from Japanese into Traditional Chinese (Taiwan). \
                 Output only the translation, concise and fast."
            }
            LanguageMode::ZhToJa => {
                "You are a professional real-time interpreter. \
                 Translate everything you hear from Traditional Chinese (Taiwan) into Japanese. \
                 Output only the translation, concise and fast."
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageMode::Auto => "auto",
            LanguageMode::JaToZh => "ja-to-zh",
            LanguageMode::ZhToJa => "zh-to-ja",
        }
    }
}

impl fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageMode {
    type Err = LivelingoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(LanguageMode::Auto),
            "ja-to-zh" | "jp_to_zh" => Ok(LanguageMode::JaToZh),
            "zh-to-ja" | "zh_to_jp" => Ok(LanguageMode::ZhToJa),
            other => Err(LivelingoError::ConfigInvalidValue {
                key: "session.mode".to_string(),
                message: format!("unknown mode '{other}' (expected auto, ja-to-zh, zh-to-ja)"),
            }),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: defaults::DEFAULT_MODEL.to_string(),
            endpoint: defaults::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            capture_sample_rate: defaults::CAPTURE_SAMPLE_RATE,
            playback_sample_rate: defaults::PLAYBACK_SAMPLE_RATE,
            playback_channels: defaults::PLAYBACK_CHANNELS,
            frame_samples: defaults::FRAME_SAMPLES,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: LanguageMode::Auto,
            voice: defaults::DEFAULT_VOICE.to_string(),
            history_capacity: defaults::HISTORY_CAPACITY,
        }
    }
}

/// Environment variables consulted for the credential, highest priority first.
const CREDENTIAL_ENV_VARS: &[&str] = &["LIVELINGO_API_KEY", "GEMINI_API_KEY", "API_KEY"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LIVELINGO_API_KEY, GEMINI_API_KEY, API_KEY → api.api_key (first non-empty wins)
    /// - LIVELINGO_MODE → session.mode
    /// - LIVELINGO_VOICE → session.voice
    /// - LIVELINGO_INPUT_DEVICE → audio.input_device
    /// - LIVELINGO_OUTPUT_DEVICE → audio.output_device
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = CREDENTIAL_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
        {
            self.api.api_key = Some(key);
        }

        if let Ok(mode) = std::env::var("LIVELINGO_MODE")
            && !mode.is_empty()
        {
            match mode.parse() {
                Ok(mode) => self.session.mode = mode,
                Err(e) => log::warn!("ignoring LIVELINGO_MODE: {e}"),
            }
        }

        if let Ok(voice) = std::env::var("LIVELINGO_VOICE")
            && !voice.is_empty()
        {
            self.session.voice = voice;
        }

        if let Ok(device) = std::env::var("LIVELINGO_INPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.input_device = Some(device);
        }

        if let Ok(device) = std::env::var("LIVELINGO_OUTPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.output_device = Some(device);
        }

        self
    }

    /// Check values that would otherwise fail deep inside the audio path.
    pub fn validate(&self) -> Result<()> {
        let positive = |key: &str, ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(LivelingoError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                })
            }
        };

        positive("audio.capture_sample_rate", self.audio.capture_sample_rate > 0)?;
        positive("audio.playback_sample_rate", self.audio.playback_sample_rate > 0)?;
        positive("audio.playback_channels", self.audio.playback_channels > 0)?;
        positive("audio.frame_samples", self.audio.frame_samples > 0)?;
        positive("session.history_capacity", self.session.history_capacity > 0)?;

        if self.api.endpoint.trim().is_empty() {
            return Err(LivelingoError::ConfigInvalidValue {
                key: "api.endpoint".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the configured credential, failing before any resource is acquired.
    pub fn credential(&self) -> Result<&str> {
        match self.api.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key.trim()),
            _ => Err(LivelingoError::MissingCredential {
                hint: Self::default_path().display().to_string(),
            }),
        }
    }

    /// Copy of this configuration safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.api.api_key.is_some() {
            config.api.api_key = Some("<redacted>".to_string());
        }
        config
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LivelingoError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/livelingo/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livelingo")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_livelingo_env() {
        for name in CREDENTIAL_ENV_VARS {
            remove_env(name);
        }
        remove_env("LIVELINGO_MODE");
        remove_env("LIVELINGO_VOICE");
        remove_env("LIVELINGO_INPUT_DEVICE");
        remove_env("LIVELINGO_OUTPUT_DEVICE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.api.api_key, None);
        assert_eq!(config.api.model, defaults::DEFAULT_MODEL);
        assert_eq!(config.audio.capture_sample_rate, 16000);
        assert_eq!(config.audio.playback_sample_rate, 24000);
        assert_eq!(config.audio.playback_channels, 1);
        assert_eq!(config.audio.frame_samples, 4096);
        assert_eq!(config.session.mode, LanguageMode::Auto);
        assert_eq!(config.session.voice, "Kore");
        assert_eq!(config.session.history_capacity, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [api]
            api_key = "secret"

            [audio]
            input_device = "pipewire"
            playback_channels = 2
            frame_samples = 2048

            [session]
            mode = "ja-to-zh"
            voice = "Aoede"
            history_capacity = 50
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.audio.input_device.as_deref(), Some("pipewire"));
        assert_eq!(config.audio.playback_channels, 2);
        assert_eq!(config.audio.frame_samples, 2048);
        assert_eq!(config.audio.capture_sample_rate, 16000);
        assert_eq!(config.session.mode, LanguageMode::JaToZh);
        assert_eq!(config.session.voice, "Aoede");
        assert_eq!(config.session.history_capacity, 50);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_rejects_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[session\nmode = ").unwrap();
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_credential_missing_or_blank() {
        let mut config = Config::default();
        assert!(matches!(
            config.credential(),
            Err(LivelingoError::MissingCredential { .. })
        ));

        config.api.api_key = Some("   ".to_string());
        assert!(config.credential().is_err());

        config.api.api_key = Some(" key ".to_string());
        assert_eq!(config.credential().unwrap(), "key");
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.audio.frame_samples = 0;
        match config.validate() {
            Err(LivelingoError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "audio.frame_samples")
            }
            other => panic!("Expected ConfigInvalidValue, got {other:?}"),
        }

        let mut config = Config::default();
        config.session.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut config = Config::default();
        config.api.api_key = Some("secret".to_string());
        let shown = config.redacted().to_toml_string().unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_language_mode_parsing() {
        assert_eq!("auto".parse::<LanguageMode>().unwrap(), LanguageMode::Auto);
        assert_eq!(
            "JA-TO-ZH".parse::<LanguageMode>().unwrap(),
            LanguageMode::JaToZh
        );
        assert_eq!(
            "zh_to_jp".parse::<LanguageMode>().unwrap(),
            LanguageMode::ZhToJa
        );
        assert!("klingon".parse::<LanguageMode>().is_err());
        assert_eq!(LanguageMode::ZhToJa.to_string(), "zh-to-ja");
    }

    #[test]
    fn test_each_mode_has_distinct_instruction() {
        let auto = LanguageMode::Auto.system_instruction();
        let ja = LanguageMode::JaToZh.system_instruction();
        let zh = LanguageMode::ZhToJa.system_instruction();
        assert_ne!(auto, ja);
        assert_ne!(ja, zh);
        assert!(auto.contains("Japanese"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_livelingo_env();

        set_env("API_KEY", "from-api-key");
        set_env("GEMINI_API_KEY", "from-gemini");
        set_env("LIVELINGO_MODE", "zh-to-ja");
        set_env("LIVELINGO_VOICE", "Puck");
        set_env("LIVELINGO_OUTPUT_DEVICE", "speakers");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.api.api_key.as_deref(), Some("from-gemini"));
        assert_eq!(config.session.mode, LanguageMode::ZhToJa);
        assert_eq!(config.session.voice, "Puck");
        assert_eq!(config.audio.output_device.as_deref(), Some("speakers"));
        assert_eq!(config.audio.input_device, None);

        clear_livelingo_env();
    }

    #[test]
    fn test_env_overrides_ignore_empty_and_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_livelingo_env();

        set_env("LIVELINGO_API_KEY", "");
        set_env("LIVELINGO_MODE", "nonsense");

        let mut base = Config::default();
        base.api.api_key = Some("file-key".to_string());
        let config = base.with_env_overrides();
        assert_eq!(config.api.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.session.mode, LanguageMode::Auto);

        clear_livelingo_env();
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        assert!(path.ends_with("livelingo/config.toml"));
    }
}
