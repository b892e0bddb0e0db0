use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::detect::result::is_toml;
use crate::video::VideoSettings;
use crate::violation::ViolationLabels;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const MIN_CONFIDENCE: f32 = 0.1;
pub const MAX_CONFIDENCE: f32 = 1.0;
pub const CONFIDENCE_STEP: f32 = 0.05;
pub const DEFAULT_LOCATION: &str = "Main Street Camera #1";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_MODEL_INPUT: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    confidence: Option<f32>,
    location: Option<String>,
    model: Option<ModelConfigFile>,
    telegram: Option<TelegramConfigFile>,
    alerts: Option<AlertsConfigFile>,
    video: Option<VideoConfigFile>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    class_names: Option<PathBuf>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    api_base: Option<String>,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsConfigFile {
    violation_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    frame_stride: Option<u32>,
    max_frames: Option<u64>,
}

/// Bot API token. Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BotToken(String);

impl BotToken {
    /// Accepts `<bot id>:<secret>` as issued by BotFather.
    pub fn parse(raw: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^[0-9]+:[A-Za-z0-9_-]+$").expect("bot token pattern is valid")
        });
        let raw = raw.trim();
        if !pattern.is_match(raw) {
            return Err(anyhow!("bot token must look like '<digits>:<secret>'"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub confidence: f32,
    pub location: String,
    pub model: ModelSettings,
    pub telegram: TelegramSettings,
    pub violation_labels: ViolationLabels,
    pub video: VideoSettings,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: Option<PathBuf>,
    pub class_names: Option<PathBuf>,
    pub input_size: u32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub api_base: String,
    pub bot_token: Option<BotToken>,
    pub chat_id: Option<String>,
}

impl TelegramSettings {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            location: DEFAULT_LOCATION.to_string(),
            model: ModelSettings {
                path: None,
                class_names: None,
                input_size: DEFAULT_MODEL_INPUT,
                iou_threshold: DEFAULT_IOU_THRESHOLD,
            },
            telegram: TelegramSettings {
                api_base: DEFAULT_API_BASE.to_string(),
                bot_token: None,
                chat_id: None,
            },
            violation_labels: ViolationLabels::default(),
            video: VideoSettings::default(),
            font_path: None,
        }
    }
}

impl AppConfig {
    /// Load from `HELMET_WATCH_CONFIG` (if set), then apply env overrides
    /// and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HELMET_WATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        let telegram = file.telegram.unwrap_or_default();
        let video = file.video.unwrap_or_default();
        let bot_token = match telegram.bot_token.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(BotToken::parse(raw)?),
            _ => None,
        };
        Ok(Self {
            confidence: file.confidence.unwrap_or(defaults.confidence),
            location: file.location.unwrap_or(defaults.location),
            model: ModelSettings {
                path: model.path,
                class_names: model.class_names,
                input_size: model.input_size.unwrap_or(defaults.model.input_size),
                iou_threshold: model.iou_threshold.unwrap_or(defaults.model.iou_threshold),
            },
            telegram: TelegramSettings {
                api_base: telegram.api_base.unwrap_or(defaults.telegram.api_base),
                bot_token,
                chat_id: telegram.chat_id.filter(|id| !id.trim().is_empty()),
            },
            violation_labels: file
                .alerts
                .and_then(|alerts| alerts.violation_labels)
                .map(ViolationLabels::new)
                .unwrap_or(defaults.violation_labels),
            video: VideoSettings {
                frame_stride: video.frame_stride.unwrap_or(defaults.video.frame_stride),
                max_frames: video.max_frames,
            },
            font_path: file.font_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var("HELMET_WATCH_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.bot_token = Some(BotToken::parse(&token)?);
            }
        }
        if let Ok(chat_id) = std::env::var("HELMET_WATCH_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.telegram.chat_id = Some(chat_id.trim().to_string());
            }
        }
        if let Ok(api_base) = std::env::var("HELMET_WATCH_API_BASE") {
            if !api_base.trim().is_empty() {
                self.telegram.api_base = api_base;
            }
        }
        if let Ok(location) = std::env::var("HELMET_WATCH_LOCATION") {
            self.location = location;
        }
        if let Ok(confidence) = std::env::var("HELMET_WATCH_CONFIDENCE") {
            self.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("HELMET_WATCH_CONFIDENCE must be a number"))?;
        }
        if let Ok(model) = std::env::var("HELMET_WATCH_MODEL") {
            if !model.trim().is_empty() {
                self.model.path = Some(PathBuf::from(model));
            }
        }
        if let Ok(names) = std::env::var("HELMET_WATCH_CLASS_NAMES") {
            if !names.trim().is_empty() {
                self.model.class_names = Some(PathBuf::from(names));
            }
        }
        if let Ok(labels) = std::env::var("HELMET_WATCH_VIOLATION_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.violation_labels = ViolationLabels::new(parsed);
            }
        }
        if let Ok(font) = std::env::var("HELMET_WATCH_FONT") {
            if !font.trim().is_empty() {
                self.font_path = Some(PathBuf::from(font));
            }
        }
        Ok(())
    }

    /// Check ranges and formats. Called by `load` and again by the binary
    /// after command-line overrides.
    pub fn validate(&mut self) -> Result<()> {
        validate_confidence(self.confidence)?;

        let api = url::Url::parse(&self.telegram.api_base)
            .map_err(|e| anyhow!("invalid telegram api_base '{}': {}", self.telegram.api_base, e))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(anyhow!("telegram api_base must be an http(s) URL"));
        }
        self.telegram.api_base = self.telegram.api_base.trim_end_matches('/').to_string();

        if self.violation_labels.is_empty() {
            return Err(anyhow!("at least one violation label is required"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.model.iou_threshold) {
            return Err(anyhow!("model iou_threshold must be within 0..=1"));
        }
        if self.video.frame_stride == 0 {
            return Err(anyhow!("video frame_stride must be at least 1"));
        }
        Ok(())
    }
}

/// Confidence threshold must lie within the slider range 0.1..=1.0.
pub fn validate_confidence(confidence: f32) -> Result<()> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
        return Err(anyhow!(
            "confidence threshold {} is outside {}..={}",
            confidence,
            MIN_CONFIDENCE,
            MAX_CONFIDENCE
        ));
    }
    Ok(())
}

/// Snap a threshold to the 0.05 slider grid.
pub fn snap_confidence(confidence: f32) -> f32 {
    let steps = (confidence / CONFIDENCE_STEP).round();
    (steps * CONFIDENCE_STEP * 100.0).round() / 100.0
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = if is_toml(path) {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::DEFAULT_VIOLATION_LABELS;

    #[test]
    fn bot_token_format_and_redaction() {
        let token = BotToken::parse(" 8246:AAG_x-y ").unwrap();
        assert_eq!(token.expose(), "8246:AAG_x-y");
        assert_eq!(format!("{:?}", token), "BotToken(<redacted>)");
        assert!(BotToken::parse("no-colon").is_err());
        assert!(BotToken::parse("abc:def").is_err());
    }

    #[test]
    fn confidence_range_matches_slider() {
        assert!(validate_confidence(0.1).is_ok());
        assert!(validate_confidence(1.0).is_ok());
        assert!(validate_confidence(0.05).is_err());
        assert!(validate_confidence(1.2).is_err());
        assert_eq!(snap_confidence(0.27), 0.25);
        assert_eq!(snap_confidence(0.33), 0.35);
    }

    #[test]
    fn defaults_validate() {
        let mut cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.confidence, 0.25);
        assert_eq!(cfg.location, "Main Street Camera #1");
        assert_eq!(
            cfg.violation_labels.as_slice(),
            DEFAULT_VIOLATION_LABELS
        );
        assert!(!cfg.telegram.is_configured());
    }

    #[test]
    fn rejects_non_http_api_base() {
        let mut cfg = AppConfig::default();
        cfg.telegram.api_base = "ftp://example.com".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_file_fills_missing_sections_with_defaults() {
        let file: AppConfigFile = toml::from_str(
            r#"
            location = "Gate 4"

            [telegram]
            bot_token = "1:abc"
            chat_id = "99"

            [alerts]
            violation_labels = ["Accident"]
            "#,
        )
        .unwrap();
        let cfg = AppConfig::from_file(file).unwrap();
        assert_eq!(cfg.location, "Gate 4");
        assert_eq!(cfg.confidence, DEFAULT_CONFIDENCE);
        assert!(cfg.telegram.is_configured());
        assert_eq!(cfg.violation_labels.as_slice(), &["accident"]);
        assert_eq!(cfg.model.input_size, DEFAULT_MODEL_INPUT);
    }
}
