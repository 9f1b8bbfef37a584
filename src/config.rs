use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::SchemaVariant;

const DEFAULT_DETECTIONS_TOPIC: &str = "color/mobilenet_detections";
const DEFAULT_IMAGE_TOPIC: &str = "color/image";
const DEFAULT_OVERLAY_TOPIC: &str = "color/person_overlay";
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    schema: Option<String>,
    topics: Option<TopicConfigFile>,
    label: Option<LabelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TopicConfigFile {
    detections: Option<String>,
    image: Option<String>,
    overlay: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelConfigFile {
    /// Empty string disables label text.
    font_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub schema: SchemaVariant,
    pub topics: TopicSettings,
    pub font_path: Option<PathBuf>,
    /// True when the font came from the file or environment rather than the
    /// built-in default. An explicit font that fails to load is fatal.
    pub font_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSettings {
    pub detections: String,
    pub image: String,
    pub overlay: String,
}

impl OverlayConfig {
    /// Defaults, then the file named by `PERSON_OVERLAY_CONFIG`, then
    /// `PERSON_OVERLAY_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PERSON_OVERLAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Result<Self> {
        let schema = match file.schema.as_deref() {
            Some(schema) => schema.parse()?,
            None => SchemaVariant::default(),
        };
        let topics = file.topics.unwrap_or_default();
        let topics = TopicSettings {
            detections: topics
                .detections
                .unwrap_or_else(|| DEFAULT_DETECTIONS_TOPIC.to_string()),
            image: topics
                .image
                .unwrap_or_else(|| DEFAULT_IMAGE_TOPIC.to_string()),
            overlay: topics
                .overlay
                .unwrap_or_else(|| DEFAULT_OVERLAY_TOPIC.to_string()),
        };
        let (font_path, font_required) = match file.label.and_then(|label| label.font_path) {
            Some(path) if path.trim().is_empty() => (None, false),
            Some(path) => (Some(PathBuf::from(path)), true),
            None => (Some(PathBuf::from(DEFAULT_FONT_PATH)), false),
        };
        Ok(Self {
            schema,
            topics,
            font_path,
            font_required,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(schema) = std::env::var("PERSON_OVERLAY_SCHEMA") {
            if !schema.trim().is_empty() {
                self.schema = schema.parse()?;
            }
        }
        if let Ok(topic) = std::env::var("PERSON_OVERLAY_DETECTIONS_TOPIC") {
            if !topic.trim().is_empty() {
                self.topics.detections = topic;
            }
        }
        if let Ok(topic) = std::env::var("PERSON_OVERLAY_IMAGE_TOPIC") {
            if !topic.trim().is_empty() {
                self.topics.image = topic;
            }
        }
        if let Ok(topic) = std::env::var("PERSON_OVERLAY_OVERLAY_TOPIC") {
            if !topic.trim().is_empty() {
                self.topics.overlay = topic;
            }
        }
        if let Ok(path) = std::env::var("PERSON_OVERLAY_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
                self.font_required = true;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, topic) in [
            ("detections", &mut self.topics.detections),
            ("image", &mut self.topics.image),
            ("overlay", &mut self.topics.overlay),
        ] {
            *topic = topic.trim().to_string();
            validate_topic(name, topic)?;
        }

        if self.topics.overlay == self.topics.image {
            return Err(anyhow!(
                "overlay topic must differ from the image topic ({})",
                self.topics.image
            ));
        }
        if self.topics.overlay == self.topics.detections {
            return Err(anyhow!(
                "overlay topic must differ from the detections topic ({})",
                self.topics.detections
            ));
        }
        if self.topics.image == self.topics.detections {
            return Err(anyhow!(
                "image and detections topics must differ ({})",
                self.topics.image
            ));
        }
        Ok(())
    }
}

fn validate_topic(name: &str, topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(anyhow!("{} topic must not be empty", name));
    }
    if topic.contains(['+', '#']) {
        return Err(anyhow!(
            "{} topic must not contain MQTT wildcards: {}",
            name,
            topic
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_camera_topics() {
        let cfg = OverlayConfig::from_file(OverlayConfigFile::default()).unwrap();
        assert_eq!(cfg.schema, SchemaVariant::Spatial);
        assert_eq!(cfg.topics.detections, "color/mobilenet_detections");
        assert_eq!(cfg.topics.image, "color/image");
        assert_eq!(cfg.topics.overlay, "color/person_overlay");
        assert_eq!(cfg.font_path, Some(PathBuf::from(DEFAULT_FONT_PATH)));
        assert!(!cfg.font_required);
    }

    #[test]
    fn font_named_in_file_is_required() {
        let file: OverlayConfigFile =
            serde_json::from_str(r#"{"label": {"font_path": "/opt/fonts/Label.ttf"}}"#).unwrap();
        let cfg = OverlayConfig::from_file(file).unwrap();
        assert_eq!(cfg.font_path, Some(PathBuf::from("/opt/fonts/Label.ttf")));
        assert!(cfg.font_required);
    }

    #[test]
    fn empty_font_path_disables_labels() {
        let file: OverlayConfigFile =
            serde_json::from_str(r#"{"label": {"font_path": ""}}"#).unwrap();
        let cfg = OverlayConfig::from_file(file).unwrap();
        assert!(cfg.font_path.is_none());
        assert!(!cfg.font_required);
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let file: OverlayConfigFile = serde_json::from_str(r#"{"schema": "stereo"}"#).unwrap();
        let err = OverlayConfig::from_file(file).unwrap_err();
        assert!(err.to_string().contains("unknown detection schema"));
    }

    #[test]
    fn overlay_topic_cannot_feed_back_into_image_topic() {
        let file: OverlayConfigFile = serde_json::from_str(
            r#"{"topics": {"image": "cam/image", "overlay": " cam/image "}}"#,
        )
        .unwrap();
        let mut cfg = OverlayConfig::from_file(file).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn wildcard_topics_are_rejected() {
        let file: OverlayConfigFile =
            serde_json::from_str(r#"{"topics": {"detections": "cam/+/detections"}}"#).unwrap();
        let mut cfg = OverlayConfig::from_file(file).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("wildcards"));
    }
}
