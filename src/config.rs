use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_MODEL_PATH: &str = "seeta_fd_frontal_v1.0.bin";
const DEFAULT_MIN_FACE_SIZE: u32 = 20;
const DEFAULT_SCORE_THRESHOLD: f64 = 2.0;
const DEFAULT_PYRAMID_SCALE: f32 = 0.8;
const DEFAULT_WINDOW_STEP: u32 = 4;
const DEFAULT_DOWNSCALE: u32 = 1;
const DEFAULT_MAX_DETECTIONS: usize = 5;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 250;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// Environment variable naming an optional JSON or TOML config file.
pub const CONFIG_ENV: &str = "FACE_SESSION_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    reconnect: Option<ReconnectConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    min_face_size: Option<u32>,
    score_threshold: Option<f64>,
    pyramid_scale_factor: Option<f32>,
    window_step: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    downscale: Option<u32>,
    max_detections: Option<usize>,
    annotate: Option<bool>,
    equalize: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ReconnectConfigFile {
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub detection: DetectionSettings,
    pub reconnect: ReconnectSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device node (`/dev/video0`), bare index (`0`), or `stub://...` for the synthetic camera.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// SeetaFace model file, or `stub://...` for the built-in bright-region detector.
    pub path: String,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub window_step: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub downscale: NonZeroU32,
    pub max_detections: NonZeroUsize,
    /// Draw an ellipse around each face into the returned frame.
    pub annotate: bool,
    /// Histogram-equalise the grayscale image before detection.
    pub equalize: bool,
}

#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_FPS,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_MODEL_PATH.to_string(),
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            pyramid_scale_factor: DEFAULT_PYRAMID_SCALE,
            window_step: DEFAULT_WINDOW_STEP,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            downscale: NonZeroU32::MIN,
            max_detections: NonZeroUsize::new(DEFAULT_MAX_DETECTIONS).unwrap_or(NonZeroUsize::MIN),
            annotate: true,
            equalize: true,
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl SessionConfig {
    /// Load from `FACE_SESSION_CONFIG` (if set), apply environment overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SessionConfigFile) -> Result<Self> {
        let camera = file.camera.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let reconnect = file.reconnect.unwrap_or_default();

        let downscale = detection.downscale.unwrap_or(DEFAULT_DOWNSCALE);
        let max_detections = detection.max_detections.unwrap_or(DEFAULT_MAX_DETECTIONS);

        Ok(Self {
            camera: CameraSettings {
                device: camera.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_FPS),
            },
            model: ModelSettings {
                path: model.path.unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
                min_face_size: model.min_face_size.unwrap_or(DEFAULT_MIN_FACE_SIZE),
                score_threshold: model.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
                pyramid_scale_factor: model
                    .pyramid_scale_factor
                    .unwrap_or(DEFAULT_PYRAMID_SCALE),
                window_step: model.window_step.unwrap_or(DEFAULT_WINDOW_STEP),
            },
            detection: DetectionSettings {
                downscale: parse_downscale(downscale)?,
                max_detections: parse_max_detections(max_detections)?,
                annotate: detection.annotate.unwrap_or(true),
                equalize: detection.equalize.unwrap_or(true),
            },
            reconnect: ReconnectSettings {
                initial_backoff: Duration::from_millis(
                    reconnect
                        .initial_backoff_ms
                        .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
                ),
                max_backoff: Duration::from_millis(
                    reconnect.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS),
                ),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("FACE_SESSION_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(model) = std::env::var("FACE_SESSION_MODEL") {
            if !model.trim().is_empty() {
                self.model.path = model;
            }
        }
        if let Ok(downscale) = std::env::var("FACE_SESSION_DOWNSCALE") {
            let factor: u32 = downscale
                .trim()
                .parse()
                .map_err(|_| anyhow!("FACE_SESSION_DOWNSCALE must be a positive integer"))?;
            self.detection.downscale = parse_downscale(factor)?;
        }
        if let Ok(max) = std::env::var("FACE_SESSION_MAX_DETECTIONS") {
            let max: usize = max
                .trim()
                .parse()
                .map_err(|_| anyhow!("FACE_SESSION_MAX_DETECTIONS must be a positive integer"))?;
            self.detection.max_detections = parse_max_detections(max)?;
        }
        Ok(())
    }

    /// Reject settings the capture and detection backends cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.model.path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        // rustface asserts on these ranges, so catch them before a model is built.
        if self.model.min_face_size < 20 {
            return Err(anyhow!("model.min_face_size must be at least 20"));
        }
        if !(self.model.pyramid_scale_factor > 0.01 && self.model.pyramid_scale_factor < 0.99) {
            return Err(anyhow!(
                "model.pyramid_scale_factor must be within (0.01, 0.99)"
            ));
        }
        if self.model.window_step == 0 {
            return Err(anyhow!("model.window_step must be greater than zero"));
        }
        if self.reconnect.initial_backoff > self.reconnect.max_backoff {
            return Err(anyhow!(
                "reconnect.initial_backoff_ms must not exceed reconnect.max_backoff_ms"
            ));
        }
        Ok(())
    }
}

fn parse_downscale(factor: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(factor).ok_or_else(|| anyhow!("detection.downscale must be >= 1"))
}

fn parse_max_detections(max: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(max).ok_or_else(|| anyhow!("detection.max_detections must be >= 1"))
}

fn read_config_file(path: &Path) -> Result<SessionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
