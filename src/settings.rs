use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::sampler::SamplerConfig;

pub const DEBUG_ENV_VAR: &str = "EMOTRUST_DEBUG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraBackend {
    Synthetic,
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub backend: CameraBackend,
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Synthetic,
            device_index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub interval_ms: u64,
    pub duration_ms: u64,
    pub jpeg_quality: u8,
    pub recording_fps: u32,
    pub first_frame_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            duration_ms: 15_000,
            jpeg_quality: 80,
            recording_fps: 10,
            first_frame_timeout_ms: 5_000,
        }
    }
}

impl SessionSettings {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.interval_ms.max(1)),
            total: Duration::from_millis(self.duration_ms),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            recording_fps: self.recording_fps,
            first_frame_timeout: Duration::from_millis(self.first_frame_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
    Random,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub kind: ModelKind,
    pub seed: Option<u64>,
    pub load_delay_ms: u64,
    pub training_step_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            kind: ModelKind::Random,
            seed: None,
            load_delay_ms: 2_000,
            training_step_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub camera: CameraSettings,
    pub session: SessionSettings,
    pub model: ModelSettings,
    pub export_dir: PathBuf,
    pub debug: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            session: SessionSettings::default(),
            model: ModelSettings::default(),
            export_dir: PathBuf::from("capturas"),
            debug: false,
        }
    }
}

impl AppSettings {
    /// `EMOTRUST_DEBUG=1|true` forces debug logging on.
    pub fn apply_env(&mut self) {
        let debug_env = std::env::var(DEBUG_ENV_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_env {
            self.debug = true;
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, falling back to defaults when the file does
    /// not exist or cannot be parsed.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("ignoring malformed settings in {}: {err}", path.display());
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> AppSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, f: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
