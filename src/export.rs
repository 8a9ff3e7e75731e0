use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use tokio::fs;

use crate::{identity::Identity, sampler::CapturedFrame, session::AnalysisResult};

pub const RECORDING_FILE: &str = "grabacion.mjpeg";
pub const ANALYSIS_FILE: &str = "analisis.json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub frames_written: usize,
    pub recording_bytes: usize,
}

/// ISO-8601 UTC with `:` and `.` swapped for `-`, safe in file names.
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

pub fn session_dir_name(label: &str, timestamp: &str) -> String {
    format!("capturas_{label}_{timestamp}")
}

pub fn frame_file_name(index: u32) -> String {
    format!("captura_{index}.jpg")
}

/// Name for a single frame saved outside a session folder.
pub fn individual_frame_name(label: &str, index: u32, timestamp: &str) -> String {
    format!("{label}_captura_{index}_{timestamp}.jpg")
}

/// Writes every frame, the recording and the serialized result into a fresh
/// folder under `dir`.
pub async fn export_session(
    dir: &Path,
    identity: &Identity,
    result: &AnalysisResult,
    now: DateTime<Utc>,
) -> Result<ExportSummary> {
    let timestamp = file_timestamp(now);
    let out_dir = dir.join(session_dir_name(&identity.file_label(), &timestamp));
    fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for frame in &result.frames {
        let path = out_dir.join(frame_file_name(frame.index));
        fs::write(&path, &frame.jpeg)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("wrote {} ({} bytes)", path.display(), frame.jpeg.len());
    }

    let recording = result.recording.to_mjpeg();
    let recording_path = out_dir.join(RECORDING_FILE);
    fs::write(&recording_path, &recording)
        .await
        .with_context(|| format!("Failed to write {}", recording_path.display()))?;

    let analysis_path = out_dir.join(ANALYSIS_FILE);
    let json = serde_json::to_vec_pretty(result)?;
    fs::write(&analysis_path, json)
        .await
        .with_context(|| format!("Failed to write {}", analysis_path.display()))?;

    info!(
        "exported session {} to {} ({} frames)",
        result.session_id,
        out_dir.display(),
        result.frames.len()
    );

    Ok(ExportSummary {
        dir: out_dir,
        frames_written: result.frames.len(),
        recording_bytes: recording.len(),
    })
}

/// Saves one frame directly under `dir`, named after the identity.
pub async fn export_frame(
    dir: &Path,
    identity: &Identity,
    frame: &CapturedFrame,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let name = individual_frame_name(&identity.file_label(), frame.index, &file_timestamp(now));
    let path = dir.join(name);
    fs::write(&path, &frame.jpeg)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("saved frame {} to {}", frame.index, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        sampler::{CapturedFrame, RawRecording, RecordingChunk},
        scoring::{EmotionDistribution, FrameAnalysis},
        test_support::tiny_jpeg,
    };

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
            + chrono::Duration::milliseconds(250)
    }

    fn result_with_frames(count: u32) -> AnalysisResult {
        let frames = (1..=count)
            .map(|index| CapturedFrame {
                index,
                jpeg: tiny_jpeg(index as u8 * 10),
                width: 8,
                height: 8,
                captured_at: fixed_now(),
            })
            .collect();
        let recording = RawRecording {
            chunks: vec![
                RecordingChunk {
                    offset: std::time::Duration::ZERO,
                    jpeg: tiny_jpeg(1),
                },
                RecordingChunk {
                    offset: std::time::Duration::from_millis(100),
                    jpeg: tiny_jpeg(2),
                },
            ],
            duration: std::time::Duration::from_secs(15),
            frames_emitted: count,
            cancelled: false,
        };
        let analysis = FrameAnalysis::from_distribution(EmotionDistribution::normalize([
            40.0, 20.0, 0.0, 0.0, 20.0, 0.0, 20.0,
        ]));
        AnalysisResult::new("session-1".into(), analysis, frames, recording, fixed_now())
    }

    #[test]
    fn timestamp_is_file_safe() {
        assert_eq!(file_timestamp(fixed_now()), "2024-03-05T14-07-09-250Z");
    }

    #[test]
    fn individual_names_follow_label_and_index() {
        assert_eq!(
            individual_frame_name("Ana", 3, "2024-03-05T14-07-09-250Z"),
            "Ana_captura_3_2024-03-05T14-07-09-250Z.jpg"
        );
    }

    #[tokio::test]
    async fn export_writes_frames_recording_and_analysis() {
        let dir = TempDir::new().unwrap();
        let result = result_with_frames(3);
        let identity = Identity::new(Some("Ana".into()), None);

        let summary = export_session(dir.path(), &identity, &result, fixed_now())
            .await
            .unwrap();

        assert_eq!(
            summary.dir,
            dir.path().join("capturas_Ana_2024-03-05T14-07-09-250Z")
        );
        assert_eq!(summary.frames_written, 3);
        for index in 1..=3 {
            let bytes = fs::read(summary.dir.join(frame_file_name(index))).await.unwrap();
            assert_eq!(bytes, result.frames[index as usize - 1].jpeg);
        }

        let mjpeg = fs::read(summary.dir.join(RECORDING_FILE)).await.unwrap();
        assert_eq!(mjpeg, result.recording.to_mjpeg());
        assert_eq!(summary.recording_bytes, mjpeg.len());

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(summary.dir.join(ANALYSIS_FILE)).await.unwrap())
                .unwrap();
        assert_eq!(json["sessionId"], "session-1");
        assert_eq!(json["trustPercentage"], 70);
        assert_eq!(json["frames"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_frame_is_saved_with_identity_label() {
        let dir = TempDir::new().unwrap();
        let result = result_with_frames(3);
        let identity = Identity::new(None, Some("ana.perez@example.com".into()));

        let path = export_frame(dir.path(), &identity, &result.frames[1], fixed_now())
            .await
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("ana_perez_captura_2_2024-03-05T14-07-09-250Z.jpg")
        );
        assert_eq!(fs::read(&path).await.unwrap(), result.frames[1].jpeg);
    }

    #[tokio::test]
    async fn anonymous_export_uses_default_label() {
        let dir = TempDir::new().unwrap();
        let summary = export_session(
            dir.path(),
            &Identity::default(),
            &result_with_frames(1),
            fixed_now(),
        )
        .await
        .unwrap();

        let name = summary.dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capturas_usuario_"));
    }
}
