use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Training refuses to start with fewer labeled images than this.
pub const MIN_TRAINING_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrainingLabel {
    Trustworthy,
    Untrustworthy,
}

impl TrainingLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingLabel::Trustworthy => "trustworthy",
            TrainingLabel::Untrustworthy => "untrustworthy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub image: Vec<u8>,
    pub label: TrainingLabel,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCounts {
    pub trustworthy: usize,
    pub untrustworthy: usize,
}

impl LabelCounts {
    pub fn of(samples: &[LabeledImage]) -> Self {
        samples.iter().fold(Self::default(), |mut counts, sample| {
            match sample.label {
                TrainingLabel::Trustworthy => counts.trustworthy += 1,
                TrainingLabel::Untrustworthy => counts.untrustworthy += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub samples: usize,
    pub counts: LabelCounts,
    pub completed_at: DateTime<Utc>,
}

/// In-memory set of labeled uploads. Nothing here is written to disk.
#[derive(Debug, Default)]
pub struct TrainingSet {
    items: Vec<LabeledImage>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an upload after checking the bytes look like an image.
    pub fn add(&mut self, image: Vec<u8>, label: TrainingLabel) -> Result<usize, TrainingError> {
        image::guess_format(&image)?;
        self.items.push(LabeledImage {
            image,
            label,
            added_at: Utc::now(),
        });
        Ok(self.items.len())
    }

    pub fn remove(&mut self, index: usize) -> Option<LabeledImage> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.items.len() >= MIN_TRAINING_SAMPLES
    }

    pub fn counts(&self) -> LabelCounts {
        LabelCounts::of(&self.items)
    }

    pub fn items(&self) -> &[LabeledImage] {
        &self.items
    }

    /// Loads every readable image in `dir` with `label`. Files that are not
    /// images are skipped with a warning; returns how many were added.
    pub async fn add_dir(&mut self, dir: &Path, label: TrainingLabel) -> anyhow::Result<usize> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("failed to read training directory {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut added = 0;
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            match self.add(bytes, label) {
                Ok(_) => added += 1,
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }

        info!(
            "loaded {added} {} training images from {}",
            label.as_str(),
            dir.display()
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tiny_jpeg;

    #[test]
    fn add_rejects_non_images() {
        let mut set = TrainingSet::new();
        let err = set
            .add(b"definitely not an image".to_vec(), TrainingLabel::Trustworthy)
            .unwrap_err();
        assert!(matches!(err, TrainingError::InvalidImage(_)));
        assert!(set.is_empty());
    }

    #[test]
    fn counts_and_remove() {
        let mut set = TrainingSet::new();
        set.add(tiny_jpeg(10), TrainingLabel::Trustworthy).unwrap();
        set.add(tiny_jpeg(20), TrainingLabel::Untrustworthy).unwrap();
        set.add(tiny_jpeg(30), TrainingLabel::Trustworthy).unwrap();

        assert_eq!(
            set.counts(),
            LabelCounts {
                trustworthy: 2,
                untrustworthy: 1
            }
        );

        let removed = set.remove(1).unwrap();
        assert_eq!(removed.label, TrainingLabel::Untrustworthy);
        assert!(set.remove(5).is_none());
        assert_eq!(set.counts().untrustworthy, 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ready_at_minimum_sample_count() {
        let mut set = TrainingSet::new();
        for i in 0..MIN_TRAINING_SAMPLES - 1 {
            set.add(tiny_jpeg(i as u8), TrainingLabel::Trustworthy).unwrap();
        }
        assert!(!set.is_ready());
        set.add(tiny_jpeg(200), TrainingLabel::Untrustworthy).unwrap();
        assert!(set.is_ready());
    }

    #[tokio::test]
    async fn add_dir_skips_unreadable_files() {
        let dir = tempfile::TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.jpg"), tiny_jpeg(1)).await.unwrap();
        tokio::fs::write(dir.path().join("b.jpg"), tiny_jpeg(2)).await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"hello").await.unwrap();

        let mut set = TrainingSet::new();
        let added = set
            .add_dir(dir.path(), TrainingLabel::Untrustworthy)
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(set.counts().untrustworthy, 2);
    }
}
