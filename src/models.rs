use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An entry in the recordings list
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: Uuid,
    pub title: String,
    pub source_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl Recording {
    /// Entry for a finished recording, titled after its file name
    pub fn from_file(path: &Path, duration_seconds: f64) -> Self {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());

        Self {
            id: Uuid::new_v4(),
            title,
            source_path: Some(path.to_path_buf()),
            timestamp: Utc::now(),
            duration_seconds,
        }
    }

    /// Entry with no audio behind it
    pub fn placeholder(title: &str, timestamp: DateTime<Utc>, duration_seconds: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            source_path: None,
            timestamp,
            duration_seconds,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.source_path.is_some()
    }
}

/// Recordings in the order they were added
#[derive(Debug, Clone, Default)]
pub struct RecordingList {
    entries: Vec<Recording>,
}

impl RecordingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// List seeded with demo rows
    pub fn with_placeholders() -> Self {
        let now = Utc::now();
        let mut list = Self::new();
        list.push(Recording::placeholder("Team Meeting Notes", now - Duration::days(1), 125.5));
        list.push(Recording::placeholder("Project Ideas", now - Duration::hours(2), 45.2));
        list.push(Recording::placeholder("Voice Memo", now, 67.0));
        list
    }

    pub fn push(&mut self, recording: Recording) {
        self.entries.push(recording);
    }

    pub fn get(&self, id: Uuid) -> Option<&Recording> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recording> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
