use std::{
    collections::BTreeMap,
    path::Path,
};

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    core::ComboError,
    persistence::{
        load_json_in,
        save_json_in,
    },
};

pub const MEMO_FILE: &str = "memos.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoEntry {
    pub id: Uuid,
    pub seconds: f64,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Timestamped notes grouped by video id, each list kept in time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoBook {
    videos: BTreeMap<String, Vec<MemoEntry>>,
}

/// Video ids are keyed without surrounding whitespace.
fn video_key(video_id: &str) -> &str {
    video_id.trim()
}

impl MemoBook {
    pub fn load_from(dir: &Path) -> Result<Self, ComboError> {
        let mut book: Self = load_json_in(dir, MEMO_FILE)?;
        for entries in book.videos.values_mut() {
            entries.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));
        }
        Ok(book)
    }

    pub fn save_to(&self, dir: &Path) -> Result<(), ComboError> {
        save_json_in(dir, self, MEMO_FILE)
    }

    /// Adds a note and returns its id. Notes at the same second keep insertion order.
    pub fn add(&mut self, video_id: &str, seconds: f64, text: &str) -> Result<Uuid, ComboError> {
        let video_id = video_key(video_id);
        let text = text.trim();
        if video_id.is_empty() {
            return Err(ComboError::Validation("No video selected".into()));
        }
        if text.is_empty() {
            return Err(ComboError::Validation("Memo text must not be empty".into()));
        }
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ComboError::Validation(format!("Invalid timestamp: {}", seconds)));
        }

        let entry = MemoEntry {
            id: Uuid::new_v4(),
            seconds,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let id = entry.id;

        let entries = self.videos.entry(video_id.to_string()).or_default();
        let at = entries.partition_point(|existing| existing.seconds <= seconds);
        entries.insert(at, entry);

        info!("Added memo at {:.1}s for video {}", seconds, video_id);
        Ok(id)
    }

    pub fn remove(&mut self, video_id: &str, id: Uuid) -> Option<MemoEntry> {
        let video_id = video_key(video_id);
        let entries = self.videos.get_mut(video_id)?;
        let pos = entries.iter().position(|entry| entry.id == id)?;
        let removed = entries.remove(pos);
        if entries.is_empty() {
            self.videos.remove(video_id);
        }
        Some(removed)
    }

    pub fn update_text(&mut self, video_id: &str, id: Uuid, text: &str) -> Result<(), ComboError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ComboError::Validation("Memo text must not be empty".into()));
        }
        let entry = self
            .videos
            .get_mut(video_key(video_id))
            .and_then(|entries| entries.iter_mut().find(|entry| entry.id == id))
            .ok_or_else(|| ComboError::NotFound(format!("Memo {}", id)))?;
        entry.text = text.to_string();
        Ok(())
    }

    pub fn entries(&self, video_id: &str) -> &[MemoEntry] {
        self.videos.get(video_key(video_id)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn video_ids(&self) -> impl Iterator<Item = &str> {
        self.videos.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.videos.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// The latest note at or before `seconds`, used to highlight the current one.
    pub fn current(&self, video_id: &str, seconds: f64) -> Option<&MemoEntry> {
        let entries = self.entries(video_id);
        let at = entries.partition_point(|entry| entry.seconds <= seconds);
        at.checked_sub(1).map(|i| &entries[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_stay_sorted() {
        let mut book = MemoBook::default();
        book.add("vid", 30.0, "third").unwrap();
        book.add("vid", 5.0, "first").unwrap();
        book.add("vid", 12.0, "second").unwrap();
        book.add("vid", 12.0, "second again").unwrap();

        let texts: Vec<_> = book.entries("vid").iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "second again", "third"]);
        assert_eq!(book.len(), 4);
        assert!(book.entries("other").is_empty());
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let mut book = MemoBook::default();
        assert!(book.add("", 1.0, "x").is_err());
        assert!(book.add("vid", 1.0, "   ").is_err());
        assert!(book.add("vid", -1.0, "x").is_err());
        assert!(book.add("vid", f64::NAN, "x").is_err());
        assert!(book.is_empty());
    }

    #[test]
    fn test_remove_and_current() {
        let mut book = MemoBook::default();
        let a = book.add("vid", 10.0, "a").unwrap();
        book.add("vid", 20.0, "b").unwrap();

        assert!(book.current("vid", 5.0).is_none());
        assert_eq!(book.current("vid", 15.0).map(|e| e.text.as_str()), Some("a"));
        assert_eq!(book.current("vid", 20.0).map(|e| e.text.as_str()), Some("b"));

        assert_eq!(book.remove("vid", a).map(|e| e.text), Some("a".to_string()));
        assert!(book.remove("vid", a).is_none());
        book.update_text("vid", book.entries("vid")[0].id, "edited").unwrap();
        assert_eq!(book.entries("vid")[0].text, "edited");
    }

    #[test]
    fn test_video_id_whitespace_is_ignored_everywhere() {
        let mut book = MemoBook::default();
        let id = book.add("  dQw4w9WgXcQ ", 3.0, "anti-air").unwrap();

        assert_eq!(book.video_ids().collect::<Vec<_>>(), vec!["dQw4w9WgXcQ"]);
        assert_eq!(book.entries(" dQw4w9WgXcQ\t").len(), 1);
        assert!(book.current("dQw4w9WgXcQ  ", 4.0).is_some());

        book.update_text(" dQw4w9WgXcQ", id, "late anti-air").unwrap();
        assert_eq!(book.entries("dQw4w9WgXcQ")[0].text, "late anti-air");

        assert!(book.remove("dQw4w9WgXcQ ", id).is_some());
        assert!(book.is_empty());
    }

    #[test]
    fn test_persists_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = MemoBook::default();
        book.add("dQw4w9WgXcQ", 42.0, "punish here").unwrap();
        book.save_to(dir.path()).unwrap();

        let loaded = MemoBook::load_from(dir.path()).unwrap();
        assert_eq!(loaded, book);
        assert!(MemoBook::load_from(&dir.path().join("missing")).unwrap().is_empty());
    }
}
