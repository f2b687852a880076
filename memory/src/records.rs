//! Typed memory records.
//!
//! Each builder returns the `(text, metadata)` pair handed to
//! [`MemoryStore::add`](crate::MemoryStore::add). The embedded text is what
//! similarity search matches against; metadata carries the structured fields.

use amb_core::{MemoryRecord, Metadata};
use chrono::Local;

pub const TYPE_MUSIC_GENERATION: &str = "music_generation";
pub const TYPE_USER_PREFERENCE: &str = "user_preference";
pub const TYPE_ENVIRONMENT_PATTERN: &str = "environment_pattern";

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicGenerationMemory {
    pub context: String,
    pub environment: String,
    pub music_prompt: String,
    pub user_feedback: String
}

impl MusicGenerationMemory {
    pub fn new(
        context: impl Into<String>,
        environment: impl Into<String>,
        music_prompt: impl Into<String>,
        user_feedback: impl Into<String>
    ) -> Self {
        Self {
            context: context.into(),
            environment: environment.into(),
            music_prompt: music_prompt.into(),
            user_feedback: user_feedback.into()
        }
    }

    pub fn text(&self) -> String {
        format!(
            "Music generation: {} for {} with context: {}",
            self.music_prompt, self.environment, self.context
        )
    }

    pub fn into_entry(self) -> (String, Metadata) {
        let text = self.text();
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), TYPE_MUSIC_GENERATION.into());
        metadata.insert("context".to_string(), self.context.into());
        metadata.insert("environment".to_string(), self.environment.into());
        metadata.insert("music_prompt".to_string(), self.music_prompt.into());
        metadata.insert("user_feedback".to_string(), self.user_feedback.into());
        metadata.insert("timestamp".to_string(), timestamp().into());
        (text, metadata)
    }

    /// Reads the structured fields back from a stored record.
    pub fn from_record(record: &MemoryRecord) -> Option<Self> {
        if record.record_type() != Some(TYPE_MUSIC_GENERATION) {
            return None;
        }
        Some(Self {
            context: record.meta_str("context").unwrap_or_default().to_string(),
            environment: record.meta_str("environment").unwrap_or_default().to_string(),
            music_prompt: record.meta_str("music_prompt")?.to_string(),
            user_feedback: record
                .meta_str("user_feedback")
                .unwrap_or_default()
                .to_string()
        })
    }
}

pub fn user_preference(key: &str, value: &str, category: &str) -> (String, Metadata) {
    let text = format!("User preference: {key} = {value} in category {category}");
    let mut metadata = Metadata::new();
    metadata.insert("type".to_string(), TYPE_USER_PREFERENCE.into());
    metadata.insert("key".to_string(), key.into());
    metadata.insert("value".to_string(), value.into());
    metadata.insert("category".to_string(), category.into());
    metadata.insert("timestamp".to_string(), timestamp().into());
    (text, metadata)
}

pub fn environment_pattern(
    location: &str,
    time_of_day: &str,
    environment_description: &str,
    preferred_music_style: &str
) -> (String, Metadata) {
    let text = format!(
        "Environment pattern: {location} at {time_of_day} - {environment_description} prefers \
         {preferred_music_style}"
    );
    let mut metadata = Metadata::new();
    metadata.insert("type".to_string(), TYPE_ENVIRONMENT_PATTERN.into());
    metadata.insert("location".to_string(), location.into());
    metadata.insert("time_of_day".to_string(), time_of_day.into());
    metadata.insert(
        "environment_description".to_string(),
        environment_description.into()
    );
    metadata.insert(
        "preferred_music_style".to_string(),
        preferred_music_style.into()
    );
    metadata.insert("timestamp".to_string(), timestamp().into());
    (text, metadata)
}
