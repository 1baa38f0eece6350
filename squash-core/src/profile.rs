//! Per-category resource policy.
//!
//! Every job belongs to exactly one `Category`, and each category carries an
//! immutable `ResourceProfile` describing how much memory a job is expected to
//! peak at, how many jobs of that category may run at once, when streaming is
//! mandatory, and how chunk sizes scale. The `ProfileRegistry` is built once
//! at startup from the defaults below plus any configured overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const MIB: u64 = 1024 * 1024;

/// File category that decides resource policy and executor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Video,
    Audio,
    Document,
    Archive,
}

impl Category {
    /// All categories, in the order the batch scheduler round-robins them.
    pub const ALL: [Category; 5] = [
        Category::Image,
        Category::Video,
        Category::Audio,
        Category::Document,
        Category::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Archive => "archive",
        }
    }

    /// Maps a file extension (case-insensitive, without the dot) to a category.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        let category = match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tif" | "tiff" | "avif" | "heic" => {
                Self::Image
            }
            "mp4" | "mkv" | "mov" | "webm" | "avi" | "m4v" => Self::Video,
            "mp3" | "wav" | "flac" | "ogg" | "opus" | "m4a" | "aac" => Self::Audio,
            "pdf" | "docx" | "xlsx" | "pptx" | "odt" | "txt" | "csv" | "json" | "xml" | "html" => {
                Self::Document
            }
            "zip" | "tar" | "gz" | "tgz" | "7z" | "rar" | "bz2" | "xz" | "zst" => Self::Archive,
            _ => return None,
        };
        Some(category)
    }

    /// Category for a path, based on its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Config(format!("unknown category '{s}'")))
    }
}

/// Memory and concurrency policy for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfile {
    /// Estimated peak memory is `file_size * memory_multiplier`.
    pub memory_multiplier: f64,
    /// Maximum number of jobs of this category running at once.
    pub max_concurrent: usize,
    /// Files larger than this many bytes are always streamed in chunks.
    pub streaming_threshold: u64,
    /// Scales the default chunk size for this category.
    pub chunk_size_multiplier: f64,
}

impl ResourceProfile {
    /// Built-in policy for a category.
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Image => Self {
                memory_multiplier: 4.0,
                max_concurrent: 3,
                streaming_threshold: 50 * MIB,
                chunk_size_multiplier: 1.0,
            },
            Category::Video => Self {
                memory_multiplier: 2.0,
                max_concurrent: 1,
                streaming_threshold: 100 * MIB,
                chunk_size_multiplier: 2.0,
            },
            Category::Audio => Self {
                memory_multiplier: 1.5,
                max_concurrent: 2,
                streaming_threshold: 50 * MIB,
                chunk_size_multiplier: 1.5,
            },
            Category::Document => Self {
                memory_multiplier: 1.2,
                max_concurrent: 3,
                streaming_threshold: 20 * MIB,
                chunk_size_multiplier: 1.0,
            },
            Category::Archive => Self {
                memory_multiplier: 1.1,
                max_concurrent: 2,
                streaming_threshold: 100 * MIB,
                chunk_size_multiplier: 2.0,
            },
        }
    }

    /// Estimated peak memory for processing `bytes` of input.
    pub fn estimate_cost(&self, bytes: u64) -> u64 {
        (bytes as f64 * self.memory_multiplier).ceil() as u64
    }

    fn validate(&self, category: Category) -> CoreResult<()> {
        if !(self.memory_multiplier.is_finite() && self.memory_multiplier > 0.0) {
            return Err(CoreError::Config(format!(
                "{category}: memory_multiplier must be positive, got {}",
                self.memory_multiplier
            )));
        }
        if self.max_concurrent == 0 {
            return Err(CoreError::Config(format!(
                "{category}: max_concurrent must be at least 1"
            )));
        }
        if !(self.chunk_size_multiplier.is_finite() && self.chunk_size_multiplier > 0.0) {
            return Err(CoreError::Config(format!(
                "{category}: chunk_size_multiplier must be positive, got {}",
                self.chunk_size_multiplier
            )));
        }
        Ok(())
    }
}

/// Partial override of a category's profile, as read from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    pub memory_multiplier: Option<f64>,
    pub max_concurrent: Option<usize>,
    pub streaming_threshold: Option<u64>,
    pub chunk_size_multiplier: Option<f64>,
}

impl ProfileOverride {
    fn apply(&self, mut profile: ResourceProfile) -> ResourceProfile {
        if let Some(value) = self.memory_multiplier {
            profile.memory_multiplier = value;
        }
        if let Some(value) = self.max_concurrent {
            profile.max_concurrent = value;
        }
        if let Some(value) = self.streaming_threshold {
            profile.streaming_threshold = value;
        }
        if let Some(value) = self.chunk_size_multiplier {
            profile.chunk_size_multiplier = value;
        }
        profile
    }
}

/// Immutable table of resource profiles, one per category.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRegistry {
    profiles: BTreeMap<Category, ResourceProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self {
            profiles: Category::ALL
                .into_iter()
                .map(|category| (category, ResourceProfile::default_for(category)))
                .collect(),
        }
    }
}

impl ProfileRegistry {
    /// Builds the registry from the defaults plus `overrides`, validating the result.
    pub fn with_overrides(overrides: &BTreeMap<Category, ProfileOverride>) -> CoreResult<Self> {
        let mut registry = Self::default();
        for (category, profile_override) in overrides {
            let merged = profile_override.apply(registry.get(*category));
            merged.validate(*category)?;
            registry.profiles.insert(*category, merged);
        }
        Ok(registry)
    }

    pub fn get(&self, category: Category) -> ResourceProfile {
        self.profiles
            .get(&category)
            .copied()
            .unwrap_or_else(|| ResourceProfile::default_for(category))
    }

    pub fn estimate_cost(&self, category: Category, bytes: u64) -> u64 {
        self.get(category).estimate_cost(bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, ResourceProfile)> + '_ {
        self.profiles.iter().map(|(category, profile)| (*category, *profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost_uses_multiplier() {
        let registry = ProfileRegistry::default();
        assert_eq!(registry.estimate_cost(Category::Image, 10 * MIB), 40 * MIB);
        assert_eq!(registry.estimate_cost(Category::Video, 100 * MIB), 200 * MIB);
        assert_eq!(registry.estimate_cost(Category::Document, 0), 0);
    }

    #[test]
    fn test_video_is_serialized_by_default() {
        assert_eq!(ProfileRegistry::default().get(Category::Video).max_concurrent, 1);
    }

    #[test]
    fn test_overrides_merge_partially() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Category::Document,
            ProfileOverride {
                streaming_threshold: Some(5 * MIB),
                ..Default::default()
            },
        );
        let registry = ProfileRegistry::with_overrides(&overrides).unwrap();
        let document = registry.get(Category::Document);
        assert_eq!(document.streaming_threshold, 5 * MIB);
        assert_eq!(document.max_concurrent, 3);
        assert_eq!(registry.get(Category::Image), ResourceProfile::default_for(Category::Image));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Category::Audio,
            ProfileOverride {
                max_concurrent: Some(0),
                ..Default::default()
            },
        );
        assert!(ProfileRegistry::with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_category_from_extension() {
        assert_eq!(Category::from_extension("JPG"), Some(Category::Image));
        assert_eq!(Category::from_extension("mkv"), Some(Category::Video));
        assert_eq!(Category::from_extension("flac"), Some(Category::Audio));
        assert_eq!(Category::from_extension("pdf"), Some(Category::Document));
        assert_eq!(Category::from_extension("zip"), Some(Category::Archive));
        assert_eq!(Category::from_extension("exe"), None);
        assert_eq!("Video".parse::<Category>().unwrap(), Category::Video);
    }
}
