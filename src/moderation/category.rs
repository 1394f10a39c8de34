use crate::error::ModerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content type of a submission. Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "sonhos")]
    Dreams,
    #[serde(rename = "prospeccoes", alias = "prospecções")]
    Prospections,
    #[serde(rename = "descarregos")]
    Purges,
    #[serde(rename = "cotidiano")]
    DailyLife,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Dreams,
        Category::Prospections,
        Category::Purges,
        Category::DailyLife,
    ];

    /// Tag used for staging folders and the sidecar `tipo` field.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Dreams => "sonhos",
            Self::Prospections => "prospeccoes",
            Self::Purges => "descarregos",
            Self::DailyLife => "cotidiano",
        }
    }

    /// Remote table holding records of this category.
    pub fn table(self) -> &'static str {
        match self {
            Self::Dreams => "dreams",
            Self::Prospections => "prospections",
            Self::Purges => "purges",
            Self::DailyLife => "daily_life",
        }
    }

    /// Photo and video references are only meaningful for daily-life entries.
    pub fn allows_visual_media(self) -> bool {
        matches!(self, Self::DailyLife)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Category {
    type Err = ModerationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "sonhos" => Ok(Self::Dreams),
            "prospeccoes" | "prospecções" => Ok(Self::Prospections),
            "descarregos" => Ok(Self::Purges),
            "cotidiano" => Ok(Self::DailyLife),
            other => Err(ModerationError::UnknownCategory(other.to_string())),
        }
    }
}

/// Kind of blob a record may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Audio,
    Photo,
    Video,
}

impl BlobKind {
    /// Base filename inside a staging directory.
    pub fn base_name(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Photo => "foto",
            Self::Video => "video",
        }
    }

    /// Extension used when the reference carries no suffix.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Audio => ".wav",
            Self::Photo => ".jpg",
            Self::Video => ".mp4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}
