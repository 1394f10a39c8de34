use crate::moderation::category::{BlobKind, Category};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Only `pending -> approved|rejected` moves forward; re-applying the
    /// current status is allowed so reconcile can be rerun.
    pub fn can_transition_to(self, target: Status) -> bool {
        self == target || (self == Status::Pending && target != Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local folder a reviewer drops a staging directory into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Approved,
    Rejected,
}

impl Bin {
    pub const ALL: [Bin; 2] = [Bin::Approved, Bin::Rejected];

    pub fn target_status(self) -> Status {
        match self {
            Self::Approved => Status::Approved,
            Self::Rejected => Status::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One row from a category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default = "default_status")]
    pub status: Status,
}

fn default_status() -> Status {
    Status::Pending
}

impl Record {
    /// Populated blob references meaningful for `category`, in download order.
    pub fn blob_refs(&self, category: Category) -> Vec<(BlobKind, &str)> {
        let mut out = Vec::new();
        push_ref(&mut out, BlobKind::Audio, self.audio_url.as_deref());
        if category.allows_visual_media() {
            push_ref(&mut out, BlobKind::Photo, self.photo_url.as_deref());
            push_ref(&mut out, BlobKind::Video, self.video_url.as_deref());
        }
        out
    }
}

pub(crate) fn push_ref<'a>(out: &mut Vec<(BlobKind, &'a str)>, kind: BlobKind, value: Option<&'a str>) {
    if let Some(url) = value.map(str::trim).filter(|v| !v.is_empty()) {
        out.push((kind, url));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Pending => self.pending += 1,
            Status::Approved => self.approved += 1,
            Status::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected
    }
}
