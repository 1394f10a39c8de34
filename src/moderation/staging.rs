//! On-disk layout of one record under review.
//!
//! ```text
//! <category>/<YYYY-MM-DD_HH-MM-SS>_<id8>/
//!     texto.txt        optional
//!     audio.<ext>      optional
//!     foto.<ext>       daily-life only
//!     video.<ext>      daily-life only
//!     metadata.json    identity sidecar, written last
//! ```
//!
//! Directories are assembled under a hidden `.partial-*` name and renamed
//! into place once the sidecar exists, so a visible directory without a
//! sidecar only appears when something outside this tool tampered with it.

use crate::error::ModerationError;
use crate::moderation::category::{BlobKind, Category};
use crate::moderation::record::{Record, push_ref};
use crate::moderation::util::id_prefix;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SIDECAR_FILE: &str = "metadata.json";
pub const TEXT_FILE: &str = "texto.txt";
const PARTIAL_PREFIX: &str = ".partial-";
const ID_PREFIX_CHARS: usize = 8;

/// Identity sidecar: enough to re-target the remote record without a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub id: String,
    pub tipo: Category,
    pub created_at: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl Sidecar {
    pub fn from_record(record: &Record, category: Category) -> Self {
        let visual = category.allows_visual_media();
        Self {
            id: record.id.clone(),
            tipo: category,
            created_at: record.created_at.clone(),
            session_id: record.session_id.clone(),
            audio_url: record.audio_url.clone(),
            photo_url: record.photo_url.clone().filter(|_| visual),
            video_url: record.video_url.clone().filter(|_| visual),
        }
    }

    /// Every non-null blob reference, whatever the category says.
    pub fn blob_refs(&self) -> Vec<(BlobKind, &str)> {
        let mut out = Vec::new();
        push_ref(&mut out, BlobKind::Audio, self.audio_url.as_deref());
        push_ref(&mut out, BlobKind::Photo, self.photo_url.as_deref());
        push_ref(&mut out, BlobKind::Video, self.video_url.as_deref());
        out
    }
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn sanitize_id_fragment(fragment: &str) -> String {
    fragment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

/// `<date>_<time>_<id8>` derived from the record's creation time, so
/// pulling the same record twice lands in the same directory.
pub fn staging_dir_name(id: &str, created_at: &str) -> Result<String, ModerationError> {
    let dt = parse_created_at(created_at).ok_or_else(|| ModerationError::InvalidTimestamp {
        id: id.to_string(),
        raw: created_at.to_string(),
    })?;
    Ok(format!(
        "{}_{}",
        dt.format("%Y-%m-%d_%H-%M-%S"),
        sanitize_id_fragment(&id_prefix(id, ID_PREFIX_CHARS))
    ))
}

/// Extension (with leading dot) taken from the reference's path suffix.
pub fn extension_for(url: &str, kind: BlobKind) -> String {
    let from_url = reqwest::Url::parse(url).ok().and_then(|parsed| {
        Path::new(parsed.path())
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
    });
    from_url.unwrap_or_else(|| kind.default_extension().to_string())
}

pub fn read_sidecar(dir: &Path) -> Result<Sidecar, ModerationError> {
    let malformed = |reason: String| ModerationError::MalformedSidecar {
        dir: dir.display().to_string(),
        reason,
    };
    let path = dir.join(SIDECAR_FILE);
    if !path.is_file() {
        return Err(malformed(format!("{SIDECAR_FILE} missing")));
    }
    let raw = fs::read_to_string(&path).map_err(|err| malformed(err.to_string()))?;
    let sidecar: Sidecar = serde_json::from_str(&raw).map_err(|err| malformed(err.to_string()))?;
    if sidecar.id.trim().is_empty() {
        return Err(malformed("empty id".to_string()));
    }
    Ok(sidecar)
}

pub fn is_complete(dir: &Path) -> bool {
    dir.join(SIDECAR_FILE).is_file()
}

/// Every subdirectory of `dir`, hidden ones included, sorted by name.
pub fn list_child_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Visible staging directories inside one category folder, sorted by name
/// (and therefore by creation time).
pub fn list_staging_dirs(category_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = list_child_dirs(category_dir)?;
    out.retain(|path| !is_hidden(path));
    Ok(out)
}

fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

pub fn is_hidden(path: &Path) -> bool {
    file_name_str(path).is_some_and(|n| n.starts_with('.'))
}

/// Leftover of a pull that was interrupted before its rename.
pub fn is_partial(path: &Path) -> bool {
    file_name_str(path).is_some_and(|n| n.starts_with(PARTIAL_PREFIX))
}

/// Builds one staging directory in a hidden sibling and publishes it with
/// a rename once the sidecar is written.
#[derive(Debug)]
pub struct StagingWriter {
    tmp: TempDir,
    final_path: PathBuf,
}

impl StagingWriter {
    pub fn begin(category_dir: &Path, name: &str) -> Result<Self, ModerationError> {
        let final_path = category_dir.join(name);
        let staging_err = |err: std::io::Error| ModerationError::Staging {
            dir: final_path.display().to_string(),
            reason: err.to_string(),
        };
        fs::create_dir_all(category_dir).map_err(staging_err)?;
        let tmp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempdir_in(category_dir)
            .map_err(staging_err)?;
        Ok(Self { tmp, final_path })
    }

    fn staging_err(&self, err: std::io::Error) -> ModerationError {
        ModerationError::Staging {
            dir: self.final_path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn write_text(&self, text: &str) -> Result<(), ModerationError> {
        fs::write(self.tmp.path().join(TEXT_FILE), text).map_err(|err| self.staging_err(err))
    }

    /// Returns the filename written.
    pub fn write_blob(
        &self,
        kind: BlobKind,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, ModerationError> {
        let filename = format!("{}{}", kind.base_name(), extension);
        fs::write(self.tmp.path().join(&filename), bytes).map_err(|err| self.staging_err(err))?;
        Ok(filename)
    }

    /// Writes the sidecar and moves the directory into place, replacing a
    /// previous pull of the same record.
    pub fn finish(self, sidecar: &Sidecar) -> Result<PathBuf, ModerationError> {
        let data = serde_json::to_string_pretty(sidecar).map_err(|err| ModerationError::Staging {
            dir: self.final_path.display().to_string(),
            reason: err.to_string(),
        })?;
        fs::write(self.tmp.path().join(SIDECAR_FILE), format!("{data}\n"))
            .map_err(|err| self.staging_err(err))?;

        if self.final_path.exists() {
            fs::remove_dir_all(&self.final_path).map_err(|err| self.staging_err(err))?;
        }
        fs::rename(self.tmp.path(), &self.final_path).map_err(|err| self.staging_err(err))?;
        let _ = self.tmp.keep();
        Ok(self.final_path)
    }
}
