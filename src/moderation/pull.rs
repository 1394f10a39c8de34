use crate::error::ModerationError;
use crate::moderation::audit;
use crate::moderation::category::Category;
use crate::moderation::paths::ModerationPaths;
use crate::moderation::record::Record;
use crate::moderation::staging::{
    Sidecar, StagingWriter, TEXT_FILE, extension_for, staging_dir_name,
};
use crate::moderation::store::RemoteStore;
use crate::moderation::warn::{self, WarnEvent};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MaterializedRecord {
    pub dir: PathBuf,
    pub files: Vec<String>,
    pub blob_failures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryPullOutcome {
    pub category: Category,
    pub listed: usize,
    pub materialized: Vec<MaterializedRecord>,
    pub blob_failures: usize,
    pub listing_error: Option<String>,
    pub issues: Vec<String>,
}

impl CategoryPullOutcome {
    fn new(category: Category) -> Self {
        Self {
            category,
            listed: 0,
            materialized: Vec::new(),
            blob_failures: 0,
            listing_error: None,
            issues: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.materialized.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PullOutcome {
    pub categories: Vec<CategoryPullOutcome>,
}

impl PullOutcome {
    pub fn materialized(&self) -> usize {
        self.categories.iter().map(CategoryPullOutcome::count).sum()
    }

    pub fn listed(&self) -> usize {
        self.categories.iter().map(|c| c.listed).sum()
    }
}

fn emit_warning(code: &str, category: Category, item: &str, reason: &str, err: &str) {
    warn::emit(&WarnEvent {
        code,
        stage: "pull",
        category: category.tag(),
        item,
        reason,
        err,
    });
}

/// Writes one record into its staging directory. Blob download failures
/// are collected, not propagated; the sidecar is still written so the
/// reviewer can decide on what did arrive.
pub fn materialize_record(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    category: Category,
    record: &Record,
) -> Result<MaterializedRecord, ModerationError> {
    let name = staging_dir_name(&record.id, &record.created_at)?;
    let writer = StagingWriter::begin(&paths.pending_category_dir(category), &name)?;
    let mut files = Vec::new();
    let mut blob_failures = Vec::new();

    if let Some(text) = record.text.as_deref().filter(|t| !t.is_empty()) {
        writer.write_text(text)?;
        files.push(TEXT_FILE.to_string());
    }

    for (kind, url) in record.blob_refs(category) {
        match store.fetch_blob(url) {
            Ok(bytes) => {
                let filename = writer.write_blob(kind, &extension_for(url, kind), &bytes)?;
                files.push(filename);
            }
            Err(err) => {
                emit_warning(
                    err.code(),
                    category,
                    &name,
                    &format!("{} download skipped", kind.as_str()),
                    &err.to_string(),
                );
                blob_failures.push(format!("{name}: {} download failed: {err}", kind.as_str()));
            }
        }
    }

    let dir = writer.finish(&Sidecar::from_record(record, category))?;
    Ok(MaterializedRecord {
        dir,
        files,
        blob_failures,
    })
}

/// Pulls every pending record of one category. A listing failure ends this
/// category only.
pub fn pull_category(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    category: Category,
) -> CategoryPullOutcome {
    let mut outcome = CategoryPullOutcome::new(category);

    let records = match store.list_pending(category) {
        Ok(records) => records,
        Err(err) => {
            emit_warning(err.code(), category, "", "listing failed", &err.to_string());
            audit::record(&paths.logs_dir, "pull", "failed", &format!("{category}: {err}"));
            outcome.issues.push(format!("{category}: listing failed: {err}"));
            outcome.listing_error = Some(err.to_string());
            return outcome;
        }
    };
    outcome.listed = records.len();

    for record in &records {
        match materialize_record(store, paths, category, record) {
            Ok(done) => {
                let dir_name = done
                    .dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                audit::record(
                    &paths.logs_dir,
                    "pull",
                    if done.blob_failures.is_empty() { "ok" } else { "partial" },
                    &format!(
                        "{category}/{dir_name} id={} files={}",
                        record.id,
                        done.files.join(",")
                    ),
                );
                outcome.blob_failures += done.blob_failures.len();
                outcome.issues.extend(done.blob_failures.iter().cloned());
                outcome.materialized.push(done);
            }
            Err(err) => {
                emit_warning(err.code(), category, &record.id, "record skipped", &err.to_string());
                audit::record(
                    &paths.logs_dir,
                    "pull",
                    "failed",
                    &format!("{category} id={}: {err}", record.id),
                );
                outcome.issues.push(format!("{category}: record {} skipped: {err}", record.id));
            }
        }
    }

    outcome
}

pub fn pull_all(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    categories: &[Category],
) -> PullOutcome {
    let categories = categories
        .iter()
        .map(|category| pull_category(store, paths, *category))
        .collect();
    PullOutcome { categories }
}
