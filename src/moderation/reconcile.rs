use crate::error::ModerationError;
use crate::moderation::audit;
use crate::moderation::category::{BlobKind, Category};
use crate::moderation::paths::ModerationPaths;
use crate::moderation::record::{Bin, Status};
use crate::moderation::staging::{is_complete, is_hidden, list_child_dirs, read_sidecar};
use crate::moderation::store::{BlobDeletion, RemoteStore};
use crate::moderation::warn::{self, WarnEvent};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobCascade {
    pub deleted: usize,
    pub already_gone: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct BinOutcome {
    pub bin: Bin,
    pub attempted: usize,
    pub succeeded: usize,
    pub blobs: BlobCascade,
    pub issues: Vec<String>,
}

impl BinOutcome {
    fn new(bin: Bin) -> Self {
        Self {
            bin,
            attempted: 0,
            succeeded: 0,
            blobs: BlobCascade::default(),
            issues: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

fn dir_label(dir: &Path) -> String {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    match dir.parent() {
        Some(parent) => format!("{}/{}", name(parent), name(dir)),
        None => name(dir),
    }
}

fn emit_warning(code: &str, category: &str, item: &str, reason: &str, err: &str) {
    warn::emit(&WarnEvent {
        code,
        stage: "reconcile",
        category,
        item,
        reason,
        err,
    });
}

/// Deletes every blob the sidecar references. Each deletion stands alone and
/// none of them undo the status update that preceded it.
fn cascade_delete(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    category: Category,
    label: &str,
    refs: &[(BlobKind, &str)],
    outcome: &mut BinOutcome,
) {
    for (kind, url) in refs {
        match store.delete_blob(url) {
            Ok(BlobDeletion::Deleted) => {
                outcome.blobs.deleted += 1;
                audit::record(
                    &paths.logs_dir,
                    "reconcile",
                    "blob-deleted",
                    &format!("{label} {}", kind.as_str()),
                );
            }
            Ok(BlobDeletion::AlreadyGone) => {
                outcome.blobs.already_gone += 1;
                audit::record(
                    &paths.logs_dir,
                    "reconcile",
                    "blob-already-gone",
                    &format!("{label} {}", kind.as_str()),
                );
            }
            Err(err) => {
                outcome.blobs.failed += 1;
                emit_warning(
                    err.code(),
                    category.tag(),
                    label,
                    &format!("{} delete failed", kind.as_str()),
                    &err.to_string(),
                );
                audit::record(
                    &paths.logs_dir,
                    "reconcile",
                    "blob-failed",
                    &format!("{label} {}: {err}", kind.as_str()),
                );
                outcome
                    .issues
                    .push(format!("{label}: {} delete failed: {err}", kind.as_str()));
            }
        }
    }
}

/// Applies the bin's decision to one staging directory. Returns whether the
/// status update went through.
pub fn reconcile_dir(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    bin: Bin,
    dir: &Path,
    outcome: &mut BinOutcome,
) -> bool {
    let label = dir_label(dir);
    let folder_category = dir
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(|n| n.parse::<Category>().ok());

    let sidecar = match read_sidecar(dir) {
        Ok(sidecar) => sidecar,
        Err(err) => {
            report_failure(paths, &label, "", &err, outcome);
            return false;
        }
    };
    if folder_category != Some(sidecar.tipo) {
        emit_warning(
            "CATEGORY_FOLDER_MISMATCH",
            sidecar.tipo.tag(),
            &label,
            "sidecar category wins over folder name",
            "",
        );
    }

    let target = bin.target_status();
    if let Err(err) = store.set_status(sidecar.tipo, &sidecar.id, target) {
        report_failure(paths, &label, sidecar.tipo.tag(), &err, outcome);
        return false;
    }
    audit::record(
        &paths.logs_dir,
        "reconcile",
        target.as_str(),
        &format!("{label} id={}", sidecar.id),
    );

    if target == Status::Rejected {
        let refs = sidecar.blob_refs();
        cascade_delete(store, paths, sidecar.tipo, &label, &refs, outcome);
    }
    true
}

fn report_failure(
    paths: &ModerationPaths,
    label: &str,
    category: &str,
    err: &ModerationError,
    outcome: &mut BinOutcome,
) {
    emit_warning(err.code(), category, label, "directory skipped", &err.to_string());
    audit::record(&paths.logs_dir, "reconcile", "failed", &format!("{label}: {err}"));
    outcome.issues.push(format!("{label}: {err}"));
}

fn report_skipped(
    paths: &ModerationPaths,
    dir: &Path,
    code: &str,
    reason: &str,
    outcome: &mut BinOutcome,
) {
    let label = dir_label(dir);
    emit_warning(code, "", &label, reason, "");
    audit::record(
        &paths.logs_dir,
        "reconcile",
        "failed",
        &format!("{label}: {reason}"),
    );
    outcome.issues.push(format!("{label}: {reason}"));
}

fn reconcile_category_dir(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    bin: Bin,
    category_dir: &Path,
    outcome: &mut BinOutcome,
) {
    let item_dirs = match list_child_dirs(category_dir) {
        Ok(dirs) => dirs,
        Err(err) => {
            outcome
                .issues
                .push(format!("failed to read {}: {err}", category_dir.display()));
            return;
        }
    };
    for dir in item_dirs {
        outcome.attempted += 1;
        if is_hidden(&dir) {
            report_skipped(
                paths,
                &dir,
                "HIDDEN_DIR",
                "hidden directory skipped; rename it to reconcile",
                outcome,
            );
            continue;
        }
        if reconcile_dir(store, paths, bin, &dir, outcome) {
            outcome.succeeded += 1;
        }
    }
}

/// Walks `<bin>/<category>/<staging dir>` and reconciles every directory
/// found. A staging directory dropped straight into the bin is reconciled
/// from its sidecar; anything else that cannot be reconciled is counted and
/// reported. Directories are left in place so a rerun is safe.
pub fn reconcile_bin(store: &dyn RemoteStore, paths: &ModerationPaths, bin: Bin) -> BinOutcome {
    let mut outcome = BinOutcome::new(bin);
    let bin_dir = paths.bin_dir(bin);
    if !bin_dir.exists() {
        return outcome;
    }

    let children = match list_child_dirs(bin_dir) {
        Ok(dirs) => dirs,
        Err(err) => {
            outcome
                .issues
                .push(format!("failed to read {}: {err}", bin_dir.display()));
            return outcome;
        }
    };

    for child in children {
        if is_hidden(&child) {
            outcome.attempted += 1;
            report_skipped(
                paths,
                &child,
                "HIDDEN_DIR",
                "hidden directory skipped; rename it to reconcile",
                &mut outcome,
            );
            continue;
        }
        if is_complete(&child) {
            outcome.attempted += 1;
            if reconcile_dir(store, paths, bin, &child, &mut outcome) {
                outcome.succeeded += 1;
            }
            continue;
        }
        let is_category = child
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.parse::<Category>().is_ok());
        if !is_category {
            outcome.attempted += 1;
            report_skipped(
                paths,
                &child,
                "NOT_A_CATEGORY_FOLDER",
                "not a category folder and has no metadata.json",
                &mut outcome,
            );
            continue;
        }
        reconcile_category_dir(store, paths, bin, &child, &mut outcome);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::record::Record;
    use crate::moderation::staging::{SIDECAR_FILE, Sidecar, TEXT_FILE};
    use crate::moderation::store::fake::{Call, FakeStore};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn pending(id: &str) -> Record {
        Record {
            id: id.to_string(),
            created_at: "2024-01-01T10:00:00Z".to_string(),
            text: None,
            session_id: None,
            audio_url: None,
            photo_url: None,
            video_url: None,
            status: Status::Pending,
        }
    }

    fn stage(paths: &ModerationPaths, bin: Bin, category: Category, record: &Record) -> PathBuf {
        let dir = paths
            .bin_dir(bin)
            .join(category.tag())
            .join(format!("2024-01-01_10-00-00_{}", record.id));
        fs::create_dir_all(&dir).expect("mkdir");
        let sidecar = Sidecar::from_record(record, category);
        fs::write(
            dir.join(SIDECAR_FILE),
            serde_json::to_string_pretty(&sidecar).expect("json"),
        )
        .expect("sidecar");
        dir
    }

    #[test]
    fn rejected_text_only_record_issues_no_blob_deletes() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let dream = pending("abc12345");
        let store = FakeStore::default().with_record(Category::Dreams, dream.clone());
        stage(&paths, Bin::Rejected, Category::Dreams, &dream);

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!((outcome.attempted, outcome.succeeded), (1, 1));
        assert_eq!(store.status_of("abc12345"), Some(Status::Rejected));
        assert!(store.deleted_blobs().is_empty());
    }

    #[test]
    fn approval_never_deletes_blobs() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut entry = pending("day00001");
        entry.photo_url = Some("https://x/dream-media/p.jpg".to_string());
        let store = FakeStore::default()
            .with_record(Category::DailyLife, entry.clone())
            .with_blob("https://x/dream-media/p.jpg", b"img");
        stage(&paths, Bin::Approved, Category::DailyLife, &entry);

        let outcome = reconcile_bin(&store, &paths, Bin::Approved);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(store.status_of("day00001"), Some(Status::Approved));
        assert!(store.deleted_blobs().is_empty());
        assert!(store.blobs.borrow().contains_key("https://x/dream-media/p.jpg"));
    }

    #[test]
    fn rejection_deletes_exactly_the_non_null_refs() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut entry = pending("day00002");
        entry.audio_url = Some("https://x/dream-media/a.webm".to_string());
        entry.video_url = Some("https://x/dream-media/v.mp4".to_string());
        let store = FakeStore::default()
            .with_record(Category::DailyLife, entry.clone())
            .with_blob("https://x/dream-media/a.webm", b"a")
            .with_blob("https://x/dream-media/v.mp4", b"v");
        stage(&paths, Bin::Rejected, Category::DailyLife, &entry);

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.blobs.deleted, 2);
        let deleted: BTreeSet<String> = store.deleted_blobs().into_iter().collect();
        assert_eq!(
            deleted,
            BTreeSet::from([
                "https://x/dream-media/a.webm".to_string(),
                "https://x/dream-media/v.mp4".to_string(),
            ])
        );
    }

    #[test]
    fn directory_without_sidecar_is_attempted_but_never_succeeds() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let dir = paths
            .bin_dir(Bin::Approved)
            .join("sonhos")
            .join("2024-01-01_10-00-00_orphan00");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(TEXT_FILE), "text without identity").expect("text");
        let store = FakeStore::default();

        let outcome = reconcile_bin(&store, &paths, Bin::Approved);
        assert_eq!((outcome.attempted, outcome.succeeded), (1, 0));
        assert!(outcome.issues[0].contains("2024-01-01_10-00-00_orphan00"));
        assert!(store.calls.borrow().is_empty());
    }

    #[test]
    fn failed_status_update_skips_blob_cascade() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut dream = pending("fail0000");
        dream.audio_url = Some("https://x/dream-media/a.wav".to_string());
        let store = FakeStore {
            failing_status_ids: BTreeSet::from(["fail0000".to_string()]),
            ..FakeStore::default()
        }
        .with_record(Category::Dreams, dream.clone());
        stage(&paths, Bin::Rejected, Category::Dreams, &dream);

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!(outcome.succeeded, 0);
        assert!(store.deleted_blobs().is_empty());
    }

    #[test]
    fn one_failing_blob_does_not_block_the_others() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut entry = pending("day00003");
        entry.audio_url = Some("https://x/dream-media/a.webm".to_string());
        entry.photo_url = Some("https://x/dream-media/p.jpg".to_string());
        let store = FakeStore {
            failing_blob_urls: BTreeSet::from(["https://x/dream-media/a.webm".to_string()]),
            ..FakeStore::default()
        }
        .with_record(Category::DailyLife, entry.clone())
        .with_blob("https://x/dream-media/p.jpg", b"p");
        stage(&paths, Bin::Rejected, Category::DailyLife, &entry);

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.blobs.failed, 1);
        assert_eq!(outcome.blobs.deleted, 1);
        assert_eq!(store.status_of("day00003"), Some(Status::Rejected));
    }

    #[test]
    fn rerunning_reconcile_is_idempotent() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut dream = pending("again000");
        dream.audio_url = Some("https://x/dream-media/a.wav".to_string());
        let store = FakeStore::default()
            .with_record(Category::Dreams, dream.clone())
            .with_blob("https://x/dream-media/a.wav", b"a");
        let dir = stage(&paths, Bin::Rejected, Category::Dreams, &dream);

        let first = reconcile_bin(&store, &paths, Bin::Rejected);
        let second = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!(first.succeeded, 1);
        assert_eq!(second.succeeded, 1);
        assert_eq!(second.blobs.already_gone, 1);
        assert!(second.issues.is_empty());
        assert!(dir.join(SIDECAR_FILE).exists());
        assert_eq!(
            store.calls.borrow().iter().filter(|c| matches!(c, Call::SetStatus(..))).count(),
            2
        );
    }

    #[test]
    fn approving_an_already_rejected_record_is_refused() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut dream = pending("flip0000");
        dream.status = Status::Rejected;
        let store = FakeStore::default().with_record(Category::Dreams, dream.clone());
        stage(&paths, Bin::Approved, Category::Dreams, &dream);

        let outcome = reconcile_bin(&store, &paths, Bin::Approved);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(store.status_of("flip0000"), Some(Status::Rejected));
    }

    #[test]
    fn directory_dropped_straight_into_bin_is_reconciled_from_its_sidecar() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let mut dream = pending("abc12345");
        dream.audio_url = Some("https://x/dream-media/a.wav".to_string());
        let store = FakeStore::default()
            .with_record(Category::Dreams, dream.clone())
            .with_blob("https://x/dream-media/a.wav", b"a");
        let nested = stage(&paths, Bin::Rejected, Category::Dreams, &dream);
        let loose = paths.rejected_dir.join(nested.file_name().expect("name"));
        fs::rename(&nested, &loose).expect("move up");

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!((outcome.attempted, outcome.succeeded), (1, 1));
        assert_eq!(store.status_of("abc12345"), Some(Status::Rejected));
        assert_eq!(store.deleted_blobs(), vec!["https://x/dream-media/a.wav".to_string()]);
    }

    #[test]
    fn hidden_and_unrecognised_directories_are_counted_and_reported() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let dream = pending("hidden00");
        let store = FakeStore::default().with_record(Category::Dreams, dream.clone());
        let staged = stage(&paths, Bin::Rejected, Category::Dreams, &dream);
        fs::rename(&staged, staged.with_file_name(".hidden_item")).expect("hide");
        fs::create_dir_all(paths.rejected_dir.join("misc/inner")).expect("mkdir misc");
        fs::create_dir_all(paths.rejected_dir.join(".trash")).expect("mkdir trash");

        let outcome = reconcile_bin(&store, &paths, Bin::Rejected);
        assert_eq!((outcome.attempted, outcome.succeeded), (3, 0));
        assert_eq!(outcome.issues.len(), 3);
        assert!(outcome.issues.iter().any(|i| i.contains(".hidden_item")));
        assert!(outcome.issues.iter().any(|i| i.contains("misc")));
        assert!(outcome.issues.iter().any(|i| i.contains(".trash")));
        assert_eq!(store.status_of("hidden00"), Some(Status::Pending));
        assert!(store.calls.borrow().is_empty());
    }

    #[test]
    fn missing_bin_reports_nothing() {
        let tmp = tempdir().expect("tempdir");
        let paths = ModerationPaths::under(tmp.path());
        let outcome = reconcile_bin(&FakeStore::default(), &paths, Bin::Approved);
        assert_eq!(outcome.attempted, 0);
        assert!(outcome.issues.is_empty());
    }
}
