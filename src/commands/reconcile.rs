use anyhow::Result;

use crate::commands::CommandReport;
use crate::moderation::config::load_config;
use crate::moderation::lock::RunLock;
use crate::moderation::paths::{ModerationPaths, resolve_paths};
use crate::moderation::reconcile::reconcile_bin;
use crate::moderation::record::{Bin, Status};
use crate::moderation::store::{HttpStore, RemoteStore};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub bin: Option<Bin>,
}

pub fn run(opts: &ReconcileOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let store = HttpStore::new(cfg.store)?;
    let lock = RunLock::acquire(&paths.lock_file())?;

    let mut report = run_with_store(&store, &paths, opts);
    report.detail(format!("lock={}", lock.path().display()));
    Ok(report)
}

pub fn run_with_store(
    store: &dyn RemoteStore,
    paths: &ModerationPaths,
    opts: &ReconcileOptions,
) -> CommandReport {
    let mut report = CommandReport::new("reconcile");
    let bins = match opts.bin {
        Some(bin) => vec![bin],
        None => Bin::ALL.to_vec(),
    };

    let mut attempted = 0;
    let mut succeeded = 0;
    for bin in bins {
        let dir = paths.bin_dir(bin);
        if !dir.exists() {
            report.detail(format!("{}: {} not found, nothing to do", bin.as_str(), dir.display()));
            continue;
        }
        let outcome = reconcile_bin(store, paths, bin);
        report.detail(format!(
            "{}: attempted={} succeeded={} failed={}",
            outcome.bin.as_str(),
            outcome.attempted,
            outcome.succeeded,
            outcome.failed()
        ));
        if outcome.bin.target_status() == Status::Rejected {
            report.detail(format!(
                "{}: blobs deleted={} already_gone={} failed={}",
                outcome.bin.as_str(),
                outcome.blobs.deleted,
                outcome.blobs.already_gone,
                outcome.blobs.failed
            ));
        }
        attempted += outcome.attempted;
        succeeded += outcome.succeeded;
        report.issues_from(outcome.issues);
    }

    report.detail(format!(
        "total: attempted={attempted} succeeded={succeeded} failed={}",
        attempted - succeeded
    ));
    report
}
