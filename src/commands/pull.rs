use anyhow::Result;

use crate::commands::CommandReport;
use crate::moderation::category::Category;
use crate::moderation::config::load_config;
use crate::moderation::lock::RunLock;
use crate::moderation::paths::{ModerationPaths, resolve_paths};
use crate::moderation::pull::pull_all;
use crate::moderation::store::{HttpStore, RemoteStore};

#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub category: Option<Category>,
}

pub fn run(opts: &PullOptions) -> Result<CommandReport> {
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
    opts: &PullOptions,
) -> CommandReport {
    let mut report = CommandReport::new("pull");
    let categories = match opts.category {
        Some(category) => vec![category],
        None => Category::ALL.to_vec(),
    };

    report.detail(format!("pending_dir={}", paths.pending_dir.display()));
    let outcome = pull_all(store, paths, &categories);
    for category in &outcome.categories {
        match &category.listing_error {
            Some(_) => report.detail(format!("{}: skipped", category.category)),
            None => report.detail(format!(
                "{}: listed={} materialized={} blob_failures={}",
                category.category,
                category.listed,
                category.count(),
                category.blob_failures
            )),
        }
        report.issues_from(category.issues.iter().cloned());
    }
    report.detail(format!(
        "total: listed={} materialized={}",
        outcome.listed(),
        outcome.materialized()
    ));
    if outcome.materialized() > 0 {
        report.detail(
            "next: move reviewed directories into the approved or rejected bin, then run `moderacao reconcile`",
        );
    }
    report
}
