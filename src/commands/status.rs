use anyhow::Result;
use std::collections::BTreeSet;
use std::env;
use std::path::Path;

use crate::commands::CommandReport;
use crate::moderation::config::load_config;
use crate::moderation::paths::{ModerationPaths, resolve_paths};
use crate::moderation::staging::{
    is_complete, is_hidden, is_partial, list_child_dirs, list_staging_dirs,
};

include!(concat!(env!("OUT_DIR"), "/moderacao_env_allowlist.rs"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderCounts {
    pub complete: usize,
    pub incomplete: usize,
    pub stale_partial: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryScan {
    pub name: String,
    pub counts: FolderCounts,
    pub incomplete: Vec<String>,
    pub stale_partials: Vec<String>,
}

/// Per-category counts under one top-level folder. Missing folders count as
/// empty. `.partial-*` leftovers of interrupted pulls are counted apart.
pub fn scan_folder(root: &Path) -> Result<Vec<CategoryScan>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for category_dir in list_staging_dirs(root)? {
        let mut scan = CategoryScan {
            name: category_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            ..CategoryScan::default()
        };
        for dir in list_child_dirs(&category_dir)? {
            if is_partial(&dir) {
                scan.counts.stale_partial += 1;
                scan.stale_partials.push(dir.display().to_string());
            } else if is_hidden(&dir) {
                continue;
            } else if is_complete(&dir) {
                scan.counts.complete += 1;
            } else {
                scan.counts.incomplete += 1;
                scan.incomplete.push(dir.display().to_string());
            }
        }
        out.push(scan);
    }
    Ok(out)
}

pub fn unknown_env_keys(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let allowed: BTreeSet<&str> = GENERATED_MODERACAO_ENV_ALLOWLIST.iter().copied().collect();
    let mut unknown: Vec<String> = keys
        .into_iter()
        .filter(|key| key.starts_with("MODERACAO_") && !allowed.contains(key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = report_for(&paths)?;

    match load_config() {
        Ok(cfg) => {
            report.detail(format!("store.url={}", cfg.store.url));
            report.detail(format!("store.bucket={}", cfg.store.bucket));
            report.detail(format!(
                "store.request_timeout_secs={}",
                cfg.store.request_timeout_secs
            ));
        }
        Err(err) => report.issue(format!("store config invalid: {err:#}")),
    }

    for key in unknown_env_keys(env::vars().map(|(k, _)| k)) {
        report.issue(format!("unknown environment key {key}"));
    }
    Ok(report)
}

pub fn report_for(paths: &ModerationPaths) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    let folders = [
        ("pending", paths.pending_dir.as_path(), false),
        ("approved", paths.approved_dir.as_path(), true),
        ("rejected", paths.rejected_dir.as_path(), true),
    ];
    for (label, root, is_bin) in folders {
        report.detail(format!("{label}_dir={}", root.display()));
        for scan in scan_folder(root)? {
            report.detail(format!(
                "{label}.{}: complete={} incomplete={} stale_partial={}",
                scan.name,
                scan.counts.complete,
                scan.counts.incomplete,
                scan.counts.stale_partial
            ));
            if is_bin {
                for dir in scan.incomplete {
                    report.issue(format!("{dir} has no sidecar and will fail reconcile"));
                }
            }
            for dir in scan.stale_partials {
                report.issue(format!(
                    "{dir} is left over from an interrupted pull; delete it or pull again"
                ));
            }
        }
    }
    Ok(report)
}
