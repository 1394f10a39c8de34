use anyhow::Result;

use crate::commands::CommandReport;
use crate::moderation::category::Category;
use crate::moderation::config::load_config;
use crate::moderation::store::{HttpStore, RemoteStore};

pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let store = HttpStore::new(cfg.store)?;
    Ok(run_with_store(&store))
}

pub fn run_with_store(store: &dyn RemoteStore) -> CommandReport {
    let mut report = CommandReport::new("remote-summary");
    for category in Category::ALL {
        match store.status_counts(category) {
            Ok(counts) => report.detail(format!(
                "{category} ({}): total={} pending={} approved={} rejected={}",
                category.table(),
                counts.total(),
                counts.pending,
                counts.approved,
                counts.rejected
            )),
            Err(err) => report.issue(format!("{category}: {err}")),
        }
    }
    report
}
