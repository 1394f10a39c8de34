use crate::moderation::category::Category;
use crate::moderation::record::Bin;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ModerationPaths {
    pub home: PathBuf,
    pub pending_dir: PathBuf,
    pub approved_dir: PathBuf,
    pub rejected_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ModerationPaths {
    pub fn under(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            pending_dir: home.join("pendentes"),
            approved_dir: home.join("aprovados"),
            rejected_dir: home.join("rejeitados"),
            logs_dir: home.join("logs"),
        }
    }

    pub fn bin_dir(&self, bin: Bin) -> &Path {
        match bin {
            Bin::Approved => &self.approved_dir,
            Bin::Rejected => &self.rejected_dir,
        }
    }

    pub fn pending_category_dir(&self, category: Category) -> PathBuf {
        self.pending_dir.join(category.tag())
    }

    pub fn lock_file(&self) -> PathBuf {
        self.home.join(".moderacao.lock")
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ModerationPaths> {
    let cwd = env::current_dir().context("current directory could not be resolved")?;
    let home = env_or_default_path("MODERACAO_HOME", cwd.join("moderacao"));
    let defaults = ModerationPaths::under(&home);

    Ok(ModerationPaths {
        pending_dir: env_or_default_path("MODERACAO_PENDING_DIR", defaults.pending_dir),
        approved_dir: env_or_default_path("MODERACAO_APPROVED_DIR", defaults.approved_dir),
        rejected_dir: env_or_default_path("MODERACAO_REJECTED_DIR", defaults.rejected_dir),
        logs_dir: env_or_default_path("MODERACAO_LOGS_DIR", defaults.logs_dir),
        home,
    })
}
