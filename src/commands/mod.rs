pub mod pull;
pub mod reconcile;
pub mod remote_summary;
pub mod status;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn issues_from(&mut self, items: impl IntoIterator<Item = String>) {
        for item in items {
            self.issue(item);
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.command,
            if self.ok { "ok" } else { "completed with issues" }
        );
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        if !self.issues.is_empty() {
            out.push_str("issues:\n");
            for issue in &self.issues {
                out.push_str(&format!("  - {issue}\n"));
            }
        }
        out
    }
}
