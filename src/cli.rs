use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::{self, CommandReport};
use crate::moderation::category::Category;
use crate::moderation::record::Bin;

/// Exit code when a stage ran to completion but some items failed.
const EXIT_PARTIAL: i32 = 2;

/// Local moderation of pending submissions.
#[derive(Debug, Parser)]
#[command(name = "moderacao", version, about = "Pull pending submissions for review and reconcile decisions")]
struct Cli {
    /// Print the report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BinArg {
    Approved,
    Rejected,
}

impl From<BinArg> for Bin {
    fn from(arg: BinArg) -> Self {
        match arg {
            BinArg::Approved => Bin::Approved,
            BinArg::Rejected => Bin::Rejected,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download every pending record into the staging folder.
    Pull {
        /// Only pull one category (sonhos, prospeccoes, descarregos, cotidiano).
        #[arg(long)]
        category: Option<Category>,
    },
    /// Push approved/rejected decisions back to the remote store.
    Reconcile {
        #[arg(long, value_enum)]
        bin: Option<BinArg>,
    },
    /// Show local staging layout and configuration.
    Status,
    /// Count remote records per status for each category.
    RemoteSummary,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Pull { category } => {
            commands::pull::run(&commands::pull::PullOptions { category })?
        }
        Commands::Reconcile { bin } => {
            commands::reconcile::run(&commands::reconcile::ReconcileOptions {
                bin: bin.map(Bin::from),
            })?
        }
        Commands::Status => commands::status::run()?,
        Commands::RemoteSummary => commands::remote_summary::run()?,
    };

    print_report(&report, cli.json)?;
    Ok(if report.ok { 0 } else { EXIT_PARTIAL })
}
