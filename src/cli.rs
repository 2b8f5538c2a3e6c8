// src/cli.rs

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::core::models::Module;

/// Exports Cymulate assessment reports into per-environment JSON files.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cymulate-export",
    version,
    after_help = "Examples:\n  \
        # last six months, every module\n  \
        cymulate-export\n\n  \
        # custom window, two modules\n  \
        cymulate-export -s 2024-01-01 -e 2024-01-31 -m mail -m edr\n\n\
        The API token is read from CYMULATE_XTOKEN and the client name from CLIENTE\n\
        (.env supported)."
)]
pub struct Cli {
    /// First day of the search window (YYYY-MM-DD). Defaults to six months ago.
    #[arg(short = 's', long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the search window (YYYY-MM-DD). Defaults to today.
    #[arg(short = 'e', long, value_name = "YYYY-MM-DD")]
    pub end_date: Option<NaiveDate>,

    /// Module to collect; repeat to select several. Defaults to all of
    /// immediate-threats, mail, browsing, waf, edr, dlp and hopper.
    #[arg(short = 'm', long = "module", value_name = "MODULE")]
    pub modules: Vec<Module>,

    /// Directory under which the `<client>/` export tree is written.
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Concurrent requests per pool (environments, and assessments per environment).
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Retry a request once after a connection error, timeout or 5xx answer.
    #[arg(long)]
    pub retry_once: bool,

    /// Do not save the environment and agent lists.
    #[arg(long)]
    pub skip_inventory: bool,
}
