mod archive;
mod document;
mod error;
mod fetch;
mod listing;
mod logging;
mod output;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};

use crate::fetch::HttpFetcher;
use crate::pipeline::Outcome;
use crate::settings::{Overrides, Settings};

#[derive(Parser)]
#[command(
    name = "firds_extract",
    about = "Download an ESMA FIRDS delta file and flatten its instruments into CSV"
)]
struct Cli {
    /// First publication date of the search window (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last publication date of the search window (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Max listing records to request
    #[arg(long)]
    rows: Option<u32>,
    /// Only accept listing records of this file type (e.g. DLTINS)
    #[arg(long)]
    file_type: Option<String>,
    /// Directory archive entries are extracted into
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// CSV output path
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Log file, truncated on every run
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log filter directive (e.g. debug, info)
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Overrides {
            from: cli.from,
            to: cli.to,
            rows: cli.rows,
            file_type: cli.file_type,
            work_dir: cli.work_dir,
            output: cli.output,
            log_file: cli.log_file,
            log_level: cli.log_level,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let settings = Settings::load(&Cli::parse().into())?;
    let subscriber = logging::file_subscriber(&settings.log_file, &settings.log_level)?;
    let fetcher = HttpFetcher::new()?;

    let outcome = tracing::subscriber::with_default(subscriber, || {
        info!("Run started for publication window {}..{}", settings.from, settings.to);
        let result = pipeline::run(&settings, &fetcher);
        match &result {
            Ok(_) => info!("Run finished in {:.1}s", t0.elapsed().as_secs_f64()),
            Err(e) => error!(stage = %e.stage, "{}", chain(e)),
        }
        result
    })?;

    match outcome {
        Outcome::Written {
            entries,
            document,
            output,
            rows,
        } => {
            println!("Extracted {} archive entries", entries.len());
            println!("Wrote {} rows from {} to {}", rows, document, output.display());
        }
        Outcome::LinkNotFound => println!("Link not found; nothing downloaded."),
    }
    Ok(())
}

/// `outer: cause: root cause`
fn chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
