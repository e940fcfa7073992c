use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str =
    "https://registers.esma.europa.eu/solr/esma_registers_firds_files/select";

/// Run settings: defaults, then `FIRDS_*` environment variables, then CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: u32,
    /// Only accept listing records whose `file_type` equals this value.
    pub file_type: Option<String>,
    pub timeout_secs: u64,
    pub work_dir: PathBuf,
    pub output: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub rows: Option<u32>,
    pub file_type: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_from(Environment::with_prefix("FIRDS").try_parsing(true), overrides)
    }

    fn load_from(env: Environment, overrides: &Overrides) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("from", "2021-01-17")?
            .set_default("to", "2021-01-19")?
            .set_default("rows", 100)?
            .set_default("timeout_secs", 5)?
            .set_default("work_dir", ".")?
            .set_default("output", "Output.csv")?
            .set_default("log_file", "logs.log")?
            .set_default("log_level", "firds_extract=debug")?
            .add_source(env)
            .set_override_option("from", overrides.from.map(|d| d.to_string()))?
            .set_override_option("to", overrides.to.map(|d| d.to_string()))?
            .set_override_option("rows", overrides.rows.map(i64::from))?
            .set_override_option("file_type", overrides.file_type.clone())?
            .set_override_option("work_dir", path_value(&overrides.work_dir))?
            .set_override_option("output", path_value(&overrides.output))?
            .set_override_option("log_file", path_value(&overrides.log_file))?
            .set_override_option("log_level", overrides.log_level.clone())?
            .build()?
            .try_deserialize()?;

        if settings.from > settings.to {
            return Err(Error::InvalidWindow {
                from: settings.from,
                to: settings.to,
            });
        }
        Ok(settings)
    }

    /// Solr query for files published inside `[from 00:00:00Z, to 23:59:59Z]`.
    pub fn search_url(&self) -> String {
        format!(
            "{}?q=*&fq=publication_date:%5B{}T00:00:00Z+TO+{}T23:59:59Z%5D&wt=xml&indent=true&start=0&rows={}",
            self.endpoint,
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d"),
            self.rows
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Where the CSV lands; relative paths resolve against the working directory.
    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join(&self.output)
    }
}

fn path_value(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}
