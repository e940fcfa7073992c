use std::path::PathBuf;

use tracing::info;

use crate::archive;
use crate::document;
use crate::error::{AtStage, Error, Stage, StageError};
use crate::fetch::Fetch;
use crate::listing;
use crate::output;
use crate::settings::Settings;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Written {
        entries: Vec<String>,
        document: String,
        output: PathBuf,
        rows: usize,
    },
    /// No listing record carried a usable link; nothing was downloaded.
    LinkNotFound,
}

/// fetch → locate → extract → flatten → write, once.
pub fn run(settings: &Settings, fetcher: &impl Fetch) -> Result<Outcome, StageError> {
    info!("Fetching the file listing");
    let body = fetcher
        .fetch(&settings.search_url(), Some(settings.timeout()))
        .at(Stage::Fetch)?;

    let records = listing::parse_listing(&body).at(Stage::Locate)?;
    let Some(link) = listing::find_download_link(&records, settings.file_type.as_deref()) else {
        return Ok(Outcome::LinkNotFound);
    };

    // archives run to hundreds of MB; the listing timeout does not apply
    let archive_bytes = fetcher.fetch(&link, None).at(Stage::Extract)?;
    let entries = archive::extract_archive(archive_bytes, &settings.work_dir).at(Stage::Extract)?;

    let document = pick_document(&entries)
        .map(str::to_string)
        .ok_or(Error::EmptyArchive)
        .at(Stage::Flatten)?;
    let instruments = document::flatten(&settings.work_dir.join(&document)).at(Stage::Flatten)?;

    let output = settings.output_path();
    let rows = output::write_csv(&instruments, &output).at(Stage::Write)?;

    Ok(Outcome::Written {
        entries,
        document,
        output,
        rows,
    })
}

/// First `.xml` entry, else the first entry of any kind. Entries that
/// were never written into the work dir are not candidates.
fn pick_document(entries: &[String]) -> Option<&str> {
    let safe: Vec<&String> = entries
        .iter()
        .filter(|name| archive::enclosed_path(name).is_some())
        .collect();
    safe.iter()
        .find(|name| name.to_ascii_lowercase().ends_with(".xml"))
        .or_else(|| safe.first())
        .map(|name| name.as_str())
}
