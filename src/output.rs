use std::path::Path;

use tracing::info;

use crate::document::InstrumentRecord;
use crate::error::{Error, Result};

/// Leading blank cell heads the ordinal column.
pub const HEADER: [&str; 7] = [
    "",
    "FinInstrmGnlAttrbts.Id",
    "FinInstrmGnlAttrbts.FullNm",
    "FinInstrmGnlAttrbts.ClssfctnTp",
    "FinInstrmGnlAttrbts.CmmdtyDerivInd",
    "FinInstrmGnlAttrbts.NtnlCcy",
    "Issr",
];

/// Write the table to `path`, replacing any existing file. Returns the row count.
pub fn write_csv(records: &[InstrumentRecord], path: &Path) -> Result<usize> {
    info!("Writing {} rows to {:?}", records.len(), path);
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;

    writer.write_record(HEADER)?;
    for (ordinal, r) in records.iter().enumerate() {
        writer.write_record([
            ordinal.to_string().as_str(),
            r.id.as_str(),
            r.full_name.as_str(),
            r.classification.as_str(),
            r.commodity_derivative.as_str(),
            r.currency.as_str(),
            r.issuer.as_str(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;

    info!("Csv file created with all the data");
    Ok(records.len())
}
