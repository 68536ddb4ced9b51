//! JSONL output files
//!
//! One file per source and day, `<stem>_<YYYYMMDD>.jsonl`, truncated on open so
//! each run fully replaces the previous content.

use crate::error::Result;
use crate::types::{NormalizedRecord, SourceId};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path of a source's output file for `date` inside `dir`
pub fn output_path(dir: &Path, source: SourceId, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}_{}.jsonl",
        source.file_stem(),
        date.format("%Y%m%d")
    ))
}

/// Write `records` to `path`, one JSON object per line
///
/// Returns the number of lines written. The file is created or truncated even
/// when `records` is empty.
pub fn write_jsonl(path: &Path, records: &[NormalizedRecord]) -> Result<usize> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    debug!(path = %path.display(), records = records.len(), "JSONL file written");
    Ok(records.len())
}
