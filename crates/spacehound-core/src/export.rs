/// Export of results for use outside the tool.
///
/// Duplicate groups go to CSV with one row per file; any event or result
/// type can be rendered as pretty JSON.
use crate::error::Result;
use crate::model::DuplicateGroup;
use serde::Serialize;
use std::io;

#[derive(Serialize)]
struct DuplicateRow<'a> {
    hash: &'a str,
    size: u64,
    path: String,
}

/// Write `groups` as CSV with the columns `hash,size,path`.
pub fn write_duplicates_csv<W: io::Write>(groups: &[DuplicateGroup], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for group in groups {
        for path in &group.files {
            csv_writer.serialize(DuplicateRow {
                hash: &group.hash,
                size: group.size,
                path: path.to_string_lossy().into_owned(),
            })?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
