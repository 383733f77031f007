use std::io::Write;

use polars::prelude::*;

use crate::error::Result;

/// Serialise any filtered or aggregated frame as CSV with a header row.
///
/// Column order is kept as-is, so a filtered trade subset comes out in the
/// source schema's order.
pub fn write_csv<W: Write>(df: &mut DataFrame, writer: W) -> Result<()> {
    CsvWriter::new(writer).include_header(true).finish(df)?;
    Ok(())
}

/// CSV text of a frame, for download buttons and the like.
pub fn to_csv_string(df: &mut DataFrame) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(df, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
