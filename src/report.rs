//! One-shot report - read, print, optionally append to the sheet

use crate::config::SheetsSettings;
use crate::format::to_json;
use crate::sensor::SensorReader;
use std::io::Write;

/// Take one reading and write it to `out` as a JSON line.
///
/// When `sheets` is set the reading is also appended there. A sink that
/// cannot be built is logged and skipped; a failed append is an error.
pub async fn report(
    reader: &SensorReader,
    sheets: Option<&SheetsSettings>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let reading = reader.acquire().await?;
    writeln!(out, "{}", to_json(&reading))?;

    #[cfg(feature = "sheets")]
    {
        if let Some(sheets) = sheets {
            match crate::sheets::SpreadsheetSink::new(sheets).await {
                Ok(mut sink) => sink.append(&reading, &sheets.range).await?,
                Err(e) => tracing::warn!("Spreadsheet sink unavailable, reading not recorded: {}", e),
            }
        }
    }

    #[cfg(not(feature = "sheets"))]
    {
        if sheets.is_some() {
            tracing::warn!("Sheet configured but built without the `sheets` feature");
        }
    }

    Ok(())
}
