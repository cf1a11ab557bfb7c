//! CSV export of per-skater payoffs and per-angle mean payoff series.

use crate::arena::{PayoffRow, SeriesPoint};
use anyhow::{Context, Result, bail};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Write `ROUND,SKATER,<angle>,...` with angles in ascending order.
pub fn write_payoff_header<W: Write>(writer: &mut W, angles: &[u32]) -> Result<()> {
    write!(writer, "ROUND,SKATER")?;
    for angle in angles {
        write!(writer, ",{angle}")?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write one line per row: round, skater index, then the cumulated payoffs.
pub fn write_payoff_rows<W: Write>(writer: &mut W, rows: &[PayoffRow]) -> Result<()> {
    for row in rows {
        write!(writer, "{},{}", row.round, row.agent)?;
        for cum_payoff in &row.cum_payoffs {
            write!(writer, ",{cum_payoff}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the per-angle series as one column per angle and one line per round.
///
/// This is the data of the mean payoff chart: x is the round, and each angle
/// is one plotted line.
pub fn write_series<W: Write>(
    writer: &mut W,
    series: &BTreeMap<u32, Vec<SeriesPoint>>,
) -> Result<()> {
    let columns: Vec<_> = series.values().collect();
    let n_rounds = columns.first().map_or(0, |col| col.len());
    if columns.iter().any(|col| col.len() != n_rounds) {
        bail!("series of all angles must have the same length");
    }

    write!(writer, "ROUND")?;
    for angle in series.keys() {
        write!(writer, ",{angle}")?;
    }
    writeln!(writer)?;

    for i_pt in 0..n_rounds {
        write!(writer, "{}", columns[0][i_pt].round)?;
        for col in &columns {
            write!(writer, ",{}", col[i_pt].mean_payoff)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the per-angle series to `file`.
pub fn save_series<P: AsRef<Path>>(
    file: P,
    series: &BTreeMap<u32, Vec<SeriesPoint>>,
) -> Result<()> {
    let file = file.as_ref();
    let handle = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(handle);
    write_series(&mut writer, series).context("failed to write series")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
