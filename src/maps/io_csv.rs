// Primitives for reading CSV files.

use crate::maps::{
    io_common::{column_index, simplify_file_name},
    *,
};

/// Reads the year, amount and key columns of a CSV file with headers.
///
/// Columns are found by name, other columns are ignored.
pub fn read_csv_subsidies(path: &str, settings: &InputSettings) -> MapResult<Vec<ParsedRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let headers: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu {})?
        .iter()
        .map(|h| h.to_string())
        .collect();
    debug!("read_csv_subsidies: headers: {:?}", headers);

    let year_idx = column_index(&headers, &settings.year_column(), path)?;
    let amount_idx = column_index(&headers, &settings.amount_column(), path)?;
    let fips_idx = column_index(&headers, &settings.fips_column(), path)?;

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        let cell = |i: usize| -> MapResult<String> {
            Ok(line
                .get(i)
                .context(LineTooShortSnafu { lineno })?
                .to_string())
        };
        let row = ParsedRow {
            lineno,
            fips: cell(fips_idx)?,
            year: cell(year_idx)?,
            amount: cell(amount_idx)?,
        };
        debug!("read_csv_subsidies: {:?}", row);
        res.push(row);
    }
    info!("Read {:?} rows from {}", res.len(), simplify_file_name(path));
    Ok(res)
}
