// Reader for subsidy tables exported as Excel workbooks.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::maps::{
    io_common::{column_index, simplify_file_name},
    *,
};

pub fn read_xlsx_subsidies(path: &str, settings: &InputSettings) -> MapResult<Vec<ParsedRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match settings.excel_worksheet_name.as_deref() {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu {})?;
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, c)| cell_to_string(c, 1, idx))
        .collect::<MapResult<Vec<String>>>()?;
    debug!("read_xlsx_subsidies: header: {:?}", headers);

    let year_idx = column_index(&headers, &settings.year_column(), path)?;
    let amount_idx = column_index(&headers, &settings.amount_column(), path)?;
    let fips_idx = column_index(&headers, &settings.fips_column(), path)?;

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let cell = |i: usize| -> MapResult<String> {
            let c = row.get(i).context(LineTooShortSnafu { lineno })?;
            cell_to_string(c, lineno, i)
        };
        let pr = ParsedRow {
            lineno,
            fips: cell(fips_idx)?,
            year: cell(year_idx)?,
            amount: cell(amount_idx)?,
        };
        debug!("read_xlsx_subsidies: {:?}", pr);
        res.push(pr);
    }
    info!("Read {:?} rows from {}", res.len(), simplify_file_name(path));
    Ok(res)
}

fn cell_to_string(cell: &DataType, lineno: usize, column: usize) -> MapResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        // Numbers without fraction print without decimal point.
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Empty => Ok("".to_string()),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("column {}: {:?}", column, cell),
        }
        .fail(),
    }
}
