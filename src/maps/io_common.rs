use std::path::{Path, PathBuf};

use crate::maps::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Paths from a configuration file are relative to the directory of that file.
pub fn resolve_path(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        return path.to_string();
    }
    let res: PathBuf = root.join(p);
    res.display().to_string()
}

pub fn column_index(headers: &[String], column: &str, path: &str) -> MapResult<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}') == column)
        .context(MissingColumnSnafu { column, path })
}

/// "2019" or "2019.0" as written by dataframe exports.
pub fn parse_year(s: &str) -> Option<Year> {
    let t = s.trim();
    if let Ok(y) = t.parse::<Year>() {
        return Some(y);
    }
    match t.parse::<f64>() {
        Ok(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e6 => Some(x as Year),
        _ => None,
    }
}

pub fn parse_amount(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}
