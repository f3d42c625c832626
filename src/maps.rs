use log::{debug, info, warn};

use county_subsidies::builder::Builder;
use county_subsidies::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::maps::config_reader::*;
use crate::maps::io_geojson::GeoReference;
use crate::maps::render::{render_animated_svg, render_static_svg};

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_geojson;
mod io_xlsx;
pub mod render;

#[derive(Debug, Snafu)]
pub enum MapError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error parsing a CSV line: {source}"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Missing column {column:?} in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno} is too short"))]
    LineTooShort { lineno: usize },
    #[snafu(display("Line {lineno}: cannot read the {column} from {value:?}"))]
    BadValue {
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Missing worksheet or header row"))]
    EmptyExcel {},
    #[snafu(display("Line {lineno}: cannot read cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Malformed county reference: {message}"))]
    GeoJsonShape { message: String },
    #[snafu(display("Missing setting {name}"))]
    MissingSetting { name: String },
    #[snafu(display("Invalid setting {name}: {value}"))]
    InvalidSetting { name: String, value: String },
    #[snafu(display("{source}"))]
    Data { source: DataErrors },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between the run summary and the reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type MapResult<T> = Result<T, MapError>;

/// A row, as parsed by the readers.
/// This is before checking the key, the year and the amount.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedRow {
    pub lineno: usize,
    pub fips: String,
    pub year: String,
    pub amount: String,
}

fn validate_rows(rows: &[ParsedRow]) -> MapResult<Vec<SubsidyRecord>> {
    let mut res: Vec<SubsidyRecord> = Vec::new();
    for r in rows.iter() {
        let lineno = r.lineno;
        let fips = Fips::parse(&r.fips).ok().context(BadValueSnafu {
            lineno,
            column: "key",
            value: r.fips.clone(),
        })?;
        let year = io_common::parse_year(&r.year).context(BadValueSnafu {
            lineno,
            column: "year",
            value: r.year.clone(),
        })?;
        let amount = io_common::parse_amount(&r.amount).context(BadValueSnafu {
            lineno,
            column: "amount",
            value: r.amount.clone(),
        })?;
        res.push(SubsidyRecord::new(fips, year, amount).context(DataSnafu {})?);
    }
    Ok(res)
}

fn read_subsidy_data(
    path: &str,
    provider: &str,
    settings: &InputSettings,
) -> MapResult<Vec<SubsidyRecord>> {
    info!("Attempting to read subsidy file {:?}", path);
    let rows = match provider {
        "csv" => io_csv::read_csv_subsidies(path, settings)?,
        "xlsx" => io_xlsx::read_xlsx_subsidies(path, settings)?,
        x => {
            whatever!("Provider not implemented {:?}", x)
        }
    };
    validate_rows(&rows)
}

fn summary_to_json(summary: &Option<Summary>) -> JSValue {
    match summary {
        None => JSValue::Null,
        Some(s) => {
            let quantiles: Vec<JSValue> = s
                .quantiles
                .iter()
                .map(|(q, v)| json!({"quantile": q.to_string(), "value": v.to_string()}))
                .collect();
            json!({
                "count": s.count,
                "min": s.min.to_string(),
                "max": s.max.to_string(),
                "mean": s.mean.to_string(),
                "quantiles": quantiles
            })
        }
    }
}

fn keys_to_json(keys: &[Fips]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

fn build_summary_js(title: &str, table: &CleanTable, summary: &Option<Summary>) -> JSValue {
    let report = &table.report;
    let duplicates: Vec<JSValue> = report
        .duplicates
        .iter()
        .map(|d| json!({"fips": d.fips.to_string(), "year": d.year, "count": d.count}))
        .collect();
    json!({
        "config": {
            "title": title,
            "lowBound": table.bounds.low().to_string(),
            "highBound": table.bounds.high().to_string()
        },
        "results": {
            "loaded": report.loaded,
            "synthesized": report.synthesized,
            "records": table.records.len(),
            "years": table.years,
            "missingKeys": keys_to_json(&report.missing_keys),
            "unknownKeys": keys_to_json(&report.unknown_keys),
            "duplicates": duplicates,
            "clippedAbove": report.clip_stats.above,
            "clippedBelow": report.clip_stats.below,
            "amounts": summary_to_json(summary)
        }
    })
}

fn write_output(dir: &Path, file_name: &str, content: &str) -> MapResult<String> {
    let p: PathBuf = dir.join(file_name);
    let path = p.display().to_string();
    fs::write(&p, content).context(WritingOutputSnafu { path: path.clone() })?;
    info!("Wrote {:?}", path);
    Ok(path)
}

/// The settings of a run, after merging the configuration file and the command line.
#[derive(PartialEq, Debug, Clone)]
struct RunSettings {
    input_path: String,
    provider: String,
    geo_path: String,
    out_dir: String,
    static_year: Option<Year>,
}

fn merge_settings(args: &Args, config: &MapConfig, root: &Path) -> MapResult<RunSettings> {
    let from_config = |p: &Option<String>| p.as_ref().map(|s| io_common::resolve_path(root, s));
    let input_path = args
        .input
        .clone()
        .or_else(|| from_config(&config.input_settings.file_path))
        .context(MissingSettingSnafu { name: "input" })?;
    let geo_path = args
        .geo
        .clone()
        .or_else(|| from_config(&config.geo_settings.file_path))
        .context(MissingSettingSnafu { name: "geo" })?;
    let out_dir = args
        .out_dir
        .clone()
        .or_else(|| from_config(&config.output_settings.output_directory))
        .unwrap_or_else(|| root.display().to_string());
    let provider = args
        .input_type
        .clone()
        .or_else(|| config.input_settings.provider.clone())
        .unwrap_or_else(|| "csv".to_string());
    Ok(RunSettings {
        input_path,
        provider,
        geo_path,
        out_dir,
        static_year: args.year.or(config.render_settings.static_year),
    })
}

/// Runs the whole program: read, clean, draw and summarize.
///
/// Returns the run summary.
pub fn run_maps(args: &Args) -> MapResult<JSValue> {
    let (config, root): (MapConfig, PathBuf) = match &args.config {
        Some(config_path) => {
            info!("Reading configuration {:?}", config_path);
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            (config, root)
        }
        None => (MapConfig::default(), PathBuf::from(".")),
    };
    debug!("config: {:?}", config);

    let settings = merge_settings(args, &config, &root)?;
    info!("settings: {:?}", settings);
    let rules = validate_rules(&config.cleaning)?;
    let render_opts = config_reader::validate_render(&config.render_settings)?;

    let geo: GeoReference = io_geojson::read_geojson(&settings.geo_path, &config.geo_settings)?;
    let records = read_subsidy_data(
        &settings.input_path,
        settings.provider.as_str(),
        &config.input_settings,
    )?;

    let summary = Summary::of(&records.iter().map(|r| r.amount).collect::<Vec<f64>>());
    if let Some(s) = &summary {
        info!(
            "Amounts: count {} min {} max {} mean {} quantiles {:?}",
            s.count, s.min, s.max, s.mean, s.quantiles
        );
    }

    let mut builder = Builder::new(&rules)
        .context(DataSnafu {})?
        .universe_keys(geo.universe());
    for r in records.iter() {
        builder.add_record(r).context(DataSnafu {})?;
    }
    let table = builder.run().context(DataSnafu {})?;

    let year = match settings.static_year.or_else(|| table.years.last().cloned()) {
        Some(y) => y,
        None => {
            whatever!("No data to draw in {:?}", settings.input_path)
        }
    };
    ensure!(
        table.years.contains(&year),
        InvalidSettingSnafu {
            name: "year",
            value: year.to_string(),
        }
    );

    let out_dir = Path::new(&settings.out_dir);
    fs::create_dir_all(out_dir).context(WritingOutputSnafu {
        path: settings.out_dir.clone(),
    })?;

    let static_name = config
        .output_settings
        .static_file_name
        .clone()
        .unwrap_or_else(|| "subsidies_{year}.svg".to_string())
        .replace("{year}", &year.to_string());
    write_output(
        out_dir,
        &static_name,
        &render_static_svg(&table, &geo, &render_opts, year),
    )?;

    let animated_name = config
        .output_settings
        .animated_file_name
        .clone()
        .unwrap_or_else(|| "subsidies_animated.svg".to_string());
    write_output(
        out_dir,
        &animated_name,
        &render_animated_svg(&table, &geo, &render_opts),
    )?;

    let result_js = build_summary_js(&render_opts.title, &table, &summary);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {
        path: "summary",
    })?;
    info!("summary: {}", pretty_js_stats);
    let summary_name = config
        .output_settings
        .summary_file_name
        .clone()
        .unwrap_or_else(|| "summary.json".to_string());
    write_output(out_dir, &summary_name, &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {
                path: summary_p.clone(),
            })?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
    }

    Ok(result_js)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!(
            "{}/tests/small_counties/{}",
            env!("CARGO_MANIFEST_DIR"),
            name
        )
    }

    fn args(config: Option<String>, out_dir: &Path) -> Args {
        Args {
            config,
            reference: None,
            out_dir: Some(out_dir.display().to_string()),
            input: None,
            input_type: None,
            geo: None,
            year: None,
            verbose: false,
        }
    }

    #[test]
    fn small_counties() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(Some(fixture("small_counties_config.json")), dir.path());
        a.reference = Some(fixture("small_counties_expected_summary.json"));
        let js = run_maps(&a).unwrap();
        assert_eq!(js["results"]["synthesized"], json!(4));

        let static_svg = fs::read_to_string(dir.path().join("small_counties_2019.svg")).unwrap();
        assert!(static_svg.contains(r##"fill="#000000"><title>06083: 50M</title>"##));
        assert!(static_svg.contains(r##"fill="#808080"><title>19153: 25M</title>"##));
        assert!(static_svg.contains(r##"fill="#ffffff"><title>06085: 0</title>"##));
        assert!(!static_svg.contains("c99999"));
        assert!(static_svg.contains(r#"text-anchor="start">0-</text>"#));
        assert!(static_svg.contains(r#"text-anchor="end">50M+</text>"#));

        let animated_svg = fs::read_to_string(dir.path().join("subsidies_animated.svg")).unwrap();
        assert!(animated_svg.contains(
            r##"dur="3.00s" repeatCount="indefinite" calcMode="linear" keyTimes="0.0000;0.3333;1.0000" values="#bfbfbf;#000000;#000000""##
        ));
        assert!(dir.path().join("summary.json").exists());
    }

    #[test]
    fn small_counties_from_excel() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(Some(fixture("small_counties_config.json")), dir.path());
        a.input = Some(fixture("small_counties.xlsx"));
        a.input_type = Some("xlsx".to_string());
        a.reference = Some(fixture("small_counties_expected_summary.json"));
        let js = run_maps(&a).unwrap();
        assert_eq!(js["results"]["unknownKeys"], json!(["99999"]));
    }

    #[test]
    fn other_year_from_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(Some(fixture("small_counties_config.json")), dir.path());
        a.year = Some(2018);
        run_maps(&a).unwrap();
        let static_svg = fs::read_to_string(dir.path().join("small_counties_2018.svg")).unwrap();
        assert!(static_svg.contains(r##"fill="#bfbfbf"><title>06083: 12M</title>"##));

        a.year = Some(2012);
        assert!(matches!(
            run_maps(&a),
            Err(MapError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn reference_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("reference.json");
        fs::write(&reference, r#"{"results": {}}"#).unwrap();
        let mut a = args(Some(fixture("small_counties_config.json")), dir.path());
        a.reference = Some(reference.display().to_string());
        assert!(matches!(run_maps(&a), Err(MapError::ReferenceMismatch {})));
    }

    #[test]
    fn command_line_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(None, dir.path());
        a.input = Some(fixture("small_counties.csv"));
        a.geo = Some(fixture("small_counties.geojson"));
        let js = run_maps(&a).unwrap();
        assert_eq!(js["results"]["records"], json!(9));
        assert_eq!(js["config"]["highBound"], json!("50000000"));
        assert!(dir.path().join("subsidies_2019.svg").exists());

        a.geo = None;
        assert!(matches!(
            run_maps(&a),
            Err(MapError::MissingSetting { .. })
        ));
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(None, dir.path());
        a.input = Some(fixture("nothing_here.csv"));
        a.geo = Some(fixture("small_counties.geojson"));
        assert!(matches!(run_maps(&a), Err(MapError::OpeningCsv { .. })));

        a.input = Some(fixture("small_counties.csv"));
        a.input_type = Some("parquet".to_string());
        assert!(matches!(run_maps(&a), Err(MapError::Whatever { .. })));
    }

    #[test]
    fn rejected_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("dups.csv");
        fs::write(&csv_path, "year,total_subs_adj,fips\n2019,1,6083\n2019,2,6083\n").unwrap();
        let config_path = dir.path().join("config.json");
        let config = json!({
            "inputSettings": {"filePath": "dups.csv"},
            "geoSettings": {"filePath": fixture("small_counties.geojson")},
            "cleaning": {"duplicatePolicy": "reject"}
        });
        fs::write(&config_path, config.to_string()).unwrap();
        let a = args(Some(config_path.display().to_string()), dir.path());
        assert!(matches!(
            run_maps(&a),
            Err(MapError::Data {
                source: DataErrors::DuplicateRecord { count: 2, .. }
            })
        ));
    }

    #[test]
    fn rows_validation() {
        let row = |lineno: usize, fips: &str, year: &str, amount: &str| ParsedRow {
            lineno,
            fips: fips.to_string(),
            year: year.to_string(),
            amount: amount.to_string(),
        };
        let records = validate_rows(&[row(2, "6083", "2019.0", "-500")]).unwrap();
        assert_eq!(records[0].fips.to_string(), "06083");
        assert_eq!(records[0].year, 2019);
        assert_eq!(records[0].amount, -500.0);

        match validate_rows(&[row(2, "6083", "2019", "1"), row(3, "abc", "2019", "1")]) {
            Err(MapError::BadValue { lineno, column, .. }) => {
                assert_eq!(lineno, 3);
                assert_eq!(column, "key");
            }
            x => panic!("unexpected {:?}", x),
        }
        assert!(matches!(
            validate_rows(&[row(4, "6083", "2019", "")]),
            Err(MapError::BadValue { lineno: 4, .. })
        ));
        assert!(matches!(
            validate_rows(&[row(5, "6083", "2019", "NaN")]),
            Err(MapError::Data { .. })
        ));
    }

    #[test]
    fn rules_validation() {
        let rules = validate_rules(&CleaningSettings {
            low_bound: Some(-10.0),
            high_bound: Some(10.0),
            fill_policy: Some("missingPairs".to_string()),
            duplicate_policy: None,
        })
        .unwrap();
        assert_eq!(rules.fill_policy, FillPolicy::MissingPairs);
        assert_eq!(rules.duplicate_policy, DuplicatePolicy::Keep);
        assert_eq!(rules.bounds.low(), -10.0);

        assert!(validate_rules(&CleaningSettings {
            fill_policy: Some("everything".to_string()),
            ..CleaningSettings::default()
        })
        .is_err());
        assert!(validate_rules(&CleaningSettings {
            low_bound: Some(10.0),
            high_bound: Some(0.0),
            ..CleaningSettings::default()
        })
        .is_err());
    }
}
