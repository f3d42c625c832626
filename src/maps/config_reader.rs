use crate::maps::render::{RenderOptions, Rgb};
use crate::maps::*;

use serde::{Deserialize, Serialize};

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    pub provider: Option<String>,
    #[serde(rename = "yearColumn")]
    pub year_column: Option<String>,
    #[serde(rename = "amountColumn")]
    pub amount_column: Option<String>,
    #[serde(rename = "fipsColumn")]
    pub fips_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl InputSettings {
    pub fn year_column(&self) -> String {
        self.year_column.clone().unwrap_or_else(|| "year".to_string())
    }

    pub fn amount_column(&self) -> String {
        self.amount_column
            .clone()
            .unwrap_or_else(|| "total_subs_adj".to_string())
    }

    pub fn fips_column(&self) -> String {
        self.fips_column.clone().unwrap_or_else(|| "fips".to_string())
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoSettings {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    /// The feature property holding the key. The feature id is used if missing.
    #[serde(rename = "keyProperty")]
    pub key_property: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSettings {
    #[serde(rename = "lowBound")]
    pub low_bound: Option<f64>,
    #[serde(rename = "highBound")]
    pub high_bound: Option<f64>,
    #[serde(rename = "fillPolicy")]
    pub fill_policy: Option<String>,
    #[serde(rename = "duplicatePolicy")]
    pub duplicate_policy: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dpi: Option<u32>,
    pub fps: Option<u32>,
    #[serde(rename = "framesPerYear")]
    pub frames_per_year: Option<u32>,
    #[serde(rename = "endPauseFrames")]
    pub end_pause_frames: Option<u32>,
    pub bins: Option<usize>,
    #[serde(rename = "lowColor")]
    pub low_color: Option<String>,
    #[serde(rename = "highColor")]
    pub high_color: Option<String>,
    #[serde(rename = "noDataColor")]
    pub no_data_color: Option<String>,
    #[serde(rename = "staticYear")]
    pub static_year: Option<Year>,
    pub title: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "staticFileName")]
    pub static_file_name: Option<String>,
    #[serde(rename = "animatedFileName")]
    pub animated_file_name: Option<String>,
    #[serde(rename = "summaryFileName")]
    pub summary_file_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(rename = "inputSettings", default)]
    pub input_settings: InputSettings,
    #[serde(rename = "geoSettings", default)]
    pub geo_settings: GeoSettings,
    #[serde(default)]
    pub cleaning: CleaningSettings,
    #[serde(rename = "renderSettings", default)]
    pub render_settings: RenderSettings,
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
}

pub fn read_config(path: &str) -> MapResult<MapConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read config: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> MapResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn validate_rules(cleaning: &CleaningSettings) -> MapResult<PipelineRules> {
    let defaults = PipelineRules::DEFAULT_RULES;
    let bounds = ClipBounds::new(
        cleaning.low_bound.unwrap_or(defaults.bounds.low()),
        cleaning.high_bound.unwrap_or(defaults.bounds.high()),
    )
    .context(DataSnafu {})?;
    let res = PipelineRules {
        bounds,
        fill_policy: match cleaning.fill_policy.as_deref() {
            None | Some("missingKeys") => FillPolicy::MissingKeys,
            Some("missingPairs") => FillPolicy::MissingPairs,
            Some(x) => {
                whatever!("Cannot use fill policy {:?}: unknown policy", x)
            }
        },
        duplicate_policy: match cleaning.duplicate_policy.as_deref() {
            None | Some("keep") => DuplicatePolicy::Keep,
            Some("reject") => DuplicatePolicy::Reject,
            Some(x) => {
                whatever!("Cannot use duplicate policy {:?}: unknown policy", x)
            }
        },
    };
    Ok(res)
}

pub fn validate_render(rs: &RenderSettings) -> MapResult<RenderOptions> {
    let d = RenderOptions::default();
    let res = RenderOptions {
        width: rs.width.unwrap_or(d.width),
        height: rs.height.unwrap_or(d.height),
        dpi: rs.dpi.unwrap_or(d.dpi),
        fps: rs.fps.unwrap_or(d.fps),
        frames_per_year: rs.frames_per_year.unwrap_or(d.frames_per_year),
        end_pause_frames: rs.end_pause_frames.unwrap_or(d.end_pause_frames),
        bins: rs.bins.unwrap_or(d.bins),
        low_color: parse_color_setting(&rs.low_color, d.low_color)?,
        high_color: parse_color_setting(&rs.high_color, d.high_color)?,
        no_data_color: parse_color_setting(&rs.no_data_color, d.no_data_color)?,
        title: rs.title.clone().unwrap_or(d.title),
    };
    ensure!(
        res.width > 0 && res.height > 0 && res.dpi > 0,
        InvalidSettingSnafu {
            name: "width/height/dpi",
            value: format!("{}x{}@{}", res.width, res.height, res.dpi),
        }
    );
    ensure!(
        res.fps > 0 && res.frames_per_year > 0,
        InvalidSettingSnafu {
            name: "fps/framesPerYear",
            value: format!("{}/{}", res.fps, res.frames_per_year),
        }
    );
    ensure!(
        res.bins > 0,
        InvalidSettingSnafu {
            name: "bins",
            value: res.bins.to_string(),
        }
    );
    Ok(res)
}

fn parse_color_setting(x: &Option<String>, default: Rgb) -> MapResult<Rgb> {
    match x {
        None => Ok(default),
        Some(s) => Rgb::parse(s).context(InvalidSettingSnafu {
            name: "color",
            value: s.clone(),
        }),
    }
}
