use clap::Parser;

/// Draws county-level subsidy totals as a static and an animated choropleth map.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the run. Relative paths inside of it are
    /// resolved against the directory of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of a run in JSON format. If provided,
    /// subsidymap will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory) Where the maps and the summary are written. Setting this option overrides the
    /// directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out_dir: Option<String>,

    /// (file path) The table of subsidies, with the year, total_subs_adj and fips columns.
    /// Setting this option overrides the file that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path) The county boundaries, as a GeoJSON feature collection. The features define
    /// the set of known counties.
    #[clap(short, long, value_parser)]
    pub geo: Option<String>,

    /// (default: last year of the data) The year drawn on the static map.
    #[clap(long, value_parser)]
    pub year: Option<i32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
