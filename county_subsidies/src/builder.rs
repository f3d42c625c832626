pub use crate::config::*;
use crate::{run_pipeline, GeoKeyUniverse};

/// A builder for assembling a subsidy table and its reference keys.
///
/// The readers of the `subsidymap` program feed it row by row.
///
/// ```
/// pub use county_subsidies::builder::Builder;
/// pub use county_subsidies::PipelineRules;
/// # use county_subsidies::DataErrors;
///
/// let mut builder = Builder::new(&PipelineRules::DEFAULT_RULES)?
///     .universe(&["06083".to_string(), "06085".to_string()])?;
///
/// builder.add_record_simple("06083", 2019, 94_000_000.0)?;
///
/// let table = builder.run()?;
/// assert_eq!(table.records.len(), 2);
/// assert_eq!(table.records[0].display_value, 50_000_000.0);
///
/// # Ok::<(), DataErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: PipelineRules,
    pub(crate) _universe: GeoKeyUniverse,
    pub(crate) _records: Vec<SubsidyRecord>,
}

impl Builder {
    pub fn new(rules: &PipelineRules) -> Result<Builder, DataErrors> {
        ClipBounds::new(rules.bounds.low(), rules.bounds.high())?;
        Ok(Builder {
            _rules: *rules,
            _universe: GeoKeyUniverse::new(),
            _records: Vec::new(),
        })
    }

    /// Sets the known geographic keys, replacing any previous ones.
    pub fn universe(self, keys: &[String]) -> Result<Builder, DataErrors> {
        let universe = keys
            .iter()
            .map(|k| Fips::parse(k))
            .collect::<Result<GeoKeyUniverse, DataErrors>>()?;
        Ok(self.universe_keys(universe))
    }

    pub fn universe_keys(self, universe: GeoKeyUniverse) -> Builder {
        Builder {
            _rules: self._rules,
            _universe: universe,
            _records: self._records,
        }
    }

    /// Adds a record with the key as written in the source.
    pub fn add_record_simple(
        &mut self,
        fips: &str,
        year: Year,
        amount: f64,
    ) -> Result<(), DataErrors> {
        let f = Fips::parse(fips)?;
        self.add_record(&SubsidyRecord::new(f, year, amount)?)
    }

    pub fn add_record(&mut self, record: &SubsidyRecord) -> Result<(), DataErrors> {
        self._records.push(*record);
        Ok(())
    }

    pub fn num_records(&self) -> usize {
        self._records.len()
    }

    /// Runs the cleaning pipeline over everything added so far.
    pub fn run(&self) -> Result<CleanTable, DataErrors> {
        run_pipeline(&self._records, &self._universe, &self._rules)
    }
}
