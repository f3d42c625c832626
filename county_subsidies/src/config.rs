// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A calendar year, as found in the input table.
pub type Year = i32;

/// A county-equivalent geographic key (FIPS code).
///
/// The code has 5 digits: a 2-digit region (state) followed by a 3-digit
/// subregion (county). It is always displayed zero-padded.
///
/// ```
/// use county_subsidies::Fips;
///
/// let f = Fips::parse("6083")?;
/// assert_eq!(f.to_string(), "06083");
/// assert_eq!(f.region(), 6);
/// assert_eq!(f.subregion(), 83);
/// # Ok::<(), county_subsidies::DataErrors>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Fips(u32);

impl Fips {
    pub const MAX: u32 = 99_999;

    pub fn new(code: u32) -> Result<Fips, DataErrors> {
        if code > Fips::MAX {
            return Err(DataErrors::InvalidFips(code.to_string()));
        }
        Ok(Fips(code))
    }

    /// Parses a key as written by spreadsheets and dataframe exports.
    ///
    /// Accepts "06083", "6083" (leading zero dropped) and "6083.0"
    /// (integral float notation).
    pub fn parse(s: &str) -> Result<Fips, DataErrors> {
        let t = s.trim();
        let invalid = || DataErrors::InvalidFips(s.to_string());
        if t.is_empty() {
            return Err(invalid());
        }
        if t.bytes().all(|b| b.is_ascii_digit()) {
            let code = t.parse::<u32>().map_err(|_| invalid())?;
            return Fips::new(code).map_err(|_| invalid());
        }
        match t.parse::<f64>() {
            Ok(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x <= Fips::MAX as f64 => {
                Ok(Fips(x as u32))
            }
            _ => Err(invalid()),
        }
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// The 2-digit region (state) part.
    pub fn region(&self) -> u32 {
        self.0 / 1000
    }

    /// The 3-digit subregion (county) part.
    pub fn subregion(&self) -> u32 {
        self.0 % 1000
    }
}

impl Display for Fips {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

/// One row of the subsidy table.
///
/// The amount is expressed in 2019-normalized currency units and is always finite.
/// It may be negative.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SubsidyRecord {
    pub fips: Fips,
    pub year: Year,
    pub amount: f64,
}

impl SubsidyRecord {
    pub fn new(fips: Fips, year: Year, amount: f64) -> Result<SubsidyRecord, DataErrors> {
        if !amount.is_finite() {
            return Err(DataErrors::NonFiniteAmount { fips, year });
        }
        Ok(SubsidyRecord { fips, year, amount })
    }

    /// A placeholder for a (key, year) pair absent from the source.
    pub fn zero(fips: Fips, year: Year) -> SubsidyRecord {
        SubsidyRecord {
            fips,
            year,
            amount: 0.0,
        }
    }
}

// ******** Output data structures *********

/// Which side of the display range a value was clamped to, if any.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Clamp {
    Below,
    Within,
    Above,
}

/// A record with the value used for display.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct DisplayRecord {
    pub record: SubsidyRecord,
    pub display_value: f64,
    pub clamp: Clamp,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DuplicatePair {
    pub fips: Fips,
    pub year: Year,
    pub count: usize,
}

/// Counts of the values that were clamped during clipping.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ClipStats {
    pub total: usize,
    pub above: usize,
    pub below: usize,
}

impl ClipStats {
    pub fn fraction_above(&self) -> f64 {
        fraction(self.above, self.total)
    }

    pub fn fraction_below(&self) -> f64 {
        fraction(self.below, self.total)
    }
}

fn fraction(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64
    }
}

/// What happened while cleaning the table.
#[derive(PartialEq, Debug, Clone)]
pub struct CleanReport {
    pub loaded: usize,
    pub synthesized: usize,
    pub missing_keys: Vec<Fips>,
    pub unknown_keys: Vec<Fips>,
    pub duplicates: Vec<DuplicatePair>,
    pub clip_stats: ClipStats,
}

/// The output of the pipeline, ready for rendering.
#[derive(PartialEq, Debug, Clone)]
pub struct CleanTable {
    pub records: Vec<DisplayRecord>,
    /// The distinct years of the loaded data, in ascending order.
    pub years: Vec<Year>,
    pub bounds: ClipBounds,
    pub report: CleanReport,
}

/// Errors that prevent the pipeline from completing successfully.
#[derive(PartialEq, Debug, Clone)]
pub enum DataErrors {
    InvalidFips(String),
    NonFiniteAmount { fips: Fips, year: Year },
    InvalidBounds { low: f64, high: f64 },
    DuplicateRecord { fips: Fips, year: Year, count: usize },
}

impl Error for DataErrors {}

impl Display for DataErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataErrors::InvalidFips(s) => write!(f, "invalid FIPS code {:?}", s),
            DataErrors::NonFiniteAmount { fips, year } => {
                write!(f, "non-finite amount for {} in {}", fips, year)
            }
            DataErrors::InvalidBounds { low, high } => {
                write!(f, "invalid clip bounds [{}, {}]", low, high)
            }
            DataErrors::DuplicateRecord { fips, year, count } => {
                write!(f, "{} records for {} in {}", count, fips, year)
            }
        }
    }
}

// ********* Configuration **********

/// The display range. Values outside of it are clamped to the nearest bound.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ClipBounds {
    low: f64,
    high: f64,
}

impl ClipBounds {
    pub const DEFAULT: ClipBounds = ClipBounds {
        low: 0.0,
        high: 50_000_000.0,
    };

    pub fn new(low: f64, high: f64) -> Result<ClipBounds, DataErrors> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(DataErrors::InvalidBounds { low, high });
        }
        Ok(ClipBounds { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn clip_value(&self, amount: f64) -> (f64, Clamp) {
        if amount > self.high {
            (self.high, Clamp::Above)
        } else if amount < self.low {
            (self.low, Clamp::Below)
        } else {
            (amount, Clamp::Within)
        }
    }
}

/// Which gaps the reconciliation fills.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FillPolicy {
    /// Only keys of the universe that never appear in the data get zero records,
    /// one per observed year. A key present for some years only is left as is.
    MissingKeys,
    /// Every (key, year) pair of the universe crossed with the observed years
    /// that is absent gets a zero record.
    MissingPairs,
}

/// What to do with repeated (key, year) pairs in the input.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DuplicatePolicy {
    /// Keep all the rows and report the pairs.
    Keep,
    /// Fail on the first repeated pair.
    Reject,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PipelineRules {
    pub bounds: ClipBounds,
    pub fill_policy: FillPolicy,
    pub duplicate_policy: DuplicatePolicy,
}

impl PipelineRules {
    pub const DEFAULT_RULES: PipelineRules = PipelineRules {
        bounds: ClipBounds::DEFAULT,
        fill_policy: FillPolicy::MissingKeys,
        duplicate_policy: DuplicatePolicy::Keep,
    };
}
