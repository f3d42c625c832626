/*!
Reconciliation and display clipping of county-level subsidy tables.

The pipeline has three stages, each taking its input by reference and returning a new value:
1. duplicate detection ([`duplicate_pairs`]), governed by [`DuplicatePolicy`]
2. reconciliation against the universe of known counties ([`reconcile`])
3. clipping of the amounts into a display range ([`clip`])

[`run_pipeline`] chains them. The [`builder::Builder`] offers an incremental API on top of it.

See the [`manual`] for the input formats and the configuration of the `subsidymap` program.
*/

pub mod builder;
mod config;
pub mod manual;

use log::{debug, info, warn};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::iter::FromIterator;

pub use crate::config::*;

/// The authoritative set of geographic keys, usually supplied by the map reference.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GeoKeyUniverse {
    keys: BTreeSet<Fips>,
}

impl GeoKeyUniverse {
    pub fn new() -> GeoKeyUniverse {
        GeoKeyUniverse::default()
    }

    pub fn insert(&mut self, key: Fips) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &Fips) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The keys, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Fips> {
        self.keys.iter()
    }
}

impl FromIterator<Fips> for GeoKeyUniverse {
    fn from_iter<I: IntoIterator<Item = Fips>>(iter: I) -> Self {
        GeoKeyUniverse {
            keys: iter.into_iter().collect(),
        }
    }
}

/// The output of the reconciliation.
#[derive(PartialEq, Debug, Clone)]
pub struct Reconciled {
    /// The original records, unchanged and in order, followed by the synthesized ones.
    pub records: Vec<SubsidyRecord>,
    pub synthesized: usize,
}

/// The distinct years present in the records, in ascending order.
pub fn observed_years(records: &[SubsidyRecord]) -> Vec<Year> {
    let years: BTreeSet<Year> = records.iter().map(|r| r.year).collect();
    years.into_iter().collect()
}

/// The keys of the universe that are not present in any record.
pub fn missing_keys(records: &[SubsidyRecord], universe: &GeoKeyUniverse) -> Vec<Fips> {
    let present: HashSet<Fips> = records.iter().map(|r| r.fips).collect();
    universe
        .iter()
        .filter(|k| !present.contains(*k))
        .cloned()
        .collect()
}

/// The keys present in the records that the universe does not know about.
///
/// These are not an error: the renderer simply has no geometry for them.
pub fn unknown_keys(records: &[SubsidyRecord], universe: &GeoKeyUniverse) -> Vec<Fips> {
    let keys: BTreeSet<Fips> = records
        .iter()
        .map(|r| r.fips)
        .filter(|k| !universe.contains(k))
        .collect();
    keys.into_iter().collect()
}

/// Fills the gaps of the table with zero-valued records.
///
/// Under [`FillPolicy::MissingKeys`], every key of the universe absent from all the records
/// receives one zero record per observed year. [`FillPolicy::MissingPairs`] also fills the
/// years missing for keys that are otherwise present.
///
/// Synthesized records are appended in ascending (key, year) order. With no records,
/// no year is observed and nothing gets synthesized.
pub fn reconcile(
    records: &[SubsidyRecord],
    universe: &GeoKeyUniverse,
    fill: FillPolicy,
) -> Reconciled {
    let years = observed_years(records);
    let mut res: Vec<SubsidyRecord> = records.to_vec();

    match fill {
        FillPolicy::MissingKeys => {
            for key in missing_keys(records, universe) {
                for year in years.iter() {
                    res.push(SubsidyRecord::zero(key, *year));
                }
            }
        }
        FillPolicy::MissingPairs => {
            let present: HashSet<(Fips, Year)> =
                records.iter().map(|r| (r.fips, r.year)).collect();
            for key in universe.iter() {
                for year in years.iter() {
                    if !present.contains(&(*key, *year)) {
                        res.push(SubsidyRecord::zero(*key, *year));
                    }
                }
            }
        }
    }

    let synthesized = res.len() - records.len();
    debug!(
        "reconcile: {:?} records, {:?} years, {:?} synthesized",
        records.len(),
        years.len(),
        synthesized
    );
    Reconciled {
        records: res,
        synthesized,
    }
}

/// The (key, year) pairs that appear more than once, in ascending order.
pub fn duplicate_pairs(records: &[SubsidyRecord]) -> Vec<DuplicatePair> {
    let mut counts: HashMap<(Fips, Year), usize> = HashMap::new();
    for r in records.iter() {
        *counts.entry((r.fips, r.year)).or_insert(0) += 1;
    }
    let mut dups: Vec<DuplicatePair> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((fips, year), count)| DuplicatePair { fips, year, count })
        .collect();
    dups.sort_by_key(|d| (d.fips, d.year));
    dups
}

/// Clamps every amount into the display range.
pub fn clip(records: &[SubsidyRecord], bounds: &ClipBounds) -> Vec<DisplayRecord> {
    records
        .iter()
        .map(|r| {
            let (display_value, clamp) = bounds.clip_value(r.amount);
            DisplayRecord {
                record: *r,
                display_value,
                clamp,
            }
        })
        .collect()
}

pub fn clip_stats(records: &[DisplayRecord]) -> ClipStats {
    let mut stats = ClipStats {
        total: records.len(),
        ..ClipStats::default()
    };
    for r in records.iter() {
        match r.clamp {
            Clamp::Above => stats.above += 1,
            Clamp::Below => stats.below += 1,
            Clamp::Within => {}
        }
    }
    stats
}

/// Descriptive statistics over the amounts, used to choose the display bounds by hand.
#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// (quantile, value) pairs, nearest-rank.
    pub quantiles: Vec<(f64, f64)>,
}

impl Summary {
    pub const QUANTILES: [f64; 4] = [0.001, 0.5, 0.997, 0.999];

    /// Returns None if there are no values.
    pub fn of(amounts: &[f64]) -> Option<Summary> {
        if amounts.is_empty() {
            return None;
        }
        let mut sorted = amounts.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let quantiles = Summary::QUANTILES
            .iter()
            .map(|q| {
                let rank = (q * n as f64).ceil() as usize;
                (*q, sorted[rank.clamp(1, n) - 1])
            })
            .collect();
        Some(Summary {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            quantiles,
        })
    }
}

/// Runs the whole cleaning pipeline over the loaded records.
///
/// Arguments:
/// * `records` the records as loaded from the source
/// * `universe` the known geographic keys
/// * `rules` the clip bounds and the policies for gaps and duplicates
pub fn run_pipeline(
    records: &[SubsidyRecord],
    universe: &GeoKeyUniverse,
    rules: &PipelineRules,
) -> Result<CleanTable, DataErrors> {
    info!(
        "Processing {:?} records against {:?} known keys, rules: {:?}",
        records.len(),
        universe.len(),
        rules
    );

    let duplicates = duplicate_pairs(records);
    for d in duplicates.iter() {
        match rules.duplicate_policy {
            DuplicatePolicy::Keep => {
                warn!("{} records for key {} in {}", d.count, d.fips, d.year);
            }
            DuplicatePolicy::Reject => {
                return Err(DataErrors::DuplicateRecord {
                    fips: d.fips,
                    year: d.year,
                    count: d.count,
                });
            }
        }
    }

    let unknown = unknown_keys(records, universe);
    if !unknown.is_empty() {
        warn!(
            "{:?} keys are not in the reference and will not be drawn: {:?}",
            unknown.len(),
            unknown.iter().map(|k| k.to_string()).collect::<Vec<_>>()
        );
    }

    let missing = missing_keys(records, universe);
    info!("{:?} keys of the reference have no data", missing.len());

    let reconciled = reconcile(records, universe, rules.fill_policy);
    let clipped = clip(&reconciled.records, &rules.bounds);
    let stats = clip_stats(&clipped);
    info!(
        "Clipped to [{}, {}]: {:?} above ({:.2}%), {:?} below ({:.2}%)",
        rules.bounds.low(),
        rules.bounds.high(),
        stats.above,
        100.0 * stats.fraction_above(),
        stats.below,
        100.0 * stats.fraction_below()
    );

    Ok(CleanTable {
        records: clipped,
        years: observed_years(records),
        bounds: rules.bounds,
        report: CleanReport {
            loaded: records.len(),
            synthesized: reconciled.synthesized,
            missing_keys: missing,
            unknown_keys: unknown,
            duplicates,
            clip_stats: stats,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fips(s: &str) -> Fips {
        Fips::parse(s).unwrap()
    }

    fn rec(s: &str, year: Year, amount: f64) -> SubsidyRecord {
        SubsidyRecord::new(fips(s), year, amount).unwrap()
    }

    fn universe(keys: &[&str]) -> GeoKeyUniverse {
        keys.iter().map(|k| fips(k)).collect()
    }

    fn pairs(records: &[SubsidyRecord]) -> BTreeSet<(Fips, Year)> {
        records.iter().map(|r| (r.fips, r.year)).collect()
    }

    #[test]
    fn fips_parsing() {
        assert_eq!(fips("06083").to_string(), "06083");
        assert_eq!(fips("6083"), fips("06083"));
        assert_eq!(fips(" 6083.0 "), fips("06083"));
        assert_eq!(fips("06083").code(), 6083);
        assert_eq!(Fips::new(6083).unwrap(), fips("06083"));
        assert!(Fips::new(100_000).is_err());
        assert_eq!(fips("19153").region(), 19);
        assert_eq!(fips("19153").subregion(), 153);
        assert!(Fips::parse("123456").is_err());
        assert!(Fips::parse("6083.5").is_err());
        assert!(Fips::parse("").is_err());
        assert!(Fips::parse("abc").is_err());
    }

    #[test]
    fn non_finite_amount() {
        assert!(SubsidyRecord::new(fips("06083"), 2019, f64::NAN).is_err());
        assert!(SubsidyRecord::new(fips("06083"), 2019, f64::INFINITY).is_err());
    }

    #[test]
    fn reconcile_missing_county() {
        let _ = env_logger::try_init();
        let records = vec![rec("06083", 2018, 10.0), rec("06083", 2019, 20.0)];
        let u = universe(&["06083", "06085"]);
        let r = reconcile(&records, &u, FillPolicy::MissingKeys);
        assert_eq!(r.synthesized, 2);
        assert_eq!(&r.records[..2], &records[..]);
        assert_eq!(
            &r.records[2..],
            &[rec("06085", 2018, 0.0), rec("06085", 2019, 0.0)]
        );
    }

    #[test]
    fn reconcile_nothing_missing() {
        let records = vec![rec("06083", 2018, 10.0), rec("06085", 2018, 3.0)];
        let u = universe(&["06083", "06085"]);
        let r = reconcile(&records, &u, FillPolicy::MissingKeys);
        assert_eq!(r.synthesized, 0);
        assert_eq!(r.records, records);
    }

    #[test]
    fn reconcile_empty_input() {
        let u = universe(&["06083", "06085"]);
        let r = reconcile(&[], &u, FillPolicy::MissingPairs);
        assert!(r.records.is_empty());
    }

    #[test]
    fn reconcile_is_complete() {
        let records = vec![
            rec("06083", 2010, 1.0),
            rec("06083", 2011, 2.0),
            rec("19153", 2010, 5.0),
            rec("19153", 2011, 6.0),
        ];
        let u = universe(&["06083", "06085", "19153", "48201"]);
        let r = reconcile(&records, &u, FillPolicy::MissingKeys);
        let expected: BTreeSet<(Fips, Year)> = u
            .iter()
            .flat_map(|k| [2010, 2011].into_iter().map(move |y| (*k, y)))
            .collect();
        assert_eq!(pairs(&r.records), expected);
        assert_eq!(r.records.len(), expected.len());
    }

    #[test]
    fn reconcile_keys_leaves_partial_years() {
        // 06085 is present for 2010 only: it is not a missing key.
        let records = vec![
            rec("06083", 2010, 1.0),
            rec("06083", 2011, 2.0),
            rec("06085", 2010, 4.0),
        ];
        let u = universe(&["06083", "06085"]);
        let r = reconcile(&records, &u, FillPolicy::MissingKeys);
        assert_eq!(r.synthesized, 0);

        let r2 = reconcile(&records, &u, FillPolicy::MissingPairs);
        assert_eq!(r2.synthesized, 1);
        assert_eq!(r2.records.last(), Some(&rec("06085", 2011, 0.0)));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let records = vec![rec("06083", 2018, 10.0), rec("06085", 2019, 20.0)];
        let u = universe(&["06083", "06085", "06087"]);
        for fill in [FillPolicy::MissingKeys, FillPolicy::MissingPairs] {
            let once = reconcile(&records, &u, fill);
            let twice = reconcile(&once.records, &u, fill);
            assert_eq!(twice.synthesized, 0);
            assert_eq!(twice.records, once.records);
        }
    }

    #[test]
    fn universe_insert() {
        let mut u = GeoKeyUniverse::new();
        assert!(u.is_empty());
        assert!(u.insert(fips("19153")));
        assert!(u.insert(fips("06083")));
        assert!(!u.insert(fips("6083")));
        assert_eq!(u.len(), 2);
        assert!(u.contains(&fips("06083")));
        let keys: Vec<String> = u.iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["06083", "19153"]);
    }

    #[test]
    fn builder_records() {
        let mut b = builder::Builder::new(&PipelineRules::DEFAULT_RULES)
            .unwrap()
            .universe(&["06083".to_string(), "06085".to_string()])
            .unwrap();
        assert_eq!(b.num_records(), 0);
        b.add_record_simple("6083", 2018, 1.0).unwrap();
        b.add_record(&rec("06085", 2018, 2.0)).unwrap();
        assert_eq!(b.num_records(), 2);
        assert!(b.add_record_simple("6083", 2019, f64::NAN).is_err());
        assert!(b.add_record_simple("abc", 2019, 1.0).is_err());
        assert_eq!(b.num_records(), 2);
        let table = b.run().unwrap();
        assert_eq!(table.report.synthesized, 0);
    }

    #[test]
    fn unknown_keys_are_reported() {
        let records = vec![rec("06083", 2018, 10.0), rec("99999", 2018, 1.0)];
        let u = universe(&["06083"]);
        assert_eq!(unknown_keys(&records, &u), vec![fips("99999")]);
        assert!(missing_keys(&records, &u).is_empty());
    }

    #[test]
    fn clip_scenarios() {
        let b = ClipBounds::new(0.0, 50_000_000.0).unwrap();
        assert_eq!(b.clip_value(94_000_000.0), (50_000_000.0, Clamp::Above));
        assert_eq!(b.clip_value(-500.0), (0.0, Clamp::Below));
        assert_eq!(b.clip_value(25_000_000.0), (25_000_000.0, Clamp::Within));
        assert_eq!(b.clip_value(50_000_000.0), (50_000_000.0, Clamp::Within));
    }

    #[test]
    fn clip_in_bounds_and_monotonic() {
        let b = ClipBounds::new(-10.0, 100.0).unwrap();
        let amounts = [-1e9, -10.5, -10.0, -3.0, 0.0, 42.0, 99.9, 100.0, 100.1, 7e12];
        let records: Vec<SubsidyRecord> = amounts
            .iter()
            .map(|a| rec("06083", 2019, *a))
            .collect();
        let clipped = clip(&records, &b);
        for d in clipped.iter() {
            assert!(d.display_value >= b.low() && d.display_value <= b.high());
        }
        for w in clipped.windows(2) {
            assert!(w[0].display_value <= w[1].display_value);
        }
        let stats = clip_stats(&clipped);
        assert_eq!(stats.below, 2);
        assert_eq!(stats.above, 2);
        assert_eq!(stats.total, 10);
    }

    #[test]
    fn invalid_bounds() {
        assert!(ClipBounds::new(10.0, 0.0).is_err());
        assert!(ClipBounds::new(f64::NAN, 0.0).is_err());
        assert!(ClipBounds::new(5.0, 5.0).is_ok());
    }

    #[test]
    fn duplicates() {
        let records = vec![
            rec("06083", 2018, 10.0),
            rec("06083", 2018, 11.0),
            rec("06085", 2018, 1.0),
        ];
        assert_eq!(
            duplicate_pairs(&records),
            vec![DuplicatePair {
                fips: fips("06083"),
                year: 2018,
                count: 2
            }]
        );

        let u = universe(&["06083", "06085"]);
        let keep = run_pipeline(&records, &u, &PipelineRules::DEFAULT_RULES).unwrap();
        assert_eq!(keep.records.len(), 3);
        assert_eq!(keep.report.duplicates.len(), 1);

        let rules = PipelineRules {
            duplicate_policy: DuplicatePolicy::Reject,
            ..PipelineRules::DEFAULT_RULES
        };
        assert_eq!(
            run_pipeline(&records, &u, &rules),
            Err(DataErrors::DuplicateRecord {
                fips: fips("06083"),
                year: 2018,
                count: 2
            })
        );
    }

    #[test]
    fn pipeline_end_to_end() {
        let _ = env_logger::try_init();
        let records = vec![
            rec("06083", 2018, 94_000_000.0),
            rec("06083", 2019, -500.0),
        ];
        let u = universe(&["06083", "06085"]);
        let table = run_pipeline(&records, &u, &PipelineRules::DEFAULT_RULES).unwrap();
        assert_eq!(table.years, vec![2018, 2019]);
        assert_eq!(table.report.loaded, 2);
        assert_eq!(table.report.synthesized, 2);
        assert_eq!(table.report.missing_keys, vec![fips("06085")]);
        let values: Vec<f64> = table.records.iter().map(|d| d.display_value).collect();
        assert_eq!(values, vec![50_000_000.0, 0.0, 0.0, 0.0]);
        // The stored amounts keep their meaning.
        assert_eq!(table.records[0].record.amount, 94_000_000.0);
        assert_eq!(table.report.clip_stats.above, 1);
        assert_eq!(table.report.clip_stats.below, 1);
    }

    #[test]
    fn summary() {
        assert_eq!(Summary::of(&[]), None);
        let values: Vec<f64> = (1..=1000).map(|x| x as f64).collect();
        let s = Summary::of(&values).unwrap();
        assert_eq!(s.count, 1000);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 1000.0);
        assert_eq!(s.mean, 500.5);
        assert_eq!(
            s.quantiles,
            vec![(0.001, 1.0), (0.5, 500.0), (0.997, 997.0), (0.999, 999.0)]
        );
    }
}
