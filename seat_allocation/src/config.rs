// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// A constituency as handed over by a data source, before any validation.
///
/// All the fields are optional so that every reader can fill in what its
/// format provides. The result store decides which fields are required and
/// derives the missing counts.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ConstituencyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub seats: Option<i64>,
    pub census: Option<u64>,
    pub valid_votes: Option<u64>,
    pub blank_votes: Option<u64>,
    pub null_votes: Option<u64>,
    pub total_votes: Option<u64>,
    pub abstention: Option<i64>,
    pub parties: Option<BTreeMap<String, u64>>,
}

/// One electoral district, with all its counts checked.
///
/// Blank votes are a sub-count of the valid votes, so that
/// `total_votes = valid_votes + null_votes`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Constituency {
    pub id: String,
    pub name: Option<String>,
    pub seats: u32,
    pub census: u64,
    pub valid_votes: u64,
    pub blank_votes: u64,
    pub null_votes: u64,
    pub total_votes: u64,
    /// Votes per party label. Labels are exact, case-sensitive keys.
    pub parties: BTreeMap<String, u64>,
}

impl Constituency {
    /// Registered electors who did not vote.
    pub fn abstention(&self) -> u64 {
        self.census.saturating_sub(self.total_votes)
    }

    /// The sum of the votes of all the parties.
    pub fn party_votes(&self) -> u64 {
        self.parties.values().sum()
    }
}

// ******** Output data structures *********

/// The seats awarded in one constituency.
///
/// Every party that had votes has an entry, possibly zero. Parties without
/// an entry did not get any seat.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SeatAllocation {
    pub seats: BTreeMap<String, u32>,
}

impl SeatAllocation {
    pub fn get(&self, label: &str) -> u32 {
        self.seats.get(label).cloned().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.seats.values().sum()
    }

    /// True when no seat was awarded.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The parties with at least one seat, in label order.
    pub fn awarded(&self) -> impl Iterator<Item = (&String, u32)> {
        self.seats
            .iter()
            .filter_map(|(label, s)| if *s > 0 { Some((label, *s)) } else { None })
    }
}

/// Seats won in one constituency, sorted by label in descending order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyDetail {
    pub id: String,
    pub name: Option<String>,
    pub seats: Vec<(String, u32)>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SeatsReport {
    /// National totals, by decreasing number of seats.
    pub totals: Vec<(String, u32)>,
    /// Only filled when requested with `SeatsOptions::detail`.
    pub detail: Vec<ConstituencyDetail>,
}

impl SeatsReport {
    pub fn total_seats(&self) -> u32 {
        self.totals.iter().map(|(_, s)| *s).sum()
    }

    pub fn seats_of(&self, label: &str) -> u32 {
        self.totals
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| *s)
            .unwrap_or(0)
    }
}

/// Errors raised while loading the results or preparing a scenario.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ApportionmentError {
    /// A record misses a required field or holds a value that makes no sense.
    /// `record` is the position of the record in the source, starting at 0.
    Format {
        record: usize,
        field: &'static str,
        reason: String,
    },
    /// Two records share the same constituency identifier.
    DuplicateKey { id: String },
    /// The scenario parameters are out of range.
    InvalidScenario { reason: String },
}

impl Error for ApportionmentError {}

impl Display for ApportionmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApportionmentError::Format {
                record,
                field,
                reason,
            } => write!(f, "record {}: field '{}': {}", record, field, reason),
            ApportionmentError::DuplicateKey { id } => {
                write!(f, "constituency '{}' appears more than once", id)
            }
            ApportionmentError::InvalidScenario { reason } => {
                write!(f, "invalid scenario: {}", reason)
            }
        }
    }
}

// ********* Configuration **********

/// The minimum share of the votes a party needs to get any seat.
///
/// The fraction is kept exactly as given. The exclusion test compares it
/// with `votes / base` without any rounding.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Threshold {
    // Bits of a non-negative f64 in [0, 1]. For these values the order of
    // the bits is the order of the fractions.
    bits: u64,
}

impl Threshold {
    /// 3% of the votes.
    pub const DEFAULT: Threshold = Threshold {
        bits: 0x3F9E_B851_EB85_1EB8,
    };

    pub const NONE: Threshold = Threshold { bits: 0 };

    /// Builds a threshold from a fraction in `[0, 1]`.
    pub fn new(fraction: f64) -> Result<Threshold, ApportionmentError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(ApportionmentError::InvalidScenario {
                reason: format!("threshold {} is not within [0, 1]", fraction),
            });
        }
        if fraction == 0.0 {
            // -0.0 as well.
            return Ok(Threshold::NONE);
        }
        Ok(Threshold {
            bits: fraction.to_bits(),
        })
    }

    /// Builds a threshold from a percentage in `[0, 100]`.
    pub fn from_percent(percent: f64) -> Result<Threshold, ApportionmentError> {
        Threshold::new(percent / 100.0)
    }

    pub fn as_fraction(&self) -> f64 {
        f64::from_bits(self.bits)
    }

    /// The fraction as `mantissa / 2^shift`, with an odd mantissa.
    fn dyadic(&self) -> (u64, u32) {
        let exponent = ((self.bits >> 52) & 0x7ff) as u32;
        let fraction = self.bits & ((1u64 << 52) - 1);
        let (mantissa, shift) = if exponent == 0 {
            (fraction, 1074)
        } else {
            (fraction | (1u64 << 52), 1075 - exponent)
        };
        if mantissa == 0 {
            return (0, 0);
        }
        let tz = mantissa.trailing_zeros().min(shift);
        (mantissa >> tz, shift - tz)
    }

    /// True if `votes / base` falls below the threshold.
    pub fn excludes(&self, votes: u64, base: u64) -> bool {
        // votes / base < mantissa / 2^shift
        //   <=> votes * 2^shift < mantissa * base
        let (mantissa, shift) = self.dyadic();
        // Below 2^117.
        let rhs = (mantissa as u128) * (base as u128);
        let votes = votes as u128;
        if votes == 0 {
            return rhs > 0;
        }
        if shift >= votes.leading_zeros() {
            // The left side is at least 2^127.
            return false;
        }
        (votes << shift) < rhs
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::DEFAULT
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The shortest decimal form of the fraction, with the point moved two
        // places to the right. f64 never prints an exponent here.
        let text = self.as_fraction().to_string();
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
        let frac_part = format!("{:0<2}", frac_part);
        let (moved, rest) = frac_part.split_at(2);
        let whole = format!("{}{}", int_part, moved);
        let whole = match whole.trim_start_matches('0') {
            "" => "0",
            w => w,
        };
        let rest = rest.trim_end_matches('0');
        if rest.is_empty() {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{}%", whole, rest)
        }
    }
}

/// A coalition: the votes of all the secondary labels go to the primary one.
///
/// A single label is a valid spec with no secondaries. It is still useful as
/// the first spec of a join, to receive the blank, null or abstention votes.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct MergeSpec {
    pub primary: String,
    pub secondaries: Vec<String>,
}

impl MergeSpec {
    pub fn new(primary: &str, secondaries: &[&str]) -> MergeSpec {
        MergeSpec {
            primary: primary.to_string(),
            secondaries: secondaries.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Builds a spec from an ordered list of labels, the first one being the
    /// primary. Returns `None` for an empty list.
    pub fn from_labels(labels: &[String]) -> Option<MergeSpec> {
        let (primary, secondaries) = labels.split_first()?;
        Some(MergeSpec {
            primary: primary.clone(),
            secondaries: secondaries.to_vec(),
        })
    }
}

impl From<&str> for MergeSpec {
    fn from(label: &str) -> Self {
        MergeSpec::new(label, &[])
    }
}

impl From<String> for MergeSpec {
    fn from(label: String) -> Self {
        MergeSpec {
            primary: label,
            secondaries: Vec::new(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for MergeSpec {
    fn from(labels: [&str; N]) -> Self {
        match labels.split_first() {
            Some((primary, secondaries)) => MergeSpec::new(primary, secondaries),
            None => MergeSpec::new("", &[]),
        }
    }
}

/// Extra votes handed to the primary party of the first merge spec.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct JoinOptions {
    /// Add the blank votes.
    pub blank_votes: bool,
    /// Add the null votes.
    pub null_votes: bool,
    /// Add this fraction of the abstention, rounded down. Zero disables it.
    pub abstention: f64,
}

impl JoinOptions {
    pub const NONE: JoinOptions = JoinOptions {
        blank_votes: false,
        null_votes: false,
        abstention: 0.0,
    };

    pub(crate) fn check(&self) -> Result<(), ApportionmentError> {
        check_fraction("abstention", self.abstention)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct SeatsOptions {
    /// Also report the seats won in every constituency.
    pub detail: bool,
}

pub(crate) fn check_fraction(what: &str, fraction: f64) -> Result<(), ApportionmentError> {
    if fraction.is_finite() && (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(ApportionmentError::InvalidScenario {
            reason: format!("{} fraction {} is not within [0, 1]", what, fraction),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_range() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(matches!(
            Threshold::new(1.01),
            Err(ApportionmentError::InvalidScenario { .. })
        ));
        assert!(Threshold::new(-0.5).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::from_percent(3.0), Ok(Threshold::DEFAULT));
    }

    #[test]
    fn threshold_display() {
        assert_eq!(Threshold::DEFAULT.to_string(), "3%");
        assert_eq!(Threshold::new(0.025).unwrap().to_string(), "2.5%");
        assert_eq!(Threshold::NONE.to_string(), "0%");
        assert_eq!(Threshold::new(1.0).unwrap().to_string(), "100%");
        assert_eq!(Threshold::new(0.07).unwrap().to_string(), "7%");
        assert_eq!(Threshold::new(0.0000004).unwrap().to_string(), "0.00004%");
        assert_eq!(
            Threshold::new(1.0 / 3.0).unwrap().to_string(),
            "33.33333333333333%"
        );
    }

    #[test]
    fn threshold_exclusion() {
        let t = Threshold::DEFAULT;
        assert!(t.excludes(50, 1970));
        assert!(!t.excludes(60, 1970));
        assert!(!t.excludes(30, 1000));
        assert!(t.excludes(29, 1000));
        // Nothing is below a share of an empty base.
        assert!(!t.excludes(0, 0));
    }

    #[test]
    fn threshold_is_not_rounded() {
        let third = Threshold::new(1.0 / 3.0).unwrap();
        assert!(third.excludes(333_333, 1_000_000));
        assert!(!third.excludes(333_334, 1_000_000));
        assert!(!third.excludes(1_000_000, 1_000_000));

        assert!(Threshold::new(0.0300004).unwrap().excludes(30_000, 1_000_000));

        let tiny = Threshold::new(0.0000004).unwrap();
        assert_ne!(tiny, Threshold::NONE);
        assert!(tiny.excludes(3, 10_000_000));
        assert!(!tiny.excludes(5, 10_000_000));
        assert!(tiny.excludes(1, u64::MAX / 4));
        assert!(Threshold::new(f64::MIN_POSITIVE).unwrap().excludes(0, 1));
        assert!(!Threshold::new(f64::MIN_POSITIVE).unwrap().excludes(1, u64::MAX));

        assert_eq!(Threshold::DEFAULT.as_fraction(), 0.03);
        assert_eq!(Threshold::new(-0.0), Ok(Threshold::NONE));
        assert!(Threshold::new(0.05).unwrap() > Threshold::DEFAULT);
        assert_eq!(Threshold::new(1.0).unwrap().as_fraction(), 1.0);
        assert!(Threshold::new(1.0).unwrap().excludes(999, 1000));
        assert!(!Threshold::new(1.0).unwrap().excludes(1000, 1000));
    }

    #[test]
    fn merge_specs() {
        let s = MergeSpec::from(["PSOE-A", "ADELANTE ANDALUCIA", "EB"]);
        assert_eq!(s.primary, "PSOE-A");
        assert_eq!(s.secondaries, vec!["ADELANTE ANDALUCIA", "EB"]);
        assert_eq!(MergeSpec::from("VOX").secondaries.len(), 0);
        assert_eq!(MergeSpec::from_labels(&[]), None);
        assert_eq!(
            MergeSpec::from_labels(&["A".to_string(), "B".to_string()]),
            Some(MergeSpec::new("A", &["B"]))
        );
    }

    #[test]
    fn allocation_queries() {
        let mut a = SeatAllocation::default();
        a.seats.insert("A".to_string(), 2);
        a.seats.insert("B".to_string(), 0);
        assert_eq!(a.get("A"), 2);
        assert_eq!(a.get("B"), 0);
        assert_eq!(a.get("C"), 0);
        assert_eq!(a.total(), 2);
        assert_eq!(a.awarded().count(), 1);
    }
}
