pub use crate::config::*;

use std::collections::BTreeMap;

/// A builder for constituency records.
///
/// Readers use it to assemble a record field by field, tests use it to write
/// small datasets by hand.
///
/// ```
/// use seat_allocation::builder::ConstituencyBuilder;
/// use seat_allocation::{ResultStore, ApportionmentError};
///
/// let almeria = ConstituencyBuilder::new("04")
///     .name("Almería")
///     .seats(12)
///     .census(480_000)
///     .blank(2_000)
///     .null(3_000)
///     .party("PP", 90_000)
///     .party("PSOE-A", 80_000)
///     .record();
///
/// let store = ResultStore::load(vec![almeria])?;
/// assert_eq!(store.get("04").map(|c| c.abstention()), Some(480_000 - 175_000));
///
/// # Ok::<(), ApportionmentError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyBuilder {
    pub(crate) _record: ConstituencyRecord,
}

impl ConstituencyBuilder {
    pub fn new(id: &str) -> ConstituencyBuilder {
        ConstituencyBuilder {
            _record: ConstituencyRecord {
                id: Some(id.to_string()),
                ..ConstituencyRecord::default()
            },
        }
    }

    pub fn name(mut self, name: &str) -> ConstituencyBuilder {
        self._record.name = Some(name.to_string());
        self
    }

    pub fn seats(mut self, seats: i64) -> ConstituencyBuilder {
        self._record.seats = Some(seats);
        self
    }

    pub fn census(mut self, census: u64) -> ConstituencyBuilder {
        self._record.census = Some(census);
        self
    }

    pub fn valid(mut self, valid_votes: u64) -> ConstituencyBuilder {
        self._record.valid_votes = Some(valid_votes);
        self
    }

    pub fn blank(mut self, blank_votes: u64) -> ConstituencyBuilder {
        self._record.blank_votes = Some(blank_votes);
        self
    }

    pub fn null(mut self, null_votes: u64) -> ConstituencyBuilder {
        self._record.null_votes = Some(null_votes);
        self
    }

    pub fn total(mut self, total_votes: u64) -> ConstituencyBuilder {
        self._record.total_votes = Some(total_votes);
        self
    }

    pub fn abstention(mut self, abstention: i64) -> ConstituencyBuilder {
        self._record.abstention = Some(abstention);
        self
    }

    pub fn party(mut self, label: &str, votes: u64) -> ConstituencyBuilder {
        self.add_party_votes(label, votes);
        self
    }

    /// Adds votes to a party, creating it if needed.
    ///
    /// Readers that aggregate several rows per constituency call this once per row.
    pub fn add_party_votes(&mut self, label: &str, votes: u64) {
        let parties = self._record.parties.get_or_insert_with(BTreeMap::new);
        *parties.entry(label.to_string()).or_insert(0) += votes;
    }

    pub fn record(&self) -> ConstituencyRecord {
        self._record.clone()
    }

    /// Validates this record on its own, with the same rules as the result store.
    pub fn build(self) -> Result<Constituency, ApportionmentError> {
        crate::store::validate_record(0, self._record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_party_votes() {
        let mut b = ConstituencyBuilder::new("41").seats(18).census(1000).blank(0).null(0);
        b.add_party_votes("PSOE-A", 100);
        b.add_party_votes("PSOE-A", 50);
        b.add_party_votes("Cs", 20);
        let c = b.build().unwrap();
        assert_eq!(c.parties.get("PSOE-A"), Some(&150));
        assert_eq!(c.parties.get("Cs"), Some(&20));
        assert_eq!(c.seats, 18);
    }

    #[test]
    fn build_reports_missing_fields() {
        let res = ConstituencyBuilder::new("41").seats(18).party("A", 1).build();
        assert!(matches!(
            res,
            Err(ApportionmentError::Format {
                field: "census",
                ..
            })
        ));
    }
}
