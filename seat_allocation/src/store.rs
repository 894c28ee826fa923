use log::{debug, info, warn};

use std::collections::{BTreeSet, HashSet};

use crate::config::*;

/// The results as loaded from a source. They are never modified after loading.
///
/// Scenarios work on a [`crate::Session`], which holds its own copy.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResultStore {
    constituencies: Vec<Constituency>,
}

impl ResultStore {
    /// Validates the records, in order.
    ///
    /// Fails on the first record that misses a required field
    /// (`id`, `seats`, `census`, `blank_votes`, `null_votes`, `parties`) or
    /// whose counts are inconsistent, and on duplicated identifiers.
    pub fn load<I>(records: I) -> Result<ResultStore, ApportionmentError>
    where
        I: IntoIterator<Item = ConstituencyRecord>,
    {
        let mut constituencies: Vec<Constituency> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        for (idx, record) in records.into_iter().enumerate() {
            let c = validate_record(idx, record)?;
            if !seen_ids.insert(c.id.clone()) {
                return Err(ApportionmentError::DuplicateKey { id: c.id });
            }
            constituencies.push(c);
        }
        info!(
            "ResultStore::load: {} constituencies, {} seats",
            constituencies.len(),
            constituencies.iter().map(|c| c.seats as u64).sum::<u64>()
        );
        Ok(ResultStore { constituencies })
    }

    pub fn constituencies(&self) -> &[Constituency] {
        &self.constituencies
    }

    pub fn get(&self, id: &str) -> Option<&Constituency> {
        self.constituencies.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.constituencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituencies.is_empty()
    }

    /// A deep copy of all the constituencies, in load order.
    pub fn working_copy(&self) -> Vec<Constituency> {
        self.constituencies.clone()
    }

    /// All the party labels found in the source data.
    pub fn party_universe(&self) -> BTreeSet<String> {
        party_universe(&self.constituencies)
    }
}

pub(crate) fn party_universe(constituencies: &[Constituency]) -> BTreeSet<String> {
    constituencies
        .iter()
        .flat_map(|c| c.parties.keys().cloned())
        .collect()
}

fn missing(record: usize, field: &'static str) -> ApportionmentError {
    ApportionmentError::Format {
        record,
        field,
        reason: "missing".to_string(),
    }
}

/// Turns a record into a constituency, deriving the counts that are not provided.
pub(crate) fn validate_record(
    idx: usize,
    record: ConstituencyRecord,
) -> Result<Constituency, ApportionmentError> {
    let id = match record.id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        Some(_) => {
            return Err(ApportionmentError::Format {
                record: idx,
                field: "id",
                reason: "empty identifier".to_string(),
            })
        }
        None => return Err(missing(idx, "id")),
    };

    let seats: u32 = match record.seats {
        Some(s) if s < 0 => {
            return Err(ApportionmentError::InvalidScenario {
                reason: format!("constituency {}: negative number of seats {}", id, s),
            })
        }
        Some(s) => u32::try_from(s).map_err(|_| ApportionmentError::Format {
            record: idx,
            field: "seats",
            reason: format!("{} is too large", s),
        })?,
        None => return Err(missing(idx, "seats")),
    };

    let census = record.census.ok_or_else(|| missing(idx, "census"))?;
    let blank_votes = record.blank_votes.ok_or_else(|| missing(idx, "blank_votes"))?;
    let null_votes = record.null_votes.ok_or_else(|| missing(idx, "null_votes"))?;
    let parties = record.parties.ok_or_else(|| missing(idx, "parties"))?;

    let party_votes: u64 = parties.values().sum();
    let valid_votes = record.valid_votes.unwrap_or(party_votes + blank_votes);
    if valid_votes != party_votes + blank_votes {
        warn!(
            "constituency {}: valid votes {} differ from party votes {} + blank {}",
            id, valid_votes, party_votes, blank_votes
        );
    }
    if blank_votes > valid_votes {
        return Err(ApportionmentError::Format {
            record: idx,
            field: "blank_votes",
            reason: format!(
                "{} blank votes but only {} valid votes",
                blank_votes, valid_votes
            ),
        });
    }
    let total_votes = match record.total_votes {
        Some(total) => {
            if record.valid_votes.is_some() && total != valid_votes + null_votes {
                warn!(
                    "constituency {}: total votes {} differ from valid {} + null {}",
                    id, total, valid_votes, null_votes
                );
            }
            total
        }
        None => valid_votes + null_votes,
    };

    if census < total_votes {
        return Err(ApportionmentError::Format {
            record: idx,
            field: "census",
            reason: format!(
                "census {} is lower than the total votes {}",
                census, total_votes
            ),
        });
    }

    let derived_abstention = census - total_votes;
    if let Some(a) = record.abstention {
        if a != derived_abstention as i64 {
            warn!(
                "constituency {}: stored abstention {} replaced by census - total votes = {}",
                id, a, derived_abstention
            );
        }
    }

    debug!(
        "validate_record: {} seats: {} parties: {}",
        id,
        seats,
        parties.len()
    );

    Ok(Constituency {
        id,
        name: record.name,
        seats,
        census,
        valid_votes,
        blank_votes,
        null_votes,
        total_votes,
        parties,
    })
}
