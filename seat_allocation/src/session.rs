use log::{debug, info};

use std::collections::{BTreeSet, HashMap};

use crate::config::*;
use crate::store::{party_universe, ResultStore};

/// A what-if workspace on top of loaded results.
///
/// The session owns a copy of the constituencies. Joins and other
/// redistributions only change this copy, and `reset` brings it back to the
/// loaded data.
///
/// ```
/// use seat_allocation::builder::ConstituencyBuilder;
/// use seat_allocation::*;
///
/// let store = ResultStore::load(vec![ConstituencyBuilder::new("18")
///     .seats(3)
///     .census(2_000)
///     .blank(0)
///     .null(0)
///     .party("A", 500)
///     .party("B", 400)
///     .party("C", 300)
///     .record()])?;
///
/// let mut session = Session::new(&store, Threshold::DEFAULT);
/// assert_eq!(session.seats(&SeatsOptions::default()).seats_of("B"), 1);
///
/// session.join(&[MergeSpec::from(["B", "C"])], &JoinOptions::NONE)?;
/// assert_eq!(session.seats(&SeatsOptions::default()).seats_of("B"), 2);
///
/// session.reset();
/// assert_eq!(session.constituencies()[0].parties.get("C"), Some(&300));
///
/// # Ok::<(), ApportionmentError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Session<'a> {
    store: &'a ResultStore,
    initial_threshold: Threshold,
    threshold: Threshold,
    constituencies: Vec<Constituency>,
    party_universe: BTreeSet<String>,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a ResultStore, threshold: Threshold) -> Session<'a> {
        let mut s = Session {
            store,
            initial_threshold: threshold,
            threshold,
            constituencies: Vec::new(),
            party_universe: BTreeSet::new(),
        };
        s.reset();
        s
    }

    /// Drops all the changes made since the session was created, including
    /// threshold changes.
    pub fn reset(&mut self) {
        self.constituencies = self.store.working_copy();
        self.threshold = self.initial_threshold;
        self.refresh_party_universe();
        debug!(
            "Session::reset: {} constituencies, {} parties",
            self.constituencies.len(),
            self.party_universe.len()
        );
    }

    pub fn constituencies(&self) -> &[Constituency] {
        &self.constituencies
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Changes the threshold until the next reset.
    pub fn set_threshold(&mut self, threshold: Threshold) {
        info!("Session::set_threshold: {}", threshold);
        self.threshold = threshold;
    }

    /// All the party labels currently present in at least one constituency.
    pub fn party_universe(&self) -> &BTreeSet<String> {
        &self.party_universe
    }

    fn refresh_party_universe(&mut self) {
        self.party_universe = party_universe(&self.constituencies);
    }

    /// Merges party lists, constituency by constituency.
    ///
    /// For every spec whose primary label is present in a constituency, the
    /// votes of the secondary labels present there are added to the primary
    /// and the secondary labels are removed. The primary of the first spec
    /// also receives the extra votes requested in `options`. Labels that are
    /// absent from a constituency are skipped.
    ///
    /// Fails only when `options` is out of range, before anything changes.
    pub fn join(
        &mut self,
        groups: &[MergeSpec],
        options: &JoinOptions,
    ) -> Result<(), ApportionmentError> {
        options.check()?;
        info!("Session::join: {:?} options: {:?}", groups, options);
        for c in self.constituencies.iter_mut() {
            for (idx, spec) in groups.iter().enumerate() {
                merge_into(c, spec, idx == 0, options);
            }
        }
        self.refresh_party_universe();
        Ok(())
    }

    /// Hands a fraction of the abstention to the parties, in equal parts.
    ///
    /// In every constituency, the parties that are not listed in `excluded`
    /// each receive `floor(abstention * fraction / n)` votes, `n` being the
    /// number of such parties.
    pub fn spread_abstention(
        &mut self,
        fraction: f64,
        excluded: &[String],
    ) -> Result<(), ApportionmentError> {
        check_fraction("abstention", fraction)?;
        info!(
            "Session::spread_abstention: fraction: {} excluded: {:?}",
            fraction, excluded
        );
        for c in self.constituencies.iter_mut() {
            let receivers: Vec<String> = c
                .parties
                .keys()
                .filter(|label| !excluded.contains(*label))
                .cloned()
                .collect();
            if receivers.is_empty() {
                continue;
            }
            let share = (c.abstention() as f64 * fraction / receivers.len() as f64).floor() as u64;
            debug!(
                "spread_abstention: {}: {} votes to each of {} parties",
                c.id,
                share,
                receivers.len()
            );
            for label in receivers.iter() {
                if let Some(v) = c.parties.get_mut(label) {
                    *v += share;
                }
            }
        }
        self.refresh_party_universe();
        Ok(())
    }

    /// Runs the apportionment in every constituency and adds up the seats.
    ///
    /// The national totals are sorted by decreasing number of seats. Parties
    /// with the same number of seats keep the order in which they first won a
    /// seat.
    pub fn seats(&self, options: &SeatsOptions) -> SeatsReport {
        let mut totals: Vec<(String, u32)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut detail: Vec<ConstituencyDetail> = Vec::new();

        for c in self.constituencies.iter() {
            let allocation = crate::apportion(c.seats, self.threshold, &c.parties, c.blank_votes);
            for (label, s) in allocation.awarded() {
                match positions.get(label).copied() {
                    Some(pos) => totals[pos].1 += s,
                    None => {
                        positions.insert(label.clone(), totals.len());
                        totals.push((label.clone(), s));
                    }
                }
            }
            if options.detail {
                let mut seats: Vec<(String, u32)> = allocation
                    .awarded()
                    .map(|(label, s)| (label.clone(), s))
                    .collect();
                seats.sort_by(|a, b| b.0.cmp(&a.0));
                debug!("seats: {}: {:?}", c.id, seats);
                detail.push(ConstituencyDetail {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    seats,
                });
            }
        }

        // Stable: ties keep the first-encounter order.
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        info!("Session::seats: {:?}", totals);
        SeatsReport { totals, detail }
    }
}

/// Applies one merge spec to one constituency.
fn merge_into(c: &mut Constituency, spec: &MergeSpec, is_first_spec: bool, options: &JoinOptions) {
    if !c.parties.contains_key(&spec.primary) {
        return;
    }

    let mut extra: u64 = 0;
    if is_first_spec {
        if options.blank_votes {
            extra += c.blank_votes;
        }
        if options.null_votes {
            extra += c.null_votes;
        }
        if options.abstention > 0.0 {
            extra += (c.abstention() as f64 * options.abstention).floor() as u64;
        }
    }

    for secondary in spec.secondaries.iter() {
        if *secondary == spec.primary {
            debug!("merge_into: {}: ignoring self merge of {}", c.id, secondary);
            continue;
        }
        if let Some(votes) = c.parties.remove(secondary) {
            extra += votes;
        }
    }

    if let Some(v) = c.parties.get_mut(&spec.primary) {
        *v += extra;
    }
}
