mod config;
pub mod builder;
pub mod manual;
mod session;
mod store;

use log::debug;

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BinaryHeap},
    ops::{Add, AddAssign},
};

pub use crate::config::*;
pub use crate::session::Session;
pub use crate::store::ResultStore;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

// One entry of the quotient table: votes / divisor for a given party.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct Quotient<'a> {
    label: &'a str,
    votes: VoteCount,
    divisor: u32,
}

/// Orders the quotients so that the one that should get a seat first comes first.
///
/// Larger quotients come first. Equal quotients are given to the party with
/// the most votes, then to the smallest label in byte order.
fn ranking(a: &Quotient, b: &Quotient) -> Ordering {
    // a.votes / a.divisor against b.votes / b.divisor, cross-multiplied in u128.
    let lhs = (a.votes.0 as u128) * (b.divisor as u128);
    let rhs = (b.votes.0 as u128) * (a.divisor as u128);
    rhs.cmp(&lhs)
        .then_with(|| b.votes.cmp(&a.votes))
        .then_with(|| a.label.cmp(b.label))
        .then_with(|| a.divisor.cmp(&b.divisor))
}

// The quotient that should get a seat first is the greatest one.
impl<'a> Ord for Quotient<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        ranking(other, self)
    }
}

impl<'a> PartialOrd for Quotient<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs the D'Hondt method in one constituency.
///
/// Arguments:
/// * `seats` the number of seats to award
/// * `threshold` the minimum share of `base` a party needs to get any seat
/// * `parties` the votes of each party
/// * `blank_votes` the blank votes. They count towards the base of the
///   threshold but never get a seat.
///
/// The base is the sum of all the party votes plus the blank votes. When no
/// party reaches the threshold, or the base is zero, nothing is awarded.
/// Otherwise the awarded seats sum to exactly `seats`.
///
/// ```
/// use seat_allocation::{apportion, Threshold};
/// use std::collections::BTreeMap;
///
/// let parties: BTreeMap<String, u64> = [("A", 340_000), ("B", 280_000), ("C", 160_000)]
///     .iter()
///     .map(|(l, v)| (l.to_string(), *v))
///     .collect();
/// let allocation = apportion(7, Threshold::DEFAULT, &parties, 0);
/// assert_eq!(allocation.get("A"), 3);
/// assert_eq!(allocation.get("B"), 3);
/// assert_eq!(allocation.get("C"), 1);
/// ```
pub fn apportion(
    seats: u32,
    threshold: Threshold,
    parties: &BTreeMap<String, u64>,
    blank_votes: u64,
) -> SeatAllocation {
    let base: VoteCount =
        parties.values().map(|v| VoteCount(*v)).sum::<VoteCount>() + VoteCount(blank_votes);

    let mut allocation: BTreeMap<String, u32> = parties
        .iter()
        .filter(|(_, votes)| **votes > 0)
        .map(|(label, _)| (label.clone(), 0))
        .collect();

    if seats == 0 || base == VoteCount::EMPTY {
        debug!(
            "apportion: nothing to award: seats: {:?} base: {:?}",
            seats, base
        );
        return SeatAllocation { seats: allocation };
    }

    // A party without votes never qualifies, even with no threshold. When
    // only such parties are left, nothing is awarded and the seats do not
    // add up to `seats`.
    let qualified: Vec<(&str, VoteCount)> = parties
        .iter()
        .filter(|(_, votes)| **votes > 0 && !threshold.excludes(**votes, base.0))
        .map(|(label, votes)| (label.as_str(), VoteCount(*votes)))
        .collect();
    debug!(
        "apportion: base: {:?} threshold: {} qualified: {:?}",
        base, threshold, qualified
    );

    // The next quotient of every qualified party. Each party's quotients
    // decrease with the divisor, so the greatest one in the heap is the
    // greatest one left in the whole table.
    let mut next: BinaryHeap<Quotient> = qualified
        .iter()
        .map(|&(label, votes)| Quotient {
            label,
            votes,
            divisor: 1,
        })
        .collect();
    for _ in 0..seats {
        let q = match next.pop() {
            Some(q) => q,
            None => break,
        };
        if let Some(s) = allocation.get_mut(q.label) {
            *s += 1;
        }
        if q.divisor < seats {
            next.push(Quotient {
                divisor: q.divisor + 1,
                ..q
            });
        }
    }
    debug!("apportion: allocation: {:?}", allocation);
    SeatAllocation { seats: allocation }
}
