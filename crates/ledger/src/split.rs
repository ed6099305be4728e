//! Split inputs and exact allocation of an amount across participants.
//!
//! Amounts are distributed with the largest-remainder method: every
//! participant gets the floor of its proportional share, then the leftover
//! cents go one each to the largest fractional remainders (earliest
//! participant wins ties). The allocated amounts always add up to the total.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MemberId, Money, ResultEngine, expenses::Participant,
    expenses::SplitStrategy, util::parse_hundredths,
};

/// A percentage in basis points (`10_000` = 100.00 %).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);

    /// Creates a percentage from basis points, rejecting values above 100 %.
    pub fn from_basis_points(bps: u32) -> ResultEngine<Self> {
        if bps > Self::HUNDRED.0 {
            return Err(EngineError::InvalidSplit(format!(
                "percentage {}.{:02}% exceeds 100%",
                bps / 100,
                bps % 100
            )));
        }
        Ok(Self(bps))
    }

    #[must_use]
    pub const fn basis_points(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Percent {
    type Err = EngineError;

    /// Parses `"33.33"` (an optional trailing `%` is accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_suffix('%').unwrap_or(s);
        let bps = parse_hundredths(s, "percentage")?;
        let bps = u32::try_from(bps)
            .map_err(|_| EngineError::InvalidAmount("invalid percentage".to_string()))?;
        Self::from_basis_points(bps)
    }
}

/// How a user asks for an expense to be divided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "participants", rename_all = "snake_case")]
pub enum Split {
    Equal(Vec<MemberId>),
    Percentage(Vec<(MemberId, Percent)>),
    Shares(Vec<(MemberId, u32)>),
    Exact(Vec<(MemberId, Money)>),
}

impl Split {
    pub fn strategy(&self) -> SplitStrategy {
        match self {
            Self::Equal(_) => SplitStrategy::Equal,
            Self::Percentage(_) => SplitStrategy::Percentage,
            Self::Shares(_) => SplitStrategy::Shares,
            Self::Exact(_) => SplitStrategy::Exact,
        }
    }

    /// Participant ids in input order.
    pub fn members(&self) -> Vec<&MemberId> {
        match self {
            Self::Equal(members) => members.iter().collect(),
            Self::Percentage(items) => items.iter().map(|(m, _)| m).collect(),
            Self::Shares(items) => items.iter().map(|(m, _)| m).collect(),
            Self::Exact(items) => items.iter().map(|(m, _)| m).collect(),
        }
    }

    /// Turns the split into participant rows whose amounts sum to `amount`.
    pub fn allocate(&self, amount: Money) -> ResultEngine<Vec<Participant>> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }

        let members = self.members();
        if members.is_empty() {
            return Err(EngineError::InvalidSplit(
                "at least one participant is required".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(*member) {
                return Err(EngineError::InvalidSplit(format!(
                    "duplicate participant: {member}"
                )));
            }
        }

        let participants = match self {
            Self::Equal(members) => {
                let amounts = distribute(amount, &vec![1; members.len()]);
                members
                    .iter()
                    .zip(amounts)
                    .map(|(member_id, amount)| Participant::new(member_id.clone(), amount))
                    .collect()
            }
            Self::Percentage(items) => {
                let total: u32 = items.iter().map(|(_, p)| p.basis_points()).sum();
                if total != Percent::HUNDRED.basis_points() {
                    return Err(EngineError::InvalidSplit(format!(
                        "percentages must sum to 100.00%, got {}",
                        Percent(total)
                    )));
                }
                let weights: Vec<u64> = items.iter().map(|(_, p)| u64::from(p.0)).collect();
                items
                    .iter()
                    .zip(distribute(amount, &weights))
                    .map(|((member_id, percentage), amount)| Participant {
                        percentage: Some(*percentage),
                        ..Participant::new(member_id.clone(), amount)
                    })
                    .collect()
            }
            Self::Shares(items) => {
                if let Some((member_id, _)) = items.iter().find(|(_, shares)| *shares == 0) {
                    return Err(EngineError::InvalidSplit(format!(
                        "shares for {member_id} must be > 0"
                    )));
                }
                let weights: Vec<u64> = items.iter().map(|(_, s)| u64::from(*s)).collect();
                items
                    .iter()
                    .zip(distribute(amount, &weights))
                    .map(|((member_id, shares), amount)| Participant {
                        shares: Some(*shares),
                        ..Participant::new(member_id.clone(), amount)
                    })
                    .collect()
            }
            Self::Exact(items) => {
                if let Some((member_id, _)) = items.iter().find(|(_, a)| a.is_negative()) {
                    return Err(EngineError::InvalidAmount(format!(
                        "amount for {member_id} must be >= 0"
                    )));
                }
                let total: Money = items.iter().map(|(_, a)| *a).sum();
                if total != amount {
                    return Err(EngineError::InvalidSplit(format!(
                        "exact amounts sum to {total}, expected {amount}"
                    )));
                }
                items
                    .iter()
                    .map(|(member_id, amount)| Participant::new(member_id.clone(), *amount))
                    .collect()
            }
        };

        Ok(participants)
    }
}

/// Distributes `total` proportionally to `weights` (largest remainder).
///
/// A zero total weight is treated as equal weights.
pub(crate) fn distribute(total: Money, weights: &[u64]) -> Vec<Money> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    if weight_sum == 0 {
        return distribute(total, &vec![1; weights.len()]);
    }

    let negative = total.is_negative();
    let cents = u128::from(total.cents().unsigned_abs());

    let mut shares: Vec<u128> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(weights.len());
    for (idx, weight) in weights.iter().enumerate() {
        let scaled = cents * u128::from(*weight);
        shares.push(scaled / weight_sum);
        remainders.push((scaled % weight_sum, idx));
    }

    let assigned: u128 = shares.iter().sum();
    let leftover = (cents - assigned) as usize;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in remainders.into_iter().take(leftover) {
        shares[idx] += 1;
    }

    shares
        .into_iter()
        .map(|share| {
            // Each share is bounded by `cents`, which came from an i64.
            let share = share as i64;
            Money::new(if negative { -share } else { share })
        })
        .collect()
}

/// Rescales basis points so they total exactly 100 %.
pub(crate) fn rescale_percentages(weights: &[u64]) -> Vec<Percent> {
    distribute(Money::new(i64::from(Percent::HUNDRED.0)), weights)
        .into_iter()
        .map(|bps| Percent(bps.cents() as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| MemberId::from(*n)).collect()
    }

    #[test]
    fn distribute_gives_leftover_cents_to_first_participants() {
        let shares = distribute(Money::new(100_00), &[1, 1, 1]);
        assert_eq!(
            shares,
            vec![Money::new(33_34), Money::new(33_33), Money::new(33_33)]
        );
    }

    #[test]
    fn distribute_uses_largest_remainder() {
        // 10.00 split 1:2:2 -> 2.00 / 4.00 / 4.00
        assert_eq!(
            distribute(Money::new(10_00), &[1, 2, 2]),
            vec![Money::new(2_00), Money::new(4_00), Money::new(4_00)]
        );
        // 0.10 split 1:1:4, remainders tie so the earliest participants win
        let shares = distribute(Money::new(10), &[1, 1, 4]);
        assert_eq!(shares, vec![Money::new(2), Money::new(2), Money::new(6)]);
        assert_eq!(shares.iter().sum::<Money>(), Money::new(10));
    }

    #[test]
    fn distribute_zero_weights_falls_back_to_equal() {
        assert_eq!(
            distribute(Money::new(5), &[0, 0]),
            vec![Money::new(3), Money::new(2)]
        );
    }

    #[test]
    fn equal_split_allocates_every_cent() {
        let participants = Split::Equal(ids(&["a", "b", "c"]))
            .allocate(Money::new(90_00))
            .unwrap();
        let amounts: Vec<Money> = participants.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![Money::new(30_00); 3]);
    }

    #[test]
    fn percentage_split_requires_full_hundred() {
        let split = Split::Percentage(vec![
            (MemberId::from("a"), "60".parse().unwrap()),
            (MemberId::from("b"), "30".parse().unwrap()),
        ]);
        assert_eq!(
            split.allocate(Money::new(100_00)),
            Err(EngineError::InvalidSplit(
                "percentages must sum to 100.00%, got 90.00%".to_string()
            ))
        );

        let split = Split::Percentage(vec![
            (MemberId::from("a"), "33.33".parse().unwrap()),
            (MemberId::from("b"), "66.67".parse().unwrap()),
        ]);
        let participants = split.allocate(Money::new(10_00)).unwrap();
        assert_eq!(participants[0].amount, Money::new(3_33));
        assert_eq!(participants[1].amount, Money::new(6_67));
        assert_eq!(participants[0].percentage, Some(Percent(3333)));
    }

    #[test]
    fn shares_split_rejects_zero_shares() {
        let split = Split::Shares(vec![(MemberId::from("a"), 2), (MemberId::from("b"), 0)]);
        assert_eq!(
            split.allocate(Money::new(10_00)),
            Err(EngineError::InvalidSplit("shares for b must be > 0".to_string()))
        );
    }

    #[test]
    fn exact_split_must_match_total() {
        let split = Split::Exact(vec![
            (MemberId::from("a"), Money::new(10_00)),
            (MemberId::from("b"), Money::new(5_00)),
        ]);
        assert!(split.allocate(Money::new(15_00)).is_ok());
        assert_eq!(
            split.allocate(Money::new(20_00)),
            Err(EngineError::InvalidSplit(
                "exact amounts sum to 15.00, expected 20.00".to_string()
            ))
        );
    }

    #[test]
    fn rejects_duplicates_and_empty_splits() {
        assert_eq!(
            Split::Equal(ids(&["a", "a"])).allocate(Money::new(1_00)),
            Err(EngineError::InvalidSplit("duplicate participant: a".to_string()))
        );
        assert!(Split::Equal(Vec::new()).allocate(Money::new(1_00)).is_err());
        assert!(Split::Equal(ids(&["a"])).allocate(Money::ZERO).is_err());
    }

    #[test]
    fn percent_parsing() {
        assert_eq!("50".parse::<Percent>().unwrap().basis_points(), 5000);
        assert_eq!("12.5%".parse::<Percent>().unwrap().basis_points(), 1250);
        assert!("100.01".parse::<Percent>().is_err());
        assert!("-1".parse::<Percent>().is_err());
        assert_eq!(Percent(3333).to_string(), "33.33%");
    }

    #[test]
    fn rescaled_percentages_total_hundred() {
        let rescaled = rescale_percentages(&[3333, 3333]);
        assert_eq!(rescaled, vec![Percent(5000), Percent(5000)]);
        let rescaled = rescale_percentages(&[1, 1, 1]);
        assert_eq!(rescaled, vec![Percent(3334), Percent(3333), Percent(3333)]);
    }
}
