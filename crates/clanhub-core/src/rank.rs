//! Clan rank computation
//!
//! A member's rank is the highest tier whose criteria are all satisfied by their approved bounty
//! counts and rounded EHB. The floor tier has no criteria and is only used as the fallback.

use serde::{Deserialize, Serialize};

/// Approved bounty-type submissions for one member, split by tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyCounts {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub total: u32,
}

impl BountyCounts {
    pub fn record(&mut self, tier: crate::BountyTier) {
        match tier {
            crate::BountyTier::Low => self.low += 1,
            crate::BountyTier::Medium => self.medium += 1,
            crate::BountyTier::High => self.high += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankInput {
    /// Efficient hours bossed, already rounded to the nearest hour
    pub ehb: i64,
    pub bounties: BountyCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionKind {
    TotalBounties,
    MediumBounties,
    HighBounties,
    Ehb,
}

impl CriterionKind {
    fn label(&self) -> &'static str {
        match self {
            Self::TotalBounties => "total bounties",
            Self::MediumBounties => "medium bounties",
            Self::HighBounties => "high bounties",
            Self::Ehb => "EHB",
        }
    }

    fn value(&self, input: &RankInput) -> i64 {
        match self {
            Self::TotalBounties => i64::from(input.bounties.total),
            Self::MediumBounties => i64::from(input.bounties.medium),
            Self::HighBounties => i64::from(input.bounties.high),
            Self::Ehb => input.ehb,
        }
    }
}

/// Inclusive lower bound on one stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub kind: CriterionKind,
    pub min: i64,
}

impl Criterion {
    const fn new(kind: CriterionKind, min: i64) -> Self {
        Self { kind, min }
    }

    pub fn is_met(&self, input: &RankInput) -> bool {
        self.kind.value(input) >= self.min
    }

    /// How far the input is from the threshold, rounded up
    pub fn shortfall(&self, input: &RankInput) -> i64 {
        let gap = (self.min - self.kind.value(input)) as f64;
        gap.ceil().max(0.0) as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub name: &'static str,
    pub order: u32,
    pub criteria: &'static [Criterion],
}

use CriterionKind::{Ehb, HighBounties, MediumBounties, TotalBounties};

/// All tiers, lowest first. `order` is the index + 1.
pub const TIERS: [Tier; 10] = [
    Tier {
        name: "Backpack",
        order: 1,
        criteria: &[],
    },
    Tier {
        name: "Sapphire",
        order: 2,
        criteria: &[Criterion::new(TotalBounties, 1), Criterion::new(Ehb, 25)],
    },
    Tier {
        name: "Emerald",
        order: 3,
        criteria: &[Criterion::new(TotalBounties, 2), Criterion::new(Ehb, 50)],
    },
    Tier {
        name: "Ruby",
        order: 4,
        criteria: &[
            Criterion::new(TotalBounties, 4),
            Criterion::new(MediumBounties, 1),
            Criterion::new(Ehb, 100),
        ],
    },
    Tier {
        name: "Diamond",
        order: 5,
        criteria: &[
            Criterion::new(TotalBounties, 6),
            Criterion::new(MediumBounties, 2),
            Criterion::new(Ehb, 200),
        ],
    },
    Tier {
        name: "Dragonstone",
        order: 6,
        criteria: &[
            Criterion::new(TotalBounties, 10),
            Criterion::new(MediumBounties, 3),
            Criterion::new(HighBounties, 1),
            Criterion::new(Ehb, 350),
        ],
    },
    Tier {
        name: "Onyx",
        order: 7,
        criteria: &[
            Criterion::new(TotalBounties, 15),
            Criterion::new(MediumBounties, 5),
            Criterion::new(HighBounties, 2),
            Criterion::new(Ehb, 500),
        ],
    },
    Tier {
        name: "Zenyte",
        order: 8,
        criteria: &[
            Criterion::new(TotalBounties, 20),
            Criterion::new(MediumBounties, 7),
            Criterion::new(HighBounties, 3),
            Criterion::new(Ehb, 750),
        ],
    },
    Tier {
        name: "Death",
        order: 9,
        criteria: &[
            Criterion::new(TotalBounties, 30),
            Criterion::new(MediumBounties, 10),
            Criterion::new(HighBounties, 5),
            Criterion::new(Ehb, 1000),
        ],
    },
    Tier {
        name: "Infernal",
        order: 10,
        criteria: &[
            Criterion::new(TotalBounties, 40),
            Criterion::new(MediumBounties, 15),
            Criterion::new(HighBounties, 8),
            Criterion::new(Ehb, 1500),
        ],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankResult {
    pub rank: String,
    pub order: u32,
    /// What the member still needs for the next tier
    pub next: Vec<String>,
}

pub fn floor_tier() -> &'static Tier {
    &TIERS[0]
}

pub fn tier_by_order(order: u32) -> Option<&'static Tier> {
    TIERS.iter().find(|tier| tier.order == order)
}

/// Highest tier with every criterion met, falling back to the floor tier
pub fn current_tier(input: &RankInput) -> &'static Tier {
    TIERS
        .iter()
        .rev()
        .filter(|tier| !tier.criteria.is_empty())
        .find(|tier| tier.criteria.iter().all(|c| c.is_met(input)))
        .unwrap_or_else(floor_tier)
}

pub fn compute_rank(input: &RankInput) -> RankResult {
    let tier = current_tier(input);

    RankResult {
        rank: tier.name.to_string(),
        order: tier.order,
        next: next_tier_requirements(tier, input),
    }
}

/// Messages describing what `input` lacks for the tier above `tier`
pub fn next_tier_requirements(tier: &Tier, input: &RankInput) -> Vec<String> {
    let Some(next_tier) = tier_by_order(tier.order + 1) else {
        return vec![String::from("You have reached the highest rank!")];
    };

    let needs: Vec<String> = next_tier
        .criteria
        .iter()
        .filter(|c| !c.is_met(input))
        .map(|c| format!("Need {} more {}", c.shortfall(input), c.kind.label()))
        .collect();

    if needs.is_empty() {
        vec![format!("Ready to promote to {}!", next_tier.name)]
    } else {
        needs
    }
}
