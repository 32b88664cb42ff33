mod service;
mod store;

pub use service::*;
pub use store::*;

use clanhub_core::{compute_rank, BountyCounts, RankInput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

use super::BountyClaim;

const LEADERBOARD_SIZE: usize = 3;

/// A clan member as reported by the stats api
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanMember {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub account_type: String,
    pub ehb: f64,
    pub ehp: f64,
    pub ttm: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedMember {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub account_type: String,
    pub ehb: i64,
    pub ehp: i64,
    pub ttm: i64,
    pub bounties: BountyCounts,
    pub rank: String,
    pub rank_order: u32,
    pub next_rank: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub display_name: String,
    pub value: i64,
}

/// Everything the member dashboards render, rebuilt on each refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanSnapshot {
    pub member_count: usize,
    pub top_ehb: Vec<LeaderboardEntry>,
    pub top_ehp: Vec<LeaderboardEntry>,
    pub ranked_members: Vec<RankedMember>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Outcome of one call to the incremental player sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSyncStep {
    pub index: usize,
    pub next_index: usize,
    pub total: usize,
    pub done: bool,
    pub rate_limited: bool,
    pub retry_after_secs: Option<u64>,
    pub player: Option<String>,
}

/// Approved bounty counts keyed by lower-cased player name
pub fn count_bounties(claims: &[BountyClaim]) -> HashMap<String, BountyCounts> {
    let mut counts: HashMap<String, BountyCounts> = HashMap::new();
    for claim in claims {
        counts
            .entry(claim.player_name.trim().to_lowercase())
            .or_default()
            .record(claim.tier);
    }
    counts
}

pub fn rank_member(member: &ClanMember, counts: &HashMap<String, BountyCounts>) -> RankedMember {
    let bounties = counts
        .get(&member.username.to_lowercase())
        .copied()
        .unwrap_or_default();
    let ehb = member.ehb.round() as i64;
    let rank = compute_rank(&RankInput { ehb, bounties });

    RankedMember {
        id: member.id,
        username: member.username.clone(),
        display_name: member.display_name.clone(),
        account_type: member.account_type.clone(),
        ehb,
        ehp: member.ehp.round() as i64,
        ttm: member.ttm.round() as i64,
        bounties,
        rank: rank.rank,
        rank_order: rank.order,
        next_rank: rank.next,
    }
}

fn leaderboard(roster: &[ClanMember], metric: impl Fn(&ClanMember) -> f64) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&ClanMember> = roster.iter().collect();
    sorted.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
    sorted
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .map(|member| LeaderboardEntry {
            display_name: member.display_name.clone(),
            value: metric(member).round() as i64,
        })
        .collect()
}

pub fn build_snapshot(
    roster: &[ClanMember],
    claims: &[BountyClaim],
    generated_at: OffsetDateTime,
) -> ClanSnapshot {
    let counts = count_bounties(claims);

    let mut ranked_members: Vec<RankedMember> = roster
        .iter()
        .map(|member| rank_member(member, &counts))
        .collect();
    ranked_members.sort_by(|a, b| {
        b.rank_order
            .cmp(&a.rank_order)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    ClanSnapshot {
        member_count: roster.len(),
        top_ehb: leaderboard(roster, |m| m.ehb),
        top_ehp: leaderboard(roster, |m| m.ehp),
        ranked_members,
        generated_at,
    }
}
