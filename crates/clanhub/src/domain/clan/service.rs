use log::{debug, info, warn};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{build_snapshot, ClanSnapshot, ClanStore, PlayerSyncStep};
use crate::{
    domain::{BountyStore, Error},
    infra::stats::{Error as StatsError, StatsApi},
};

pub struct ClanService {
    stats: Arc<dyn StatsApi>,
    clan_store: ClanStore,
    bounty_store: BountyStore,
    group_id: u64,
    cache: RwLock<Option<Arc<ClanSnapshot>>>,
}

impl ClanService {
    pub fn new(
        stats: Arc<dyn StatsApi>,
        clan_store: ClanStore,
        bounty_store: BountyStore,
        group_id: u64,
    ) -> Self {
        Self {
            stats,
            clan_store,
            bounty_store,
            group_id,
            cache: RwLock::new(None),
        }
    }

    /// Rebuild the clan snapshot from the stats api roster and approved bounty claims.
    ///
    /// Nothing is written unless both sources load, the snapshot upsert is the only write.
    pub async fn refresh(&self) -> Result<Arc<ClanSnapshot>, Error> {
        let roster_fut = async {
            self.stats
                .group_members(self.group_id)
                .await
                .map_err(Error::from)
        };
        let (roster, claims) = futures::try_join!(
            roster_fut,
            self.bounty_store.approved_bounty_submissions()
        )?;
        debug!(
            "refreshing clan snapshot from {} members and {} approved bounties",
            roster.len(),
            claims.len()
        );

        let snapshot = build_snapshot(&roster, &claims, OffsetDateTime::now_utc());
        self.clan_store.save_snapshot(&snapshot).await?;

        let snapshot = Arc::new(snapshot);
        *self.cache.write().await = Some(snapshot.clone());
        info!(
            "clan snapshot refreshed with {} members",
            snapshot.member_count
        );

        Ok(snapshot)
    }

    /// Cached snapshot, loading the stored one on a cold cache
    pub async fn snapshot(&self) -> Result<Arc<ClanSnapshot>, Error> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let stored = self
            .clan_store
            .latest_snapshot()
            .await?
            .ok_or_else(|| Error::NotFound(String::from("clan snapshot has not been generated")))?;

        let snapshot = Arc::new(stored);
        let mut cache = self.cache.write().await;
        // a refresh may have landed while the row was loading
        let current = cache.get_or_insert_with(|| snapshot.clone());
        Ok(current.clone())
    }

    /// Ask the stats api to update the roster member at `index`.
    ///
    /// The caller drives the loop, re-invoking with `next_index` until `done`. A rate-limited call
    /// keeps the same index so it is retried.
    pub async fn sync_player_step(&self, index: usize) -> Result<PlayerSyncStep, Error> {
        let roster = match self.stats.group_members(self.group_id).await {
            Ok(roster) => roster,
            Err(StatsError::RateLimited { retry_after_secs }) => {
                return Ok(PlayerSyncStep {
                    index,
                    next_index: index,
                    total: 0,
                    done: false,
                    rate_limited: true,
                    retry_after_secs,
                    player: None,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let total = roster.len();

        let Some(member) = roster.get(index) else {
            return Ok(PlayerSyncStep {
                index,
                next_index: total,
                total,
                done: true,
                rate_limited: false,
                retry_after_secs: None,
                player: None,
            });
        };

        let (next_index, rate_limited, retry_after_secs) =
            match self.stats.update_player(&member.username).await {
                Ok(_) => {
                    debug!("synced {} ({}/{})", member.username, index + 1, total);
                    (index + 1, false, None)
                }
                Err(StatsError::RateLimited { retry_after_secs }) => {
                    warn!(
                        "rate limited syncing {}, retry index {}",
                        member.username, index
                    );
                    (index, true, retry_after_secs)
                }
                Err(StatsError::NotFound(_)) => {
                    warn!("stats api does not know {}, skipping", member.username);
                    (index + 1, false, None)
                }
                Err(e) => return Err(e.into()),
            };

        Ok(PlayerSyncStep {
            index,
            next_index,
            total,
            done: next_index >= total,
            rate_limited,
            retry_after_secs,
            player: Some(member.username.clone()),
        })
    }
}
