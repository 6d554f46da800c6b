//! Resolves the gamepasses of each experience.
//!
//! A failed lookup never fails the query: the experience is reported as
//! [`FanoutOutcome::Failed`], which the aggregator treats as an experience
//! without gamepasses.
use crate::config::{ChildListing, PipelineConfig};
use crate::errors::UpstreamError;
use crate::fetch::Fetch;
use crate::metrics_defs::FANOUT_FAILURES;
use crate::paginator::Paginator;
use crate::types::{FanoutOutcome, ItemRecord, SubItemRecord};
use shared::counter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep};

#[derive(Clone)]
pub struct FanoutResolver {
    fetcher: Arc<dyn Fetch>,
    children: Arc<ChildListing>,
    max_pages: usize,
    delay: Duration,
    concurrency: usize,
}

impl FanoutResolver {
    pub fn new(fetcher: Arc<dyn Fetch>, config: &PipelineConfig) -> Self {
        FanoutResolver {
            fetcher,
            children: Arc::new(config.children.clone()),
            max_pages: config.max_pages,
            delay: config.request_delay(),
            concurrency: config.fanout_concurrency(),
        }
    }

    /// Resolves every item, returning one outcome per item in item order.
    pub async fn resolve_all(&self, items: &[ItemRecord]) -> Vec<FanoutOutcome> {
        if self.concurrency == 1 || items.len() <= 1 {
            self.resolve_sequential(items).await
        } else {
            self.resolve_bounded(items).await
        }
    }

    async fn resolve_sequential(&self, items: &[ItemRecord]) -> Vec<FanoutOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            outcomes.push(self.resolve(item).await);
        }
        outcomes
    }

    /// At most `concurrency` lookups in flight. Each permit holder past the
    /// first wave waits the courtesy delay before calling out, so the call
    /// rate stays within `concurrency` times the sequential rate.
    async fn resolve_bounded(&self, items: &[ItemRecord]) -> Vec<FanoutOutcome> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, item) in items.iter().cloned().enumerate() {
            let resolver = self.clone();
            let permits = permits.clone();
            join_set.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = permits.acquire_owned().await;
                if index >= resolver.concurrency && !resolver.delay.is_zero() {
                    sleep(resolver.delay).await;
                }
                (index, resolver.resolve(&item).await)
            });
        }

        let mut outcomes: Vec<Option<FanoutOutcome>> = vec![None; items.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!("fan-out task panicked: {}", e),
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| FanoutOutcome::Failed("lookup task panicked".into()))
            })
            .collect()
    }

    /// Looks up the gamepasses of a single experience.
    pub async fn resolve(&self, item: &ItemRecord) -> FanoutOutcome {
        match self.fetch_children(item).await {
            Ok(children) => {
                tracing::debug!(
                    experience_id = item.id,
                    gamepasses = children.len(),
                    "gamepasses resolved"
                );
                FanoutOutcome::Resolved(children)
            }
            Err(error) => {
                tracing::warn!(
                    experience_id = item.id,
                    experience_name = item.display_name(),
                    error = %error,
                    "gamepass lookup failed, continuing without them"
                );
                counter!(FANOUT_FAILURES).increment(1);
                FanoutOutcome::Failed(error.to_string())
            }
        }
    }

    async fn fetch_children(&self, item: &ItemRecord) -> Result<Vec<SubItemRecord>, UpstreamError> {
        let id = item.id.to_string();
        let place_id = item.place_id.map(|place_id| place_id.to_string());

        let mut vars = vec![("id", id.as_str())];
        if let Some(place_id) = &place_id {
            vars.push(("placeId", place_id.as_str()));
        }
        let url = self.children.url.render(&vars)?;

        let paginator = Paginator::new(&*self.fetcher, self.max_pages, self.delay);
        let records = if self.children.paginated {
            paginator
                .collect(&url, &self.children.records, self.children.authenticated)
                .await?
        } else {
            paginator
                .first_page(url, &self.children.records, self.children.authenticated)
                .await?
        };

        Ok(records.into_iter().map(SubItemRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{BASE, ScriptedFetcher};
    use serde_json::json;

    fn config(paginated: bool, template: &str, concurrency: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.children.url = format!("{BASE}{template}").as_str().into();
        config.children.paginated = paginated;
        config.request_delay_ms = 0;
        config.fanout_concurrency = concurrency;
        config
    }

    fn item(id: u64, place_id: Option<u64>) -> ItemRecord {
        ItemRecord {
            id,
            name: Some(format!("experience {id}")),
            place_id,
        }
    }

    fn passes(ids: &[u64]) -> serde_json::Value {
        let data: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "name": format!("pass {id}")}))
            .collect();
        json!({"data": data})
    }

    fn ids(outcome: &FanoutOutcome) -> Vec<u64> {
        match outcome {
            FanoutOutcome::Resolved(children) => children.iter().map(|child| child.id).collect(),
            FanoutOutcome::Failed(reason) => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_failed_item_does_not_affect_others() {
        let fetcher = ScriptedFetcher::new()
            .respond(&format!("{BASE}/games/1/passes"), passes(&[11, 12]))
            .fail(&format!("{BASE}/games/2/passes"), 403)
            .respond(&format!("{BASE}/games/3/passes"), passes(&[31]));

        let resolver = FanoutResolver::new(Arc::new(fetcher), &config(false, "/games/{id}/passes", 1));
        let outcomes = resolver
            .resolve_all(&[item(1, None), item(2, None), item(3, None)])
            .await;

        assert_eq!(ids(&outcomes[0]), vec![11, 12]);
        assert!(matches!(&outcomes[1], FanoutOutcome::Failed(reason) if reason.contains("403")));
        assert_eq!(ids(&outcomes[2]), vec![31]);
    }

    #[tokio::test]
    async fn test_place_id_template() {
        let fetcher = Arc::new(
            ScriptedFetcher::new().respond(&format!("{BASE}/assets/100/game-pass"), passes(&[5])),
        );

        let resolver = FanoutResolver::new(fetcher.clone(), &config(false, "/assets/{placeId}/game-pass", 1));
        let outcomes = resolver
            .resolve_all(&[item(1, Some(100)), item(2, None)])
            .await;

        assert_eq!(ids(&outcomes[0]), vec![5]);
        // No place id, so nothing to look up.
        assert!(matches!(&outcomes[1], FanoutOutcome::Failed(reason) if reason.contains("placeId")));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_paginated_children() {
        let fetcher = ScriptedFetcher::new()
            .respond(
                &format!("{BASE}/games/1/passes"),
                json!({"data": [{"id": 1, "name": "VIP"}], "nextPageCursor": "next"}),
            )
            .respond(
                &format!("{BASE}/games/1/passes?cursor=next"),
                json!({"data": [{"id": 2, "name": "Servidor"}], "nextPageCursor": null}),
            );

        let resolver = FanoutResolver::new(Arc::new(fetcher), &config(true, "/games/{id}/passes", 1));
        let outcome = resolver.resolve(&item(1, None)).await;

        match outcome {
            FanoutOutcome::Resolved(children) => {
                assert_eq!(children[0].name.as_deref(), Some("VIP"));
                assert_eq!(children[1].name.as_deref(), Some("Servidor"));
            }
            FanoutOutcome::Failed(reason) => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_concurrency_preserves_order() {
        let mut fetcher = ScriptedFetcher::new();
        let items: Vec<ItemRecord> = (1..=12).map(|id| item(id, None)).collect();
        for id in 1..=12u64 {
            if id % 5 == 0 {
                fetcher = fetcher.fail(&format!("{BASE}/games/{id}/passes"), 500);
            } else {
                fetcher = fetcher.respond(
                    &format!("{BASE}/games/{id}/passes"),
                    passes(&[id * 10, id * 10 + 1]),
                );
            }
        }
        let fetcher = Arc::new(fetcher);

        let sequential = FanoutResolver::new(fetcher.clone(), &config(false, "/games/{id}/passes", 1))
            .resolve_all(&items)
            .await;
        let bounded = FanoutResolver::new(fetcher, &config(false, "/games/{id}/passes", 4))
            .resolve_all(&items)
            .await;

        assert_eq!(sequential, bounded);
        assert_eq!(ids(&bounded[0]), vec![10, 11]);
        assert!(matches!(bounded[4], FanoutOutcome::Failed(_)));
        assert_eq!(ids(&bounded[11]), vec![120, 121]);
    }

    fn delayed_fetcher(count: u64) -> Arc<ScriptedFetcher> {
        let mut fetcher = ScriptedFetcher::new();
        for id in 1..=count {
            fetcher = fetcher.respond(&format!("{BASE}/games/{id}/passes"), passes(&[id]));
        }
        Arc::new(fetcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_delay_between_items() {
        let items: Vec<ItemRecord> = (1..=4).map(|id| item(id, None)).collect();
        let mut config = config(false, "/games/{id}/passes", 1);
        config.request_delay_ms = 100;

        let start = tokio::time::Instant::now();
        let outcomes = FanoutResolver::new(delayed_fetcher(4), &config)
            .resolve_all(&items)
            .await;

        // Three gaps between four lookups.
        assert_eq!(outcomes.len(), 4);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_delay_after_first_wave() {
        let items: Vec<ItemRecord> = (1..=6).map(|id| item(id, None)).collect();
        let mut config = config(false, "/games/{id}/passes", 2);
        config.request_delay_ms = 100;

        let start = tokio::time::Instant::now();
        let outcomes = FanoutResolver::new(delayed_fetcher(6), &config)
            .resolve_all(&items)
            .await;

        // Two lookups go out at once, the remaining four wait in two waves.
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(300));
        let resolved: Vec<Vec<u64>> = outcomes.iter().map(ids).collect();
        assert_eq!(resolved, (1..=6).map(|id| vec![id]).collect::<Vec<_>>());
    }
}
