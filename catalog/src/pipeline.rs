use crate::aggregator::{aggregate, merge_sources};
use crate::config::PipelineConfig;
use crate::errors::{CatalogError, Result};
use crate::fanout::FanoutResolver;
use crate::fetch::{Fetch, HttpFetcher};
use crate::metrics_defs::OWNERSHIP_CHECK_FAILURES;
use crate::names::resolve_names;
use crate::ownership::check_ownership;
use crate::paginator::Paginator;
use crate::types::{Aggregate, GamepassId, ItemRecord, OwnedGamepasses, UserId};
use shared::counter;
use std::sync::Arc;
use tokio::time::sleep;

struct CatalogInner {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetch>,
    fanout: FanoutResolver,
}

/// Entry point for catalog queries.
///
/// Holds only immutable configuration and the pooled upstream client, so a
/// single instance is shared by all requests. Every query runs its pipeline
/// from scratch.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

impl Catalog {
    /// Builds a catalog backed by the upstream HTTP API. `session_cookie` is
    /// sent verbatim as the `Cookie` header of authenticated requests.
    pub fn new(config: PipelineConfig, session_cookie: Option<String>) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            session_cookie,
            config.request_timeout(),
        )?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: PipelineConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let fanout = FanoutResolver::new(fetcher.clone(), &config);
        Catalog {
            inner: Arc::new(CatalogInner {
                config,
                fetcher,
                fanout,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn has_session(&self) -> bool {
        self.inner.fetcher.has_session()
    }

    /// Lists every gamepass of every experience of `user`.
    ///
    /// Only a failing required listing source fails the query. Gamepass and
    /// name lookups degrade to empty results and placeholder names.
    pub async fn list_gamepasses(&self, user: UserId) -> Result<Aggregate> {
        let config = &self.inner.config;

        let listings = self.list_experiences(user).await?;
        let mut items = merge_sources(listings);
        tracing::info!(user_id = %user, experiences = items.len(), "experiences found");

        if items.is_empty() {
            return Ok(Aggregate::default());
        }

        if let Some(lookup) = &config.names {
            resolve_names(
                &*self.inner.fetcher,
                lookup,
                &mut items,
                config.request_delay(),
            )
            .await;
        }

        let outcomes = self.inner.fanout.resolve_all(&items).await;
        let aggregate = aggregate(&items, outcomes);

        let summary = &aggregate.summary;
        tracing::info!(
            user_id = %user,
            experiences = summary.items_processed,
            without_gamepasses = summary.items_without_children,
            gamepasses = summary.children_found,
            failed_lookups = summary.failed_lookups,
            "gamepass listing complete"
        );

        Ok(aggregate)
    }

    /// Runs every applicable listing source, in configured order.
    async fn list_experiences(&self, user: UserId) -> Result<Vec<Vec<ItemRecord>>> {
        let config = &self.inner.config;
        let paginator = Paginator::new(
            &*self.inner.fetcher,
            config.max_pages,
            config.request_delay(),
        );
        let user_id = user.to_string();

        let mut listings = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            if source.authenticated && !self.has_session() {
                tracing::debug!(source = %source.name, "no session configured, skipping source");
                continue;
            }

            let result = match source.url.render(&[("userId", user_id.as_str())]) {
                Ok(url) => {
                    paginator
                        .collect(&url, &source.records, source.authenticated)
                        .await
                }
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(records) => {
                    tracing::debug!(
                        source = %source.name,
                        experiences = records.len(),
                        "listing source complete"
                    );
                    listings.push(records);
                }
                Err(error) if source.optional => {
                    tracing::warn!(
                        source = %source.name,
                        error = %error,
                        "optional listing source failed, skipping it"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        user_id = %user,
                        source = %source.name,
                        error = %error,
                        "listing failed"
                    );
                    return Err(CatalogError::Listing {
                        source_name: source.name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(listings)
    }

    /// Checks a single gamepass in the inventory of `user`.
    pub async fn owns_gamepass(&self, user: UserId, gamepass: GamepassId) -> Result<bool> {
        let owned = check_ownership(
            &*self.inner.fetcher,
            &self.inner.config.ownership,
            user,
            gamepass,
        )
        .await
        .map_err(|error| {
            tracing::error!(
                user_id = %user,
                gamepass_id = %gamepass,
                error = %error,
                "ownership check failed"
            );
            counter!(OWNERSHIP_CHECK_FAILURES).increment(1);
            CatalogError::Ownership(error)
        })?;

        tracing::info!(user_id = %user, gamepass_id = %gamepass, owned, "ownership checked");
        Ok(owned)
    }

    /// Checks every gamepass of the configured catalog, one at a time.
    ///
    /// Gamepasses whose check fails are left out and counted.
    pub async fn owned_gamepasses(&self, user: UserId) -> OwnedGamepasses {
        let config = &self.inner.config;
        let mut owned = OwnedGamepasses::default();

        for (index, gamepass) in config.gamepasses.iter().enumerate() {
            if index > 0 && !config.request_delay().is_zero() {
                sleep(config.request_delay()).await;
            }

            let Some(gamepass_id) = GamepassId::new(gamepass.id) else {
                tracing::warn!(name = %gamepass.name, "configured gamepass has id 0, skipping");
                owned.failed_lookups += 1;
                continue;
            };

            match check_ownership(&*self.inner.fetcher, &config.ownership, user, gamepass_id).await
            {
                Ok(true) => owned.gamepasses.push(gamepass.clone()),
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        user_id = %user,
                        gamepass_id = gamepass.id,
                        error = %error,
                        "ownership check failed, leaving gamepass out"
                    );
                    counter!(OWNERSHIP_CHECK_FAILURES).increment(1);
                    owned.failed_lookups += 1;
                }
            }
        }

        tracing::info!(
            user_id = %user,
            checked = config.gamepasses.len(),
            owned = owned.gamepasses.len(),
            failed_lookups = owned.failed_lookups,
            "owned gamepasses checked"
        );
        owned
    }
}
