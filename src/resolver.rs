//! Resolution pipeline: primary fetch, per-provider enrichment, flatten.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::chain::BalancesContext;
use crate::error::{Error, Result};
use crate::fetcher::get_farm_balances;
use crate::providers::ProviderRegistry;
use crate::registry::group_by_provider;
use crate::types::{Balance, Position};

/// Turns a set of positions into fully enriched balances for one wallet
#[derive(Clone)]
pub struct Resolver {
    providers: ProviderRegistry,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ProviderRegistry::builtin())
    }
}

impl Resolver {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Fetch primary amounts for every position, then hand each provider
    /// group to its strategy concurrently.
    ///
    /// Groups without a known strategy pass through unchanged. A strategy that
    /// fails leaves its own group un-enriched without affecting the others.
    /// The output order across groups is unspecified.
    pub async fn resolve(&self, ctx: &BalancesContext, positions: &[Position]) -> Result<Vec<Balance>> {
        let balances = get_farm_balances(ctx, positions).await?;
        let groups = group_by_provider(balances);
        debug!(positions = positions.len(), groups = groups.len(), "resolving provider groups");

        let resolved = join_all(
            groups
                .into_iter()
                .map(|(provider, group)| self.resolve_group(ctx, provider, group)),
        )
        .await;

        Ok(resolved.into_iter().flatten().collect())
    }

    /// [`resolve`](Self::resolve), abandoned after `timeout`.
    ///
    /// In-flight reads are dropped along with the future.
    pub async fn resolve_with_timeout(
        &self,
        ctx: &BalancesContext,
        positions: &[Position],
        timeout: Duration,
    ) -> Result<Vec<Balance>> {
        tokio::time::timeout(timeout, self.resolve(ctx, positions))
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn resolve_group(&self, ctx: &BalancesContext, provider: Option<String>, group: Vec<Balance>) -> Vec<Balance> {
        let Some(strategy) = provider.as_deref().and_then(|id| self.providers.get(id)) else {
            debug!(provider = ?provider, balances = group.len(), "no strategy, passing through");
            return group;
        };

        let expected = group.len();
        match strategy.enrich(ctx, group.clone()).await {
            Ok(enriched) if enriched.len() == expected => enriched,
            Ok(enriched) => {
                warn!(
                    provider = ?provider,
                    expected,
                    returned = enriched.len(),
                    "provider changed batch size, keeping primary amounts"
                );
                group
            }
            Err(err) => {
                warn!(provider = ?provider, error = %err, "provider failed, keeping primary amounts");
                group
            }
        }
    }
}
