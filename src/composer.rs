// Provider registry and composer: fans one request out to every registered
// adapter and collapses the answers into one

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::rent_abstraction::*;

pub const COMPOSER_PROVIDER_ID: &str = "composer";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    // Per adapter call; None waits forever
    pub call_timeout_ms: Option<u64>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: Some(5000),
        }
    }
}

pub struct RentProviderComposer {
    providers: RwLock<Vec<Arc<dyn RentProvider>>>,
    config: ComposerConfig,
}

// Outcome of counting non-absent answers from a fan-out
enum Claims<T> {
    Nobody,
    One(T),
    Many(Vec<RentProviderId>),
}

fn count_claims<T>(answers: Vec<(RentProviderId, Option<T>)>) -> Claims<T> {
    let mut claimed: Vec<(RentProviderId, T)> = answers
        .into_iter()
        .filter_map(|(provider_id, answer)| answer.map(|value| (provider_id, value)))
        .collect();

    match claimed.len() {
        0 => Claims::Nobody,
        1 => match claimed.pop() {
            Some((_, value)) => Claims::One(value),
            None => Claims::Nobody,
        },
        _ => Claims::Many(claimed.into_iter().map(|(id, _)| id).collect()),
    }
}

fn same_provider(a: &Arc<dyn RentProvider>, b: &Arc<dyn RentProvider>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl RentProviderComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn add(&self, provider: Arc<dyn RentProvider>) -> Result<(), RentError> {
        let mut providers = self.providers.write();
        if providers
            .iter()
            .any(|registered| registered.provider_id() == provider.provider_id())
        {
            return Err(RentError::DuplicateProvider {
                provider_id: provider.provider_id().to_string(),
            });
        }
        info!("Registered rent provider {}", provider.provider_id());
        providers.push(provider);
        Ok(())
    }

    // Removes exactly the given adapter instance, not any adapter sharing its id
    pub fn remove(&self, provider: &Arc<dyn RentProvider>) -> Result<(), RentError> {
        let mut providers = self.providers.write();
        let position = providers
            .iter()
            .position(|registered| same_provider(registered, provider))
            .ok_or_else(|| RentError::ProviderNotFound {
                provider_id: provider.provider_id().to_string(),
            })?;
        providers.remove(position);
        info!("Removed rent provider {}", provider.provider_id());
        Ok(())
    }

    pub fn provider_ids(&self) -> Vec<RentProviderId> {
        self.providers
            .read()
            .iter()
            .map(|provider| provider.provider_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    // The lock is released before any adapter call is awaited
    fn snapshot(&self) -> Vec<Arc<dyn RentProvider>> {
        self.providers.read().clone()
    }

    async fn guarded<T, F>(&self, provider_id: &str, call: F) -> Result<T, RentError>
    where
        F: Future<Output = Result<T, RentError>>,
    {
        let timeout_ms = match self.config.call_timeout_ms {
            Some(timeout_ms) => timeout_ms,
            None => return call.await,
        };

        match timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Provider {} timed out after {}ms", provider_id, timeout_ms);
                Err(RentError::Timeout {
                    provider_id: provider_id.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    // Every call is already issued; waits for all of them to settle, then
    // returns the first failure in registration order
    async fn settle<T, F>(
        &self,
        calls: Vec<(&str, F)>,
    ) -> Result<Vec<(RentProviderId, T)>, RentError>
    where
        F: Future<Output = Result<T, RentError>>,
    {
        let guarded = calls.into_iter().map(|(provider_id, call)| async move {
            let answer = self.guarded(provider_id, call).await;
            if let Err(e) = &answer {
                warn!("Provider {} failed: {}", provider_id, e);
            }
            answer.map(|value| (provider_id.to_string(), value))
        });

        join_all(guarded).await.into_iter().collect()
    }
}

impl Default for RentProviderComposer {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}

#[async_trait]
impl RentProvider for RentProviderComposer {
    fn provider_id(&self) -> &str {
        COMPOSER_PROVIDER_ID
    }

    // Nested composers speak for every adapter they hold
    fn serves(&self, provider_id: &str) -> bool {
        self.providers
            .read()
            .iter()
            .any(|provider| provider.serves(provider_id))
    }

    async fn search(&self, query: &RentSearchInfo) -> Result<Vec<RentSearchResult>, RentError> {
        let providers = self.snapshot();
        info!(
            "Searching {} in {} providers (requested: {:?})",
            query.city,
            providers.len(),
            query.provider_ids
        );

        let calls = providers
            .iter()
            .map(|provider| (provider.provider_id(), provider.search(query)))
            .collect();
        let answers = self.settle(calls).await?;

        // A result tagged with an id its adapter does not serve fails the search
        let mut results = Vec::new();
        for (provider, (provider_id, found)) in providers.iter().zip(answers) {
            if let Some(stray) = found
                .iter()
                .find(|result| !provider.serves(&result.provider_place_id.provider_id))
            {
                warn!(
                    "Provider {} returned {:?} under a foreign provider id",
                    provider_id, stray.provider_place_id
                );
                return Err(RentError::MisattributedResult {
                    provider_id,
                    tagged_as: stray.provider_place_id.provider_id.clone(),
                });
            }
            results.extend(found);
        }

        info!("Search completed with {} results", results.len());
        Ok(results)
    }

    async fn book(
        &self,
        place_id: &RentProviderPlaceId,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<Option<RentProviderTransactionId>, RentError> {
        let providers = self.snapshot();
        debug!(
            "Booking {:?} from {} to {}",
            place_id, check_in_date, check_out_date
        );

        let calls = providers
            .iter()
            .map(|provider| {
                (
                    provider.provider_id(),
                    provider.book(place_id, check_in_date, check_out_date),
                )
            })
            .collect();
        let answers = self.settle(calls).await?;

        match count_claims(answers) {
            Claims::One(transaction) => {
                info!(
                    "Booked {:?} with transaction {}",
                    place_id, transaction.transaction_id
                );
                Ok(Some(transaction))
            }
            Claims::Nobody => {
                warn!("No provider accepted booking for {:?}", place_id);
                Err(RentError::UnsupportedProvider {
                    provider_id: place_id.provider_id.clone(),
                })
            }
            Claims::Many(claimed_by) => {
                warn!("Booking for {:?} claimed by {:?}", place_id, claimed_by);
                Err(RentError::AmbiguousProvider {
                    place_id: place_id.clone(),
                    claimed_by,
                })
            }
        }
    }

    async fn get(
        &self,
        place_id: &RentProviderPlaceId,
    ) -> Result<Option<RentSearchResult>, RentError> {
        let providers = self.snapshot();

        let calls = providers
            .iter()
            .map(|provider| (provider.provider_id(), provider.get(place_id)))
            .collect();
        let answers = self.settle(calls).await?;

        match count_claims(answers) {
            Claims::One(result) => Ok(Some(result)),
            Claims::Nobody => Ok(None),
            Claims::Many(claimed_by) => Err(RentError::AmbiguousProvider {
                place_id: place_id.clone(),
                claimed_by,
            }),
        }
    }
}
