// Common rent model shared by every provider adapter and the composer

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::supplier::SdkError;

pub type RentProviderId = String;

// Error taxonomy surfaced by adapters and the composer
#[derive(Error, Debug)]
pub enum RentError {
    #[error("Unsupported provider: {provider_id}")]
    UnsupportedProvider { provider_id: String },

    #[error("Booked on multiple providers: {claimed_by:?}")]
    AmbiguousProvider {
        place_id: RentProviderPlaceId,
        claimed_by: Vec<RentProviderId>,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] SdkError),

    #[error("Provider {provider_id} timed out after {timeout_ms}ms")]
    Timeout { provider_id: String, timeout_ms: u64 },

    #[error("Provider not registered: {provider_id}")]
    ProviderNotFound { provider_id: String },

    #[error("Provider already registered: {provider_id}")]
    DuplicateProvider { provider_id: String },

    #[error("Provider {provider_id} returned a result tagged {tagged_as}")]
    MisattributedResult {
        provider_id: String,
        tagged_as: RentProviderId,
    },
}

// One user search intent
#[derive(Debug, Clone, PartialEq)]
pub struct RentSearchInfo {
    pub city: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub max_price: f64,
    pub provider_ids: BTreeSet<RentProviderId>,
}

impl RentSearchInfo {
    pub fn requests(&self, provider_id: &str) -> bool {
        self.provider_ids.contains(provider_id)
    }

    pub fn nights(&self) -> i64 {
        (self.check_out_date - self.check_in_date).num_days()
    }
}

// Composite handle of a listing inside one backend's namespace; the same
// place_id under two providers names two unrelated listings
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentProviderPlaceId {
    pub provider_id: RentProviderId,
    pub place_id: String,
}

impl RentProviderPlaceId {
    pub fn new(provider_id: impl Into<String>, place_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            place_id: place_id.into(),
        }
    }
}

// Backend specific enrichment; each backend reports exactly one kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Location {
    Remoteness(f64),
    Coordinates { lat: f64, lng: f64 },
    Unknown,
}

impl Location {
    pub fn remoteness(&self) -> Option<f64> {
        match self {
            Location::Remoteness(km) => Some(*km),
            _ => None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Location::Coordinates { lat, lng } => Some((*lat, *lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RentSearchResult {
    pub provider_place_id: RentProviderPlaceId,
    pub name: String,
    pub description: String,
    pub image: Vec<String>,
    pub location: Location,
    pub booked_dates: BTreeSet<NaiveDate>,
    pub price: f64,
}

// Proof of a successful booking, scoped to one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentProviderTransactionId {
    pub provider_id: RentProviderId,
    pub transaction_id: String,
}

// Contract implemented by every adapter and by the composer. `book` and `get`
// resolve to Ok(None) when the place id belongs to another provider, so one
// request can be broadcast to every registered adapter.
#[async_trait]
pub trait RentProvider: Send + Sync + 'static {
    fn provider_id(&self) -> &str;

    // Whether results tagged with `provider_id` may come from this provider
    fn serves(&self, provider_id: &str) -> bool {
        provider_id == self.provider_id()
    }

    async fn search(&self, query: &RentSearchInfo) -> Result<Vec<RentSearchResult>, RentError>;

    async fn book(
        &self,
        place_id: &RentProviderPlaceId,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<Option<RentProviderTransactionId>, RentError>;

    async fn get(
        &self,
        place_id: &RentProviderPlaceId,
    ) -> Result<Option<RentSearchResult>, RentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_search_info_requests_and_nights() {
        let query = RentSearchInfo {
            city: "Saint Petersburg".to_string(),
            check_in_date: date("2024-06-01"),
            check_out_date: date("2024-06-03"),
            max_price: 10000.0,
            provider_ids: ["homy".to_string()].into_iter().collect(),
        };

        assert!(query.requests("homy"));
        assert!(!query.requests("flat-rent"));
        assert_eq!(query.nights(), 2);
    }

    #[test]
    fn test_location_accessors_are_exclusive() {
        let remote = Location::Remoteness(2.5);
        assert_eq!(remote.remoteness(), Some(2.5));
        assert_eq!(remote.coordinates(), None);

        let mapped = Location::Coordinates {
            lat: 59.93,
            lng: 30.31,
        };
        assert_eq!(mapped.remoteness(), None);
        assert_eq!(mapped.coordinates(), Some((59.93, 30.31)));

        assert_eq!(Location::Unknown.remoteness(), None);
        assert_eq!(Location::Unknown.coordinates(), None);
    }

    #[test]
    fn test_place_id_serializes_camel_case() {
        let place_id = RentProviderPlaceId::new("flat-rent", "vnd331");
        let json = serde_json::to_string(&place_id).unwrap();
        assert!(json.contains("\"providerId\":\"flat-rent\""));
        assert!(json.contains("\"placeId\":\"vnd331\""));
    }
}
