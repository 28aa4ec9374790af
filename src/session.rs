// Search session: the last search request, its results and when it ran,
// owned by the caller instead of living in module level globals

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{info, warn};

use crate::place_id_codec;
use crate::rent_abstraction::*;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No search has been made yet")]
    NoSearch,

    #[error("Search results are {age_seconds}s old, search again before booking")]
    StaleResults { age_seconds: i64 },

    #[error("Invalid place token: {0}")]
    InvalidToken(String),

    #[error("Place {0:?} is not among the current search results")]
    NotInResults(RentProviderPlaceId),

    #[error(transparent)]
    Rent(#[from] RentError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_result_age_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_result_age_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    CheapFirst,
    ExpensiveFirst,
    NearestFirst,
}

// Results without a remoteness go after every result that has one
fn by_remoteness(a: &RentSearchResult, b: &RentSearchResult) -> Ordering {
    match (a.location.remoteness(), b.location.remoteness()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Stable, so ties keep provider order
pub fn sort_results(results: &mut [RentSearchResult], order: SortOrder) {
    match order {
        SortOrder::CheapFirst => results.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortOrder::ExpensiveFirst => results.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortOrder::NearestFirst => results.sort_by(by_remoteness),
    }
}

#[derive(Debug, Default)]
pub struct SearchSession {
    config: SessionConfig,
    request: Option<RentSearchInfo>,
    results: Vec<RentSearchResult>,
    searched_at: Option<DateTime<Utc>>,
    sort_order: SortOrder,
}

impl SearchSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn request(&self) -> Option<&RentSearchInfo> {
        self.request.as_ref()
    }

    pub fn results(&self) -> &[RentSearchResult] {
        &self.results
    }

    pub fn searched_at(&self) -> Option<DateTime<Utc>> {
        self.searched_at
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    // A failed search forgets the previous request too, so nothing from it
    // stays bookable
    pub async fn search(
        &mut self,
        provider: &dyn RentProvider,
        query: RentSearchInfo,
    ) -> Result<&[RentSearchResult], RentError> {
        match provider.search(&query).await {
            Ok(mut results) => {
                sort_results(&mut results, self.sort_order);
                info!("Session search returned {} results", results.len());
                self.results = results;
                self.request = Some(query);
                self.searched_at = Some(Utc::now());
                Ok(&self.results)
            }
            Err(e) => {
                warn!("Session search failed: {}", e);
                self.results.clear();
                self.request = None;
                self.searched_at = None;
                Err(e)
            }
        }
    }

    pub fn sort(&mut self, order: SortOrder) {
        self.sort_order = order;
        sort_results(&mut self.results, order);
    }

    pub fn find(&self, token: &str) -> Option<&RentSearchResult> {
        let place_id = place_id_codec::decode(token)?;
        self.results
            .iter()
            .find(|result| result.provider_place_id == place_id)
    }

    pub fn result_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.searched_at.map(|searched_at| now - searched_at)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.result_age(now) {
            Some(age) => age.num_seconds() > self.config.max_result_age_seconds as i64,
            None => true,
        }
    }

    // Books the place behind `token` for the dates of the current search
    pub async fn book(
        &self,
        provider: &dyn RentProvider,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RentProviderTransactionId, SessionError> {
        let request = self.request.as_ref().ok_or(SessionError::NoSearch)?;
        let place_id = place_id_codec::decode(token)
            .ok_or_else(|| SessionError::InvalidToken(token.to_string()))?;

        if self.is_stale(now) {
            let age_seconds = self.result_age(now).map_or(0, |age| age.num_seconds());
            return Err(SessionError::StaleResults { age_seconds });
        }

        if self.find(token).is_none() {
            warn!("Refusing to book {:?}: not in current results", place_id);
            return Err(SessionError::NotInResults(place_id));
        }

        let transaction = provider
            .book(&place_id, request.check_in_date, request.check_out_date)
            .await?
            .ok_or_else(|| RentError::UnsupportedProvider {
                provider_id: place_id.provider_id.clone(),
            })?;
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::RentProviderComposer;
    use crate::flat_rent::FlatRentProvider;
    use crate::homy::HomyProvider;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn result(id: &str, price: f64, location: Location) -> RentSearchResult {
        RentSearchResult {
            provider_place_id: RentProviderPlaceId::new("p", id),
            name: id.to_string(),
            description: String::new(),
            image: vec![],
            location,
            booked_dates: BTreeSet::new(),
            price,
        }
    }

    fn names(results: &[RentSearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.name.as_str()).collect()
    }

    fn composer() -> RentProviderComposer {
        let composer = RentProviderComposer::default();
        composer
            .add(Arc::new(HomyProvider::with_in_memory_backend().unwrap()))
            .unwrap();
        composer
            .add(Arc::new(
                FlatRentProvider::with_in_memory_backend(date("2024-05-01")).unwrap(),
            ))
            .unwrap();
        composer
    }

    fn query() -> RentSearchInfo {
        RentSearchInfo {
            city: "Saint Petersburg".to_string(),
            check_in_date: date("2024-06-01"),
            check_out_date: date("2024-06-03"),
            max_price: 10000.0,
            provider_ids: ["homy".to_string(), "flat-rent".to_string()]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_sort_orders() {
        let mut results = vec![
            result("mid", 200.0, Location::Remoteness(1.0)),
            result("map", 100.0, Location::Coordinates { lat: 1.0, lng: 2.0 }),
            result("far", 300.0, Location::Remoteness(9.0)),
            result("near", 250.0, Location::Remoteness(0.5)),
        ];

        sort_results(&mut results, SortOrder::CheapFirst);
        assert_eq!(names(&results), vec!["map", "mid", "near", "far"]);

        sort_results(&mut results, SortOrder::ExpensiveFirst);
        assert_eq!(names(&results), vec!["far", "near", "mid", "map"]);

        sort_results(&mut results, SortOrder::NearestFirst);
        assert_eq!(names(&results), vec!["near", "mid", "far", "map"]);
    }

    #[tokio::test]
    async fn test_search_records_request_and_time() {
        let composer = composer();
        let mut session = SearchSession::default();
        assert!(session.is_stale(Utc::now()));

        let count = session.search(&composer, query()).await.unwrap().len();
        assert_eq!(count, 6);
        assert_eq!(session.request(), Some(&query()));
        assert!(session.searched_at().is_some());
        assert!(!session.is_stale(Utc::now()));

        // cheapest first by default
        let prices: Vec<f64> = session.results().iter().map(|r| r.price).collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_failed_search_clears_results() {
        let composer = composer();
        let mut session = SearchSession::default();
        session.search(&composer, query()).await.unwrap();
        assert!(!session.results().is_empty());

        let token = place_id_codec::encode(&session.results()[0]);

        let mut broken = query();
        broken.check_out_date = broken.check_in_date;
        assert!(session.search(&composer, broken).await.is_err());
        assert!(session.results().is_empty());
        assert!(session.request().is_none());
        assert!(session.searched_at().is_none());

        // a token from the earlier search no longer books
        assert!(session.find(&token).is_none());
        assert!(matches!(
            session.book(&composer, &token, Utc::now()).await,
            Err(SessionError::NoSearch)
        ));
    }

    #[tokio::test]
    async fn test_book_through_session() {
        let composer = composer();
        let mut session = SearchSession::default();
        session.search(&composer, query()).await.unwrap();

        let token = place_id_codec::encode(&session.results()[0]);
        assert!(session.find(&token).is_some());

        let transaction = session.book(&composer, &token, Utc::now()).await.unwrap();
        assert_eq!(
            transaction.provider_id,
            session.results()[0].provider_place_id.provider_id
        );
    }

    #[tokio::test]
    async fn test_book_refuses_stale_or_missing_search() {
        let composer = composer();
        let mut session = SearchSession::new(SessionConfig {
            max_result_age_seconds: 300,
        });
        let token = place_id_codec::encode(&RentProviderPlaceId::new("homy", "1"));

        assert!(matches!(
            session.book(&composer, &token, Utc::now()).await,
            Err(SessionError::NoSearch)
        ));

        session.search(&composer, query()).await.unwrap();
        let later = Utc::now() + Duration::seconds(301);
        assert!(matches!(
            session.book(&composer, &token, later).await,
            Err(SessionError::StaleResults { .. })
        ));

        assert!(matches!(
            session.book(&composer, "garbage", Utc::now()).await,
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_book_refuses_token_outside_results() {
        let composer = composer();
        let mut session = SearchSession::default();
        session.search(&composer, query()).await.unwrap();

        // Solo Sokos (homy 3) is above the price limit of the current search
        let token = place_id_codec::encode(&RentProviderPlaceId::new("homy", "3"));
        match session.book(&composer, &token, Utc::now()).await {
            Err(SessionError::NotInResults(place_id)) => {
                assert_eq!(place_id, RentProviderPlaceId::new("homy", "3"));
            }
            other => panic!("Expected not in results, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_book_unknown_provider_surfaces_rent_error() {
        let mut session = SearchSession::default();
        session.search(&composer(), query()).await.unwrap();

        // booking goes to a composer with no adapters at all
        let token = place_id_codec::encode(&session.results()[0]);
        let empty = RentProviderComposer::default();
        assert!(matches!(
            session.book(&empty, &token, Utc::now()).await,
            Err(SessionError::Rent(RentError::UnsupportedProvider { .. }))
        ));
    }
}
