// Native shapes and SDK contracts of the two booking backends

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

// Errors raised by a backend SDK call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    #[error("Invalid dates: {0}")]
    InvalidDates(String),

    #[error("Place {0} is not available for the requested dates")]
    Unavailable(String),

    #[error("Unknown place: {0}")]
    UnknownPlace(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Catalogue error: {0}")]
    CatalogueError(String),
}

// Homy: hotel style listings with remoteness from the city centre
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomySearchInfo {
    pub city: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub price_limit: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomySearchResult {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub image: String,
    pub remoteness: f64,
    pub booked_dates: Vec<NaiveDate>,
    pub price: f64,
}

pub type HomyTransactionId = u64;

// FlatRent: private flats with map coordinates and a total stay price
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRentSearchInfo {
    pub city: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub price_limit: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRentSearchResult {
    pub id: String,
    pub title: String,
    pub details: String,
    pub photos: Vec<String>,
    pub coordinates: (f64, f64),
    pub booked_dates: Vec<NaiveDate>,
    pub total_price: f64,
}

pub type FlatRentTransactionId = u64;

#[async_trait]
pub trait HomySdk: Send + Sync + 'static {
    async fn search(&self, parameters: HomySearchInfo) -> Result<Vec<HomySearchResult>, SdkError>;

    async fn book(
        &self,
        place_id: u32,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<HomyTransactionId, SdkError>;
}

#[async_trait]
pub trait FlatRentSdk: Send + Sync + 'static {
    async fn search(
        &self,
        parameters: FlatRentSearchInfo,
    ) -> Result<Vec<FlatRentSearchResult>, SdkError>;

    async fn book(
        &self,
        flat_id: &str,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<FlatRentTransactionId, SdkError>;
}

// Failure and latency knobs for the in-memory backends
#[derive(Debug, Default)]
pub struct FaultInjector {
    fail_next_requests: AtomicUsize,
    delay_ms: AtomicU64,
    request_count: AtomicUsize,
}

impl FaultInjector {
    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next_requests.store(count, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    // Called at the top of every backend request
    pub async fn before_request(&self) -> Result<(), SdkError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let pending = self
            .fail_next_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(SdkError::NetworkError("Service unavailable".to_string()));
        }
        Ok(())
    }
}

// Every night of a stay, check-out day excluded
pub fn stay_nights(check_in: NaiveDate, check_out: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    check_in.iter_days().take_while(move |day| *day < check_out)
}

pub fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), SdkError> {
    if check_out <= check_in {
        return Err(SdkError::InvalidDates(format!(
            "check-out {} must be after check-in {}",
            check_out, check_in
        )));
    }
    Ok(())
}
