// Homy adapter: presents the Homy hotel backend as a RentProvider

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::rent_abstraction::*;
use crate::supplier::{
    stay_nights, validate_stay, FaultInjector, HomySdk, HomySearchInfo, HomySearchResult,
    HomyTransactionId, SdkError,
};

pub const HOMY_PROVIDER_ID: &str = "homy";

pub struct HomyProvider {
    sdk: Arc<dyn HomySdk>,
}

impl HomyProvider {
    pub fn new(sdk: Arc<dyn HomySdk>) -> Self {
        Self { sdk }
    }

    pub fn with_in_memory_backend() -> Result<Self, SdkError> {
        Ok(Self::new(Arc::new(InMemoryHomySdk::from_catalogue()?)))
    }

    fn to_search_result(&self, place: HomySearchResult) -> RentSearchResult {
        RentSearchResult {
            provider_place_id: RentProviderPlaceId::new(HOMY_PROVIDER_ID, place.id.to_string()),
            name: place.name,
            description: place.description,
            image: vec![place.image],
            location: Location::Remoteness(place.remoteness),
            booked_dates: place.booked_dates.into_iter().collect(),
            price: place.price,
        }
    }
}

#[async_trait]
impl RentProvider for HomyProvider {
    fn provider_id(&self) -> &str {
        HOMY_PROVIDER_ID
    }

    async fn search(&self, query: &RentSearchInfo) -> Result<Vec<RentSearchResult>, RentError> {
        if !query.requests(HOMY_PROVIDER_ID) {
            debug!("homy not requested, skipping backend call");
            return Ok(Vec::new());
        }

        let parameters = HomySearchInfo {
            city: query.city.clone(),
            check_in_date: query.check_in_date,
            check_out_date: query.check_out_date,
            price_limit: query.max_price,
        };
        let places = self.sdk.search(parameters).await?;

        Ok(places
            .into_iter()
            .map(|place| self.to_search_result(place))
            .collect())
    }

    async fn book(
        &self,
        place_id: &RentProviderPlaceId,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<Option<RentProviderTransactionId>, RentError> {
        if place_id.provider_id != HOMY_PROVIDER_ID {
            return Ok(None);
        }

        let native_id: u32 = place_id
            .place_id
            .parse()
            .map_err(|_| SdkError::UnknownPlace(place_id.place_id.clone()))?;
        let transaction_id = self
            .sdk
            .book(native_id, check_in_date, check_out_date)
            .await?;

        Ok(Some(RentProviderTransactionId {
            provider_id: HOMY_PROVIDER_ID.to_string(),
            transaction_id: transaction_id.to_string(),
        }))
    }

    // Homy has no point lookup
    async fn get(
        &self,
        _place_id: &RentProviderPlaceId,
    ) -> Result<Option<RentSearchResult>, RentError> {
        Ok(None)
    }
}

const HOMY_CATALOGUE_JSON: &str = r#"[
    {
        "id": 1,
        "name": "YARD Residence Apart-hotel",
        "description": "Comfortable apart-hotel in the very heart of Saint Petersburg. Rooms with a city view and free Wi-Fi.",
        "image": "http://localhost:8080/img/result-1.png",
        "remoteness": 2.5,
        "bookedDates": [],
        "price": 2800
    },
    {
        "id": 2,
        "name": "Akyan St.Petersburg",
        "description": "Hotel with free Wi-Fi throughout, located in a historic building.",
        "image": "http://localhost:8080/img/result-2.png",
        "remoteness": 1.5,
        "bookedDates": [],
        "price": 5800
    },
    {
        "id": 3,
        "name": "Solo Sokos Hotel Palace Bridge",
        "description": "Wellness hotel on Vasilyevsky Island with a spa centre and a central location.",
        "image": "http://localhost:8080/img/result-3.png",
        "remoteness": 5.0,
        "bookedDates": [],
        "price": 10500
    },
    {
        "id": 4,
        "name": "Park Inn by Radisson Pulkovskaya Hotel",
        "description": "Business centre and conference halls next to Victory Square and the Park of Hero Cities.",
        "image": "http://localhost:8080/img/result-4.png",
        "remoteness": 15.3,
        "bookedDates": [],
        "price": 6600
    }
]"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomyRecord {
    id: u32,
    name: String,
    description: String,
    image: String,
    remoteness: f64,
    booked_dates: BTreeSet<NaiveDate>,
    price: f64,
}

// In-memory Homy backend; like the real one it serves a single city's
// catalogue and filters by price only
pub struct InMemoryHomySdk {
    database: RwLock<Vec<HomyRecord>>,
    faults: FaultInjector,
}

impl InMemoryHomySdk {
    pub fn from_catalogue() -> Result<Self, SdkError> {
        Self::from_json(HOMY_CATALOGUE_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self, SdkError> {
        let database: Vec<HomyRecord> =
            serde_json::from_str(json).map_err(|e| SdkError::CatalogueError(e.to_string()))?;
        Ok(Self {
            database: RwLock::new(database),
            faults: FaultInjector::default(),
        })
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

#[async_trait]
impl HomySdk for InMemoryHomySdk {
    async fn search(&self, parameters: HomySearchInfo) -> Result<Vec<HomySearchResult>, SdkError> {
        self.faults.before_request().await?;
        validate_stay(parameters.check_in_date, parameters.check_out_date)?;

        let database = self.database.read();
        let places = database
            .iter()
            .filter(|record| record.price <= parameters.price_limit)
            .map(|record| HomySearchResult {
                id: record.id,
                name: record.name.clone(),
                description: record.description.clone(),
                image: record.image.clone(),
                remoteness: record.remoteness,
                booked_dates: record.booked_dates.iter().copied().collect(),
                price: record.price,
            })
            .collect();
        Ok(places)
    }

    async fn book(
        &self,
        place_id: u32,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<HomyTransactionId, SdkError> {
        self.faults.before_request().await?;
        validate_stay(check_in_date, check_out_date)?;

        let mut database = self.database.write();
        let record = database
            .iter_mut()
            .find(|record| record.id == place_id)
            .ok_or_else(|| SdkError::UnknownPlace(place_id.to_string()))?;

        if stay_nights(check_in_date, check_out_date).any(|day| record.booked_dates.contains(&day)) {
            return Err(SdkError::Unavailable(place_id.to_string()));
        }
        record
            .booked_dates
            .extend(stay_nights(check_in_date, check_out_date));

        Ok(rand::random::<u32>() as HomyTransactionId)
    }
}
