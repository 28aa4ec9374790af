// FlatRent adapter: presents the FlatRent backend as a RentProvider

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::rent_abstraction::*;
use crate::supplier::{
    stay_nights, validate_stay, FaultInjector, FlatRentSdk, FlatRentSearchInfo,
    FlatRentSearchResult, FlatRentTransactionId, SdkError,
};

pub const FLAT_RENT_PROVIDER_ID: &str = "flat-rent";

pub struct FlatRentProvider {
    sdk: Arc<dyn FlatRentSdk>,
}

impl FlatRentProvider {
    pub fn new(sdk: Arc<dyn FlatRentSdk>) -> Self {
        Self { sdk }
    }

    pub fn with_in_memory_backend(today: NaiveDate) -> Result<Self, SdkError> {
        Ok(Self::new(Arc::new(InMemoryFlatRentSdk::from_catalogue(
            today,
        )?)))
    }

    fn to_search_result(&self, flat: FlatRentSearchResult) -> RentSearchResult {
        let (lat, lng) = flat.coordinates;
        RentSearchResult {
            provider_place_id: RentProviderPlaceId::new(FLAT_RENT_PROVIDER_ID, flat.id),
            name: flat.title,
            description: flat.details,
            image: flat.photos,
            location: Location::Coordinates { lat, lng },
            booked_dates: flat.booked_dates.into_iter().collect(),
            price: flat.total_price,
        }
    }
}

#[async_trait]
impl RentProvider for FlatRentProvider {
    fn provider_id(&self) -> &str {
        FLAT_RENT_PROVIDER_ID
    }

    async fn search(&self, query: &RentSearchInfo) -> Result<Vec<RentSearchResult>, RentError> {
        if !query.requests(FLAT_RENT_PROVIDER_ID) {
            debug!("flat-rent not requested, skipping backend call");
            return Ok(Vec::new());
        }

        let parameters = FlatRentSearchInfo {
            city: query.city.clone(),
            check_in_date: query.check_in_date,
            check_out_date: query.check_out_date,
            price_limit: query.max_price,
        };
        let flats = self.sdk.search(parameters).await?;

        Ok(flats
            .into_iter()
            .map(|flat| self.to_search_result(flat))
            .collect())
    }

    async fn book(
        &self,
        place_id: &RentProviderPlaceId,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<Option<RentProviderTransactionId>, RentError> {
        if place_id.provider_id != FLAT_RENT_PROVIDER_ID {
            return Ok(None);
        }

        let transaction_id = self
            .sdk
            .book(&place_id.place_id, check_in_date, check_out_date)
            .await?;

        Ok(Some(RentProviderTransactionId {
            provider_id: FLAT_RENT_PROVIDER_ID.to_string(),
            transaction_id: transaction_id.to_string(),
        }))
    }

    // FlatRent has no point lookup either
    async fn get(
        &self,
        _place_id: &RentProviderPlaceId,
    ) -> Result<Option<RentSearchResult>, RentError> {
        Ok(None)
    }
}

const FLAT_RENT_CATALOGUE_JSON: &str = r#"[
    {
        "id": "vnd331",
        "city": "Saint Petersburg",
        "title": "Loft near Nevsky Prospect",
        "details": "Bright two-room loft with a kitchen island, five minutes from the metro.",
        "photos": ["vnd331.png", "vnd331-2.png"],
        "coordinates": [59.9386, 30.3141],
        "bookedDates": [],
        "price": 1500
    },
    {
        "id": "ab2e2",
        "city": "Saint Petersburg",
        "title": "Studio on Petrogradsky",
        "details": "Compact studio with a balcony overlooking the Karpovka embankment.",
        "photos": ["ab2e2.png"],
        "coordinates": [59.9697, 30.3005],
        "bookedDates": [],
        "price": 2100
    },
    {
        "id": "mvm32l",
        "city": "Saint Petersburg",
        "title": "Family flat on Vasilyevsky Island",
        "details": "Three bedrooms, washing machine and a playground in the courtyard.",
        "photos": ["mvm32l.png", "mvm32l-2.png", "mvm32l-3.png"],
        "coordinates": [59.9417, 30.2619],
        "bookedDates": [],
        "price": 4200
    },
    {
        "id": "bvep12",
        "city": "Moscow",
        "title": "Apartment at Patriarch Ponds",
        "details": "Quiet one-bedroom apartment in a pre-war building.",
        "photos": ["bvep12.png"],
        "coordinates": [55.7637, 37.5929],
        "bookedDates": [],
        "price": 5200
    }
]"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatRecord {
    id: String,
    city: String,
    title: String,
    details: String,
    photos: Vec<String>,
    coordinates: (f64, f64),
    booked_dates: BTreeSet<NaiveDate>,
    price: f64,
}

impl FlatRecord {
    fn is_available(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        !stay_nights(check_in, check_out).any(|day| self.booked_dates.contains(&day))
    }

    fn to_result(&self, nights: i64) -> FlatRentSearchResult {
        FlatRentSearchResult {
            id: self.id.clone(),
            title: self.title.clone(),
            details: self.details.clone(),
            photos: self.photos.clone(),
            coordinates: self.coordinates,
            booked_dates: self.booked_dates.iter().copied().collect(),
            total_price: self.price * nights as f64,
        }
    }
}

// In-memory FlatRent backend; `today` bounds the earliest bookable date
pub struct InMemoryFlatRentSdk {
    database: RwLock<Vec<FlatRecord>>,
    today: NaiveDate,
    faults: FaultInjector,
}

impl InMemoryFlatRentSdk {
    pub fn from_catalogue(today: NaiveDate) -> Result<Self, SdkError> {
        Self::from_json(FLAT_RENT_CATALOGUE_JSON, today)
    }

    pub fn from_json(json: &str, today: NaiveDate) -> Result<Self, SdkError> {
        let database: Vec<FlatRecord> =
            serde_json::from_str(json).map_err(|e| SdkError::CatalogueError(e.to_string()))?;
        Ok(Self {
            database: RwLock::new(database),
            today,
            faults: FaultInjector::default(),
        })
    }

    pub fn new_today() -> Result<Self, SdkError> {
        Self::from_catalogue(Utc::now().date_naive())
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    fn assert_dates_are_correct(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<(), SdkError> {
        if check_in < self.today {
            return Err(SdkError::InvalidDates(format!(
                "check-in {} is in the past",
                check_in
            )));
        }
        validate_stay(check_in, check_out)
    }
}

#[async_trait]
impl FlatRentSdk for InMemoryFlatRentSdk {
    async fn search(
        &self,
        parameters: FlatRentSearchInfo,
    ) -> Result<Vec<FlatRentSearchResult>, SdkError> {
        self.faults.before_request().await?;
        self.assert_dates_are_correct(parameters.check_in_date, parameters.check_out_date)?;

        let nights = (parameters.check_out_date - parameters.check_in_date).num_days();
        let database = self.database.read();
        let flats = database
            .iter()
            .filter(|flat| flat.city.eq_ignore_ascii_case(&parameters.city))
            .filter(|flat| flat.price <= parameters.price_limit)
            .filter(|flat| flat.is_available(parameters.check_in_date, parameters.check_out_date))
            .map(|flat| flat.to_result(nights))
            .collect();
        Ok(flats)
    }

    async fn book(
        &self,
        flat_id: &str,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Result<FlatRentTransactionId, SdkError> {
        self.faults.before_request().await?;
        self.assert_dates_are_correct(check_in_date, check_out_date)?;

        let mut database = self.database.write();
        let flat = database
            .iter_mut()
            .find(|flat| flat.id == flat_id)
            .ok_or_else(|| SdkError::UnknownPlace(flat_id.to_string()))?;

        if !flat.is_available(check_in_date, check_out_date) {
            return Err(SdkError::Unavailable(flat_id.to_string()));
        }
        flat.booked_dates
            .extend(stay_nights(check_in_date, check_out_date));

        Ok(rand::random::<u32>() as FlatRentTransactionId)
    }
}
