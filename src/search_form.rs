// Search form defaults and submission parsing

use chrono::{Datelike, Days, Months, NaiveDate};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::rent_abstraction::RentSearchInfo;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, PartialEq)]
pub enum FormError {
    #[error("City is required")]
    MissingCity,

    #[error("Invalid {field} date: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid max price: {0}")]
    InvalidPrice(String),

    #[error("Check-out {check_out} must be after check-in {check_in}")]
    DatesOutOfOrder {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("Select at least one provider")]
    NoProviders,
}

// Date window offered by the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFormDates {
    pub min_arrival: NaiveDate,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub max_departure: NaiveDate,
}

// Last day of the month after the one `date` falls in
fn end_of_next_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(2)))
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

impl SearchFormDates {
    // Arrival defaults to tomorrow and is never before today; departure
    // defaults to two nights later and never goes past the end of the
    // following month
    pub fn resolve(
        today: NaiveDate,
        arrival: Option<NaiveDate>,
        departure: Option<NaiveDate>,
    ) -> Self {
        let arrival = match arrival {
            Some(arrival) if arrival >= today => arrival,
            Some(_) => today,
            None => add_days(today, 1),
        };
        let max_departure = end_of_next_month(arrival);

        let departure = match departure {
            Some(departure) if departure > arrival => departure.min(max_departure),
            _ => add_days(arrival, 2).min(max_departure),
        };

        Self {
            min_arrival: today,
            arrival,
            departure,
            max_departure,
        }
    }

    pub fn formatted(&self) -> (String, String) {
        (
            self.arrival.format(DATE_FORMAT).to_string(),
            self.departure.format(DATE_FORMAT).to_string(),
        )
    }
}

// Raw field values as submitted
#[derive(Debug, Clone, Default)]
pub struct SearchFormInput {
    pub city: String,
    pub check_in: String,
    pub check_out: String,
    pub max_price: String,
    pub providers: Vec<String>,
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, FormError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| FormError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

impl SearchFormInput {
    // An empty max price means no limit
    pub fn parse(&self) -> Result<RentSearchInfo, FormError> {
        let city = self.city.trim();
        if city.is_empty() {
            return Err(FormError::MissingCity);
        }

        let check_in = parse_date("check-in", &self.check_in)?;
        let check_out = parse_date("check-out", &self.check_out)?;
        if check_out <= check_in {
            return Err(FormError::DatesOutOfOrder {
                check_in,
                check_out,
            });
        }

        let max_price = match self.max_price.trim() {
            "" => f64::INFINITY,
            raw => match raw.parse::<f64>() {
                Ok(price) if price.is_finite() && price >= 0.0 => price,
                _ => return Err(FormError::InvalidPrice(raw.to_string())),
            },
        };

        let provider_ids: BTreeSet<String> = self
            .providers
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if provider_ids.is_empty() {
            return Err(FormError::NoProviders);
        }

        Ok(RentSearchInfo {
            city: city.to_string(),
            check_in_date: check_in,
            check_out_date: check_out,
            max_price,
            provider_ids,
        })
    }
}
