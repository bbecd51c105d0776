use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::transaction::DISPLAY_DATE_FORMAT;

/// Read-only projection of a catalog trip. The catalog owns the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: i64,
    pub title: String,
    pub country: String,
    pub accomodation: String,
    pub transportation: String,
    pub eat: String,
    pub day: i32,
    pub night: i32,
    pub date_trip: DateTime<Utc>,
    pub price: i64,
    pub quota: i32,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: i64,
    pub title: String,
    pub country: String,
    pub accomodation: String,
    pub transportation: String,
    pub eat: String,
    pub day: i32,
    pub night: i32,
    pub date_trip: String,
    pub price: i64,
    pub quota: i32,
    pub description: String,
    pub image: String,
}

impl TripResponse {
    pub fn new(trip: Trip, offset: FixedOffset) -> Self {
        Self {
            id: trip.id,
            title: trip.title,
            country: trip.country,
            accomodation: trip.accomodation,
            transportation: trip.transportation,
            eat: trip.eat,
            day: trip.day,
            night: trip.night,
            date_trip: trip
                .date_trip
                .with_timezone(&offset)
                .format(DISPLAY_DATE_FORMAT)
                .to_string(),
            price: trip.price,
            quota: trip.quota,
            description: trip.description,
            image: trip.image,
        }
    }
}
