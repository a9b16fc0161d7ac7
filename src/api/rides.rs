use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::client::ApiClient;
use super::paths;
use crate::error::{ApiError, ValidationErrors};
use crate::models::Ride;

pub const MAX_SEATS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideFilters {
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
}

impl RideFilters {
    /// Only filters that carry a value are sent.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if let Some(start) = text(&self.start_location) {
            query.push(("startLocation".to_string(), start));
        }
        if let Some(end) = text(&self.end_location) {
            query.push(("endLocation".to_string(), end));
        }
        if let Some(departure) = self.departure_time {
            query.push((
                "departureTime".to_string(),
                departure.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub start_location: String,
    pub end_location: String,
    pub route: String,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub price: f64,
    pub additional_notes: String,
}

impl NewRide {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.start_location.trim().is_empty() {
            errors.push("startLocation", "Start location is required");
        }
        if self.end_location.trim().is_empty() {
            errors.push("endLocation", "End location is required");
        }
        if self.route.trim().is_empty() {
            errors.push("route", "Route description is required");
        }
        if self.departure_time <= now {
            errors.push("departureTime", "Departure time must be in the future");
        }
        if self.total_seats < 1 {
            errors.push("totalSeats", "Must have at least 1 seat");
        } else if self.total_seats > MAX_SEATS {
            errors.push(
                "totalSeats",
                format!("Maximum {} seats allowed", MAX_SEATS),
            );
        }
        if !self.price.is_finite() || self.price < 0.0 {
            errors.push("price", "Price cannot be negative");
        }
        errors.into_result()
    }

    fn trimmed(&self) -> Self {
        Self {
            start_location: self.start_location.trim().to_string(),
            end_location: self.end_location.trim().to_string(),
            route: self.route.trim().to_string(),
            additional_notes: self.additional_notes.trim().to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pickup_location: String,
}

impl JoinRequest {
    pub fn new(pickup_location: &str) -> Result<Self, ValidationErrors> {
        let pickup_location = pickup_location.trim();
        if pickup_location.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.push("pickupLocation", "Pickup location is required");
            return Err(errors);
        }
        Ok(Self {
            pickup_location: pickup_location.to_string(),
        })
    }

    pub fn pickup_location(&self) -> &str {
        &self.pickup_location
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerDecision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingRequest {
    rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl RatingRequest {
    pub fn new(rating: u8, comment: Option<&str>) -> Result<Self, ValidationErrors> {
        if !(1..=5).contains(&rating) {
            let mut errors = ValidationErrors::new();
            errors.push("rating", "Rating must be between 1 and 5");
            return Err(errors);
        }
        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(Self { rating, comment })
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRide {
    pub ride: Ride,
    #[serde(default)]
    pub points_earned: u32,
}

#[derive(Debug, Deserialize)]
struct RidesEnvelope {
    #[serde(default)]
    rides: Vec<Ride>,
}

#[derive(Debug, Deserialize)]
struct RideEnvelope {
    ride: Ride,
}

fn check_seats(ride: &Ride) {
    if !ride.seats_consistent() {
        warn!(
            "Ride {} reports {} available of {} seats",
            ride.id, ride.available_seats, ride.total_seats
        );
    }
}

pub async fn list_rides(client: &ApiClient, filters: &RideFilters) -> Result<Vec<Ride>, ApiError> {
    let envelope: RidesEnvelope = client.get(paths::RIDES, filters.to_query()).await?;
    envelope.rides.iter().for_each(check_seats);
    Ok(envelope.rides)
}

pub async fn get_ride(client: &ApiClient, ride_id: &str) -> Result<Ride, ApiError> {
    let envelope: RideEnvelope = client.get(&paths::ride(ride_id)?, Vec::new()).await?;
    check_seats(&envelope.ride);
    Ok(envelope.ride)
}

pub async fn create_ride(client: &ApiClient, ride: &NewRide) -> Result<Ride, ApiError> {
    ride.validate(Utc::now())?;
    let envelope: RideEnvelope = client.post(paths::RIDES, &ride.trimmed()).await?;
    Ok(envelope.ride)
}

pub async fn join_ride(
    client: &ApiClient,
    ride_id: &str,
    request: &JoinRequest,
) -> Result<Ride, ApiError> {
    let envelope: RideEnvelope = client.post(&paths::ride_join(ride_id)?, request).await?;
    Ok(envelope.ride)
}

pub async fn update_passenger_status(
    client: &ApiClient,
    ride_id: &str,
    passenger_id: &str,
    decision: PassengerDecision,
) -> Result<Ride, ApiError> {
    let body = serde_json::json!({ "status": decision });
    let envelope: RideEnvelope = client
        .put(&paths::ride_passenger(ride_id, passenger_id)?, Some(&body))
        .await?;
    Ok(envelope.ride)
}

pub async fn complete_ride(client: &ApiClient, ride_id: &str) -> Result<CompletedRide, ApiError> {
    client
        .put::<Value, CompletedRide>(&paths::ride_complete(ride_id)?, None)
        .await
}

pub async fn rate_ride(
    client: &ApiClient,
    ride_id: &str,
    rating: &RatingRequest,
) -> Result<(), ApiError> {
    let _: IgnoredAny = client.post(&paths::ride_rate(ride_id)?, rating).await?;
    Ok(())
}
