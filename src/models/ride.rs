use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::UserRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RideStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Rides only move forward: scheduled -> in-progress -> completed, with
    /// cancellation possible from any open state.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (Scheduled, Completed)
                | (Scheduled, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    pub fn is_past(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            RideStatus::Scheduled => "Scheduled",
            RideStatus::InProgress => "In Progress",
            RideStatus::Completed => "Completed",
            RideStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl PassengerStatus {
    pub fn label(self) -> &'static str {
        match self {
            PassengerStatus::Pending => "Pending",
            PassengerStatus::Accepted => "Accepted",
            PassengerStatus::Rejected => "Rejected",
            PassengerStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for PassengerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerEntry {
    pub user: UserRef,
    #[serde(default)]
    pub pickup_location: String,
    pub status: PassengerStatus,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_rated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub start_location: String,
    pub end_location: String,
    #[serde(default)]
    pub route: String,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub available_seats: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub additional_notes: Option<String>,
    pub status: RideStatus,
    pub driver: UserRef,
    #[serde(default)]
    pub passengers: Vec<PassengerEntry>,
}

impl Ride {
    pub fn seats_consistent(&self) -> bool {
        self.available_seats <= self.total_seats
    }

    pub fn passenger_for(&self, user_id: &str) -> Option<&PassengerEntry> {
        self.passengers.iter().find(|p| p.user.id() == user_id)
    }

    /// Reflects a successful rating submission locally, without refetching.
    /// Returns false when the user has no entry on this ride.
    pub fn mark_rated(&mut self, user_id: &str) -> bool {
        match self.passengers.iter_mut().find(|p| p.user.id() == user_id) {
            Some(entry) => {
                entry.has_rated = true;
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.passengers
            .iter()
            .filter(|p| p.status == PassengerStatus::Pending)
            .count()
    }
}
