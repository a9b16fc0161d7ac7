use serde::{Deserialize, Serialize};

use super::ride::Ride;
use super::user::User;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_rides: u64,
    #[serde(default)]
    pub completed_rides: u64,
    #[serde(default)]
    pub scheduled_rides: u64,
    #[serde(default)]
    pub recent_users: Vec<User>,
    #[serde(default)]
    pub recent_rides: Vec<Ride>,
}

/// Per-user ride counters shown on the profile screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideStats {
    #[serde(default)]
    pub total_rides: u64,
    #[serde(default)]
    pub offered_rides: u64,
    #[serde(default)]
    pub joined_rides: u64,
}
