use chrono::Utc;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::client::ApiClient;
use super::paths;
use crate::error::{ApiError, ValidationErrors};
use crate::models::{Notification, RideStats, User};

/// Profile fields a user may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl ProfileUpdate {
    /// Trims every field and checks it, returning the cleaned update.
    pub fn normalized(&self) -> Result<Self, ValidationErrors> {
        let trim = |value: &Option<String>| value.as_deref().map(|v| v.trim().to_string());
        let cleaned = Self {
            name: trim(&self.name),
            phone_number: trim(&self.phone_number),
            profile_picture: trim(&self.profile_picture),
        };

        let mut errors = ValidationErrors::new();
        if cleaned.name.as_deref() == Some("") {
            errors.push("name", "Name cannot be empty");
        }
        // An empty phone number clears it.
        if let Some(phone) = cleaned.phone_number.as_deref().filter(|p| !p.is_empty()) {
            if !is_valid_phone(phone) {
                errors.push("phoneNumber", "Invalid phone number format");
            }
        }
        errors.into_result()?;
        Ok(cleaned)
    }
}

/// Optional leading `+`, then 10 to 15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    stats: RideStats,
}

#[derive(Debug, Deserialize)]
struct NotificationsEnvelope {
    #[serde(default)]
    notifications: Vec<Notification>,
}

pub async fn get_profile(client: &ApiClient) -> Result<User, ApiError> {
    let envelope: UserEnvelope = client.get(paths::USERS_ME, Vec::new()).await?;
    Ok(envelope.user)
}

pub async fn update_profile(client: &ApiClient, update: &ProfileUpdate) -> Result<User, ApiError> {
    let cleaned = update.normalized()?;
    let envelope: UserEnvelope = client.put(paths::USERS_ME, Some(&cleaned)).await?;
    Ok(envelope.user)
}

pub async fn ride_stats(client: &ApiClient) -> Result<RideStats, ApiError> {
    let envelope: StatsEnvelope = client.get(paths::USERS_ME_STATS, Vec::new()).await?;
    Ok(envelope.stats)
}

pub async fn notifications(client: &ApiClient) -> Result<Vec<Notification>, ApiError> {
    // Cache buster; some proxies cache GETs aggressively.
    let query = vec![("_t".to_string(), Utc::now().timestamp_millis().to_string())];
    let envelope: NotificationsEnvelope = client.get(paths::USERS_ME_NOTIFICATIONS, query).await?;
    Ok(envelope.notifications)
}

/// Best effort: failures are logged and reported as `false`.
pub async fn mark_notification_read(client: &ApiClient, notification_id: &str) -> bool {
    let result: Result<IgnoredAny, ApiError> = match paths::notification_read(notification_id) {
        Ok(path) => client.put::<Value, IgnoredAny>(&path, None).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(_) => true,
        Err(e) => {
            warn!("Could not mark notification {} as read: {}", notification_id, e);
            false
        }
    }
}
