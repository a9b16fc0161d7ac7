use url::form_urlencoded::byte_serialize;

use crate::error::ValidationErrors;

pub const AUTH_PREFIX: &str = "/api/auth/";
pub const AUTH_LOGIN: &str = "/api/auth/login";
pub const AUTH_REGISTER: &str = "/api/auth/register";
pub const AUTH_ME: &str = "/api/auth/me";
pub const AUTH_LOGOUT: &str = "/api/auth/logout";
pub const AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";

pub const USERS_ME: &str = "/api/users/me";
pub const USERS_ME_STATS: &str = "/api/users/me/stats";
pub const USERS_ME_NOTIFICATIONS: &str = "/api/users/me/notifications";

pub const RIDES: &str = "/api/rides";

pub const ADMIN_STATS: &str = "/api/admin/stats";

/// Percent-encodes one caller-supplied path segment. Empty and dot-only
/// values are refused since the URL parser would resolve them away.
fn segment(field: &str, raw: &str) -> Result<String, ValidationErrors> {
    if raw.is_empty() || raw.chars().all(|c| c == '.') {
        let mut errors = ValidationErrors::new();
        errors.push(field, format!("Invalid {}", field));
        return Err(errors);
    }
    Ok(byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20"))
}

pub fn reset_password(reset_token: &str) -> Result<String, ValidationErrors> {
    Ok(format!(
        "/api/auth/reset-password/{}",
        segment("token", reset_token)?
    ))
}

pub fn notification_read(notification_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!(
        "{}/{}/read",
        USERS_ME_NOTIFICATIONS,
        segment("notification", notification_id)?
    ))
}

pub fn ride(ride_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!("{}/{}", RIDES, segment("ride", ride_id)?))
}

pub fn ride_join(ride_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!("{}/{}/join", RIDES, segment("ride", ride_id)?))
}

pub fn ride_passenger(ride_id: &str, passenger_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!(
        "{}/{}/passengers/{}",
        RIDES,
        segment("ride", ride_id)?,
        segment("passenger", passenger_id)?
    ))
}

pub fn ride_complete(ride_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!("{}/{}/complete", RIDES, segment("ride", ride_id)?))
}

pub fn ride_rate(ride_id: &str) -> Result<String, ValidationErrors> {
    Ok(format!("{}/{}/rate", RIDES, segment("ride", ride_id)?))
}
