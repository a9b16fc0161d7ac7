use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "collegeID", default)]
    pub college_id: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    // Older payloads carry a boolean instead of the role.
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub joined_date: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.is_admin || self.role == UserRole::Admin
    }
}

/// The subset of a user the backend embeds when it populates a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// A reference to a user: either the bare id or the populated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Profile(UserSummary),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::Profile(summary) => &summary.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            UserRef::Id(_) => None,
            UserRef::Profile(summary) if summary.name.is_empty() => None,
            UserRef::Profile(summary) => Some(&summary.name),
        }
    }

    pub fn is(&self, user: &User) -> bool {
        self.id() == user.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_user_document() {
        let payload = r#"{
            "_id": "66a1f0c2e4b0a1b2c3d4e5f6",
            "name": "Asha Rawat",
            "email": "asha@geu.ac.in",
            "collegeID": "GEU2021-114",
            "phoneNumber": "+919876543210",
            "role": "admin",
            "points": 35,
            "joinedDate": "2024-08-01T09:30:00.000Z"
        }"#;

        let user: User = serde_json::from_str(payload).unwrap();
        assert_eq!(user.id, "66a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(user.college_id, "GEU2021-114");
        assert_eq!(user.phone_number.as_deref(), Some("+919876543210"));
        assert!(user.is_admin());
        assert_eq!(user.points, 35);
        assert!(user.joined_date.is_some());
    }

    #[test]
    fn legacy_admin_flag_counts_as_admin() {
        let payload = r#"{"id": "u1", "name": "Root", "email": "root@geu.ac.in", "isAdmin": true}"#;
        let user: User = serde_json::from_str(payload).unwrap();
        assert_eq!(user.role, UserRole::User);
        assert!(user.is_admin());
    }

    #[test]
    fn user_ref_accepts_id_or_populated_document() {
        let bare: UserRef = serde_json::from_str(r#""u42""#).unwrap();
        assert_eq!(bare.id(), "u42");
        assert_eq!(bare.name(), None);

        let populated: UserRef =
            serde_json::from_str(r#"{"_id": "u42", "name": "Kiran", "email": "k@geu.ac.in"}"#)
                .unwrap();
        assert_eq!(populated.id(), "u42");
        assert_eq!(populated.name(), Some("Kiran"));
    }
}
