use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Any backend document reference that may or may not have been populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Document {
        #[serde(rename = "_id", alias = "id")]
        id: String,
    },
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Id(id) => id,
            EntityRef::Document { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, alias = "rideId")]
    pub ride: Option<EntityRef>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Click-through target for the notification.
    pub fn link(&self) -> Option<String> {
        self.ride.as_ref().map(|ride| format!("/rides/{}", ride.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_to_canonical_ride_path() {
        let populated: Notification = serde_json::from_str(
            r#"{"_id": "n1", "ride": {"_id": "r9", "startLocation": "Gate"}, "title": "New join request", "message": "Meera wants to join", "read": false}"#,
        )
        .unwrap();
        assert_eq!(populated.link().as_deref(), Some("/rides/r9"));

        let bare: Notification =
            serde_json::from_str(r#"{"_id": "n2", "ride": "r10", "read": true}"#).unwrap();
        assert_eq!(bare.link().as_deref(), Some("/rides/r10"));

        let orphan: Notification = serde_json::from_str(r#"{"_id": "n3"}"#).unwrap();
        assert_eq!(orphan.link(), None);
        assert!(!orphan.read);
    }

    #[test]
    fn reads_ride_id_from_virtual_shape() {
        let notification: Notification = serde_json::from_str(
            r#"{"id": "n1", "rideId": "r9", "title": "Request accepted", "message": "Dev accepted you", "read": false}"#,
        )
        .unwrap();
        assert_eq!(notification.id, "n1");
        assert_eq!(notification.link().as_deref(), Some("/rides/r9"));
    }
}
