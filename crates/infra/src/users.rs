//! User directory read model.
//!
//! Accounts live with the token issuer; the store keeps the profile fields
//! seen in the most recent token so orders, reviews and `/users/me` can show
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// First time the user was seen by this service.
    pub date_joined: DateTime<Utc>,
}

impl UserRecord {
    /// Merge a fresh profile into an existing record, keeping `date_joined`.
    pub fn refreshed(self, profile: UserRecord) -> UserRecord {
        UserRecord {
            date_joined: self.date_joined,
            ..profile
        }
    }
}
