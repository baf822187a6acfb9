use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::{BatteryId, Entity, UserId, WishlistId};

/// A battery saved by a user for later. Unique per (user, battery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: WishlistId,
    pub user_id: UserId,
    pub battery_id: BatteryId,
    pub created_at: DateTime<Utc>,
}

impl Entity for WishlistEntry {
    type Id = WishlistId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
