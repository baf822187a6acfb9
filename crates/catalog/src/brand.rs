use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::{BrandId, DomainError, DomainResult, Entity};

/// Battery manufacturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    /// Media path of the logo, relative to the media root.
    pub logo: Option<String>,
    pub description: String,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Brand {
    type Id = BrandId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating a brand.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBrand {
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
}

impl NewBrand {
    pub fn into_brand(self, id: BrandId, now: DateTime<Utc>) -> DomainResult<Brand> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("brand name must not be empty"));
        }
        Ok(Brand {
            id,
            name,
            logo: self.logo,
            description: self.description,
            website: self.website,
            created_at: now,
        })
    }
}
