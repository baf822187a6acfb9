use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::{CategoryId, DomainError, DomainResult, Entity};

/// Grouping axis a category belongs to (drives the browse filter panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    VehicleType,
    BatteryType,
    UseCase,
    BrandSeries,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::VehicleType => "vehicle_type",
            CategoryKind::BatteryType => "battery_type",
            CategoryKind::UseCase => "use_case",
            CategoryKind::BrandSeries => "brand_series",
        }
    }
}

impl core::str::FromStr for CategoryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle_type" => Ok(CategoryKind::VehicleType),
            "battery_type" => Ok(CategoryKind::BatteryType),
            "use_case" => Ok(CategoryKind::UseCase),
            "brand_series" => Ok(CategoryKind::BrandSeries),
            other => Err(DomainError::validation(format!(
                "unknown category type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub kind: Option<CategoryKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<CategoryKind>,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId, now: DateTime<Utc>) -> DomainResult<Category> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("category name must not be empty"));
        }
        Ok(Category {
            id,
            name,
            description: self.description,
            image: self.image,
            kind: self.kind,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_wire_names() {
        for kind in [
            CategoryKind::VehicleType,
            CategoryKind::BatteryType,
            CategoryKind::UseCase,
            CategoryKind::BrandSeries,
        ] {
            assert_eq!(kind.as_str().parse::<CategoryKind>().unwrap(), kind);
        }
        assert!("marine".parse::<CategoryKind>().is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        let new = NewCategory {
            name: "   ".to_string(),
            description: String::new(),
            image: None,
            kind: None,
        };
        assert!(new.into_category(CategoryId::new(), Utc::now()).is_err());
    }
}
