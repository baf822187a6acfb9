use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use exactmatch_core::{
    BatteryId, BrandId, CategoryId, DomainError, DomainResult, Entity, ImageId, Money, UserId,
};

/// Physical condition a battery is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Refurbished,
    Used,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Refurbished => "refurbished",
            Condition::Used => "used",
        }
    }
}

impl core::str::FromStr for Condition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Condition::New),
            "refurbished" => Ok(Condition::Refurbished),
            "used" => Ok(Condition::Used),
            other => Err(DomainError::validation(format!(
                "condition must be one of: new, refurbished, used (got '{other}')"
            ))),
        }
    }
}

/// A battery listed in the store (the product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battery {
    pub id: BatteryId,
    pub name: String,
    pub brand_id: BrandId,
    pub category_id: CategoryId,
    pub model_number: String,
    pub slug: String,

    // Technical specifications
    pub voltage: Decimal,
    pub amp_hours: Decimal,
    pub cold_cranking_amps: Option<u32>,
    /// Minutes.
    pub reserve_capacity: Option<u32>,

    // Physical specifications
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,

    // Commercial information
    pub condition: Condition,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub seller_id: Option<UserId>,

    pub description: String,
    pub short_description: String,
    pub features: String,
    pub compatibility: String,

    pub is_featured: bool,
    pub is_popular: bool,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Battery {
    type Id = BatteryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Battery {
    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Whole percent saved against `original_price`.
    ///
    /// Zero when there is no original price or it is not above the current
    /// price.
    pub fn discount_percentage(&self) -> u32 {
        let Some(original) = self.original_price else {
            return 0;
        };
        let Some(saved) = original.checked_sub(self.price) else {
            return 0;
        };
        if original.is_zero() || saved.is_zero() {
            return 0;
        }

        (saved.amount() / original.amount() * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(0)
    }

    /// Text the storefront search box matches against (brand name is joined
    /// in by the caller).
    pub fn search_haystack(&self) -> [&str; 3] {
        [&self.name, &self.model_number, &self.description]
    }
}

/// Input for listing a new battery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBattery {
    pub name: String,
    pub brand_id: BrandId,
    pub category_id: CategoryId,
    pub model_number: String,
    pub voltage: Decimal,
    pub amp_hours: Decimal,
    #[serde(default)]
    pub cold_cranking_amps: Option<u32>,
    #[serde(default)]
    pub reserve_capacity: Option<u32>,
    #[serde(default)]
    pub length: Option<Decimal>,
    #[serde(default)]
    pub width: Option<Decimal>,
    #[serde(default)]
    pub height: Option<Decimal>,
    #[serde(default)]
    pub weight: Option<Decimal>,
    pub condition: Condition,
    pub price: Money,
    #[serde(default)]
    pub original_price: Option<Money>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub seller_id: Option<UserId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub compatibility: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewBattery {
    /// Base slug before uniqueness suffixes are applied by the store.
    pub fn base_slug(&self) -> String {
        slugify(&format!("{} {}", self.name, self.model_number))
    }

    pub fn into_battery(
        self,
        id: BatteryId,
        slug: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Battery> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("battery name must not be empty"));
        }
        if self.model_number.trim().is_empty() {
            return Err(DomainError::validation("model_number must not be empty"));
        }
        if self.voltage <= Decimal::ZERO {
            return Err(DomainError::validation("voltage must be positive"));
        }
        if self.amp_hours < Decimal::ZERO {
            return Err(DomainError::validation("amp_hours must not be negative"));
        }
        if slug.is_empty() {
            return Err(DomainError::validation("slug must not be empty"));
        }

        Ok(Battery {
            id,
            name,
            brand_id: self.brand_id,
            category_id: self.category_id,
            model_number: self.model_number.trim().to_string(),
            slug,
            voltage: self.voltage,
            amp_hours: self.amp_hours,
            cold_cranking_amps: self.cold_cranking_amps,
            reserve_capacity: self.reserve_capacity,
            length: self.length,
            width: self.width,
            height: self.height,
            weight: self.weight,
            condition: self.condition,
            price: self.price,
            original_price: self.original_price,
            stock_quantity: self.stock_quantity,
            seller_id: self.seller_id,
            description: self.description,
            short_description: self.short_description,
            features: self.features,
            compatibility: self.compatibility,
            is_featured: self.is_featured,
            is_popular: self.is_popular,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Product photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryImage {
    pub id: ImageId,
    pub battery_id: BatteryId,
    /// Media path, relative to the media root.
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
    /// Display position within the gallery.
    pub order: u32,
}

impl Entity for BatteryImage {
    type Id = ImageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBatteryImage {
    pub image: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub order: u32,
}

impl NewBatteryImage {
    pub fn into_image(self, id: ImageId, battery_id: BatteryId) -> DomainResult<BatteryImage> {
        let image = self.image.trim().trim_start_matches('/').to_string();
        if image.is_empty() {
            return Err(DomainError::validation("image path must not be empty"));
        }
        Ok(BatteryImage {
            id,
            battery_id,
            image,
            alt_text: self.alt_text,
            is_primary: self.is_primary,
            order: self.order,
        })
    }
}

/// The first primary image in gallery order.
pub fn primary_image<'a>(images: impl IntoIterator<Item = &'a BatteryImage>) -> Option<&'a BatteryImage> {
    images
        .into_iter()
        .filter(|i| i.is_primary)
        .min_by_key(|i| (i.order, i.id))
}

/// Lowercase ASCII slug: runs of anything that is not a letter or digit
/// become a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// First of `base`, `base-2`, `base-3`, ... that `is_taken` rejects.
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
