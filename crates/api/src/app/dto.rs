use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use exactmatch_catalog::{
    primary_image, Battery, BatteryImage, BatteryQuery, Brand, Category, CategoryKind, Condition, Page,
    Review, ReviewSummary, Sort, WishlistEntry,
};
use exactmatch_core::{
    BatteryId, BrandId, CategoryId, DomainError, DomainResult, ImageId, Money, OrderId, OrderItemId,
    ReviewId, UserId, WishlistId,
};
use exactmatch_infra::UserRecord;
use exactmatch_orders::{Order, OrderLineItem, OrderStatus};

/// Turns stored media paths into absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrls {
    base: String,
}

impl MediaUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn optional(&self, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty()).map(|p| self.url(p))
    }
}

// ---- Catalog views ----

#[derive(Debug, Clone, Serialize)]
pub struct BrandView {
    pub id: BrandId,
    pub name: String,
    pub logo: Option<String>,
    pub description: String,
    pub website: Option<String>,
}

impl BrandView {
    pub fn from_brand(brand: &Brand, media: &MediaUrls) -> Self {
        Self {
            id: brand.id,
            name: brand.name.clone(),
            logo: media.optional(brand.logo.as_deref()),
            description: brand.description.clone(),
            website: brand.website.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

impl CategoryView {
    pub fn from_category(category: &Category, media: &MediaUrls) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            description: category.description.clone(),
            image: media.optional(category.image.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatteryImageView {
    pub id: ImageId,
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub order: u32,
}

impl BatteryImageView {
    pub fn from_image(image: &BatteryImage, media: &MediaUrls) -> Self {
        Self {
            id: image.id,
            image: media.url(&image.image),
            alt_text: image.alt_text.clone(),
            is_primary: image.is_primary,
            order: image.order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: ReviewId,
    pub user_name: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Review> for ReviewView {
    fn from(r: &Review) -> Self {
        Self {
            id: r.id,
            user_name: r.user_name.clone(),
            rating: r.rating,
            title: r.title.clone(),
            comment: r.comment.clone(),
            is_verified_purchase: r.is_verified_purchase,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatteryListView {
    pub id: BatteryId,
    pub name: String,
    pub brand: BrandView,
    pub category: CategoryView,
    pub model_number: String,
    pub voltage: Decimal,
    pub amp_hours: Decimal,
    pub cold_cranking_amps: Option<u32>,
    pub condition: Condition,
    pub price: Money,
    pub original_price: Option<Money>,
    pub short_description: String,
    pub is_featured: bool,
    pub is_popular: bool,
    pub is_in_stock: bool,
    pub stock_quantity: u32,
    pub discount_percentage: u32,
    pub slug: String,
    pub primary_image: Option<String>,
    pub average_rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Everything a battery view needs besides the battery row itself.
pub struct BatteryRelations<'a> {
    pub brand: &'a Brand,
    pub category: &'a Category,
    pub images: &'a [&'a BatteryImage],
    pub reviews: &'a [&'a Review],
}

impl BatteryListView {
    pub fn build(battery: &Battery, rel: &BatteryRelations<'_>, media: &MediaUrls) -> Self {
        let summary = ReviewSummary::of(rel.reviews.iter().copied());
        Self {
            id: battery.id,
            name: battery.name.clone(),
            brand: BrandView::from_brand(rel.brand, media),
            category: CategoryView::from_category(rel.category, media),
            model_number: battery.model_number.clone(),
            voltage: battery.voltage,
            amp_hours: battery.amp_hours,
            cold_cranking_amps: battery.cold_cranking_amps,
            condition: battery.condition,
            price: battery.price,
            original_price: battery.original_price,
            short_description: battery.short_description.clone(),
            is_featured: battery.is_featured,
            is_popular: battery.is_popular,
            is_in_stock: battery.is_in_stock(),
            stock_quantity: battery.stock_quantity,
            discount_percentage: battery.discount_percentage(),
            slug: battery.slug.clone(),
            primary_image: primary_image(rel.images.iter().copied()).map(|i| media.url(&i.image)),
            average_rating: summary.average_rating,
            review_count: summary.review_count,
            created_at: battery.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatteryDetailView {
    pub id: BatteryId,
    pub name: String,
    pub brand: BrandView,
    pub category: CategoryView,
    pub model_number: String,
    pub voltage: Decimal,
    pub amp_hours: Decimal,
    pub cold_cranking_amps: Option<u32>,
    pub reserve_capacity: Option<u32>,
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub condition: Condition,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub description: String,
    pub short_description: String,
    pub features: String,
    pub compatibility: String,
    pub is_featured: bool,
    pub is_popular: bool,
    pub is_in_stock: bool,
    pub discount_percentage: u32,
    pub seller_name: Option<String>,
    pub images: Vec<BatteryImageView>,
    pub reviews: Vec<ReviewView>,
    pub average_rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatteryDetailView {
    pub fn build(
        battery: &Battery,
        rel: &BatteryRelations<'_>,
        seller_name: Option<String>,
        media: &MediaUrls,
    ) -> Self {
        let summary = ReviewSummary::of(rel.reviews.iter().copied());
        Self {
            id: battery.id,
            name: battery.name.clone(),
            brand: BrandView::from_brand(rel.brand, media),
            category: CategoryView::from_category(rel.category, media),
            model_number: battery.model_number.clone(),
            voltage: battery.voltage,
            amp_hours: battery.amp_hours,
            cold_cranking_amps: battery.cold_cranking_amps,
            reserve_capacity: battery.reserve_capacity,
            length: battery.length,
            width: battery.width,
            height: battery.height,
            weight: battery.weight,
            condition: battery.condition,
            price: battery.price,
            original_price: battery.original_price,
            stock_quantity: battery.stock_quantity,
            description: battery.description.clone(),
            short_description: battery.short_description.clone(),
            features: battery.features.clone(),
            compatibility: battery.compatibility.clone(),
            is_featured: battery.is_featured,
            is_popular: battery.is_popular,
            is_in_stock: battery.is_in_stock(),
            discount_percentage: battery.discount_percentage(),
            seller_name,
            images: rel
                .images
                .iter()
                .map(|i| BatteryImageView::from_image(i, media))
                .collect(),
            reviews: rel.reviews.iter().map(|r| ReviewView::from(*r)).collect(),
            average_rating: summary.average_rating,
            review_count: summary.review_count,
            created_at: battery.created_at,
            updated_at: battery.updated_at,
        }
    }
}

// ---- Orders ----

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub battery: BatteryId,
    /// Current catalog name; `None` if the battery row is gone.
    pub battery_name: Option<String>,
    pub battery_image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

impl OrderItemView {
    pub fn build(
        item: &OrderLineItem,
        battery_name: Option<String>,
        battery_image: Option<String>,
    ) -> Self {
        Self {
            id: item.id,
            battery: item.battery_id,
            battery_name,
            battery_image,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_name: String,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub phone_number: String,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderView {
    pub fn build(order: &Order, items: Vec<OrderItemView>) -> Self {
        let totals = order.totals();
        let shipping = order.shipping();
        Self {
            id: order.id_typed(),
            user_name: order.user_name().to_string(),
            status: order.status(),
            subtotal: totals.subtotal,
            shipping_cost: totals.shipping_cost,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            shipping_address: shipping.shipping_address.clone(),
            shipping_city: shipping.shipping_city.clone(),
            shipping_postal_code: shipping.shipping_postal_code.clone(),
            shipping_country: shipping.shipping_country.clone(),
            phone_number: shipping.phone_number.clone(),
            items,
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

// ---- Wishlist / users ----

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    pub id: WishlistId,
    pub battery: BatteryListView,
    pub created_at: DateTime<Utc>,
}

impl WishlistView {
    pub fn build(entry: &WishlistEntry, battery: BatteryListView) -> Self {
        Self {
            id: entry.id,
            battery,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WishlistAddRequest {
    #[serde(alias = "battery")]
    pub battery_id: BatteryId,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            date_joined: u.date_joined,
        }
    }
}

// ---- Query parameters ----

/// `?page=&page_size=`. Kept as strings so bad numbers produce our own
/// validation error instead of the extractor's plain-text rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn page(&self) -> DomainResult<Page> {
        Page::new(
            parse_opt("page", self.page.as_deref())?,
            parse_opt("page_size", self.page_size.as_deref())?,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryListParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub paging: PageParams,
}

impl CategoryListParams {
    pub fn kind(&self) -> DomainResult<Option<CategoryKind>> {
        parse_opt("type", self.kind.as_deref())
    }
}

/// Browse filters, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatteryListParams {
    pub search: Option<String>,
    /// Alias of `search` used by `/batteries/search`.
    pub q: Option<String>,
    pub vehicle_search: Option<String>,
    pub categories: Option<String>,
    pub brands: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_amp_hours: Option<String>,
    pub max_amp_hours: Option<String>,
    pub min_cca: Option<String>,
    pub max_cca: Option<String>,
    pub condition: Option<String>,
    pub voltage: Option<String>,
    pub in_stock: Option<String>,
    pub ordering: Option<String>,
    #[serde(flatten)]
    pub paging: PageParams,
}

impl BatteryListParams {
    pub fn to_query(&self) -> DomainResult<(BatteryQuery, Page)> {
        let query = BatteryQuery {
            search: self.search.clone().or_else(|| self.q.clone()),
            vehicle_search: self.vehicle_search.clone(),
            categories: parse_ids("categories", self.categories.as_deref())?,
            brands: parse_ids("brands", self.brands.as_deref())?,
            min_price: parse_money("min_price", self.min_price.as_deref())?,
            max_price: parse_money("max_price", self.max_price.as_deref())?,
            min_amp_hours: parse_opt("min_amp_hours", self.min_amp_hours.as_deref())?,
            max_amp_hours: parse_opt("max_amp_hours", self.max_amp_hours.as_deref())?,
            min_cca: parse_opt("min_cca", self.min_cca.as_deref())?,
            max_cca: parse_opt("max_cca", self.max_cca.as_deref())?,
            condition: parse_opt("condition", self.condition.as_deref())?,
            voltage: parse_opt("voltage", self.voltage.as_deref())?,
            in_stock: parse_flag("in_stock", self.in_stock.as_deref())?,
            sort: parse_opt::<Sort>("ordering", self.ordering.as_deref())?.unwrap_or_default(),
            ..BatteryQuery::default()
        };
        Ok((query, self.paging.page()?))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_opt<T>(name: &str, value: Option<&str>) -> DomainResult<Option<T>>
where
    T: std::str::FromStr,
{
    non_blank(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| DomainError::validation(format!("invalid {name}: '{v}'")))
        })
        .transpose()
}

fn parse_money(name: &str, value: Option<&str>) -> DomainResult<Option<Money>> {
    parse_opt::<Decimal>(name, value)?
        .map(|d| {
            Money::new(d).map_err(|_| {
                DomainError::validation(format!("{name} must be between 0 and {}", Money::MAX))
            })
        })
        .transpose()
}

fn parse_flag(name: &str, value: Option<&str>) -> DomainResult<bool> {
    match non_blank(value).map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(DomainError::validation(format!("invalid {name}: '{other}'"))),
    }
}

/// Comma-separated ids; blank entries are skipped.
fn parse_ids<T>(name: &str, value: Option<&str>) -> DomainResult<Vec<T>>
where
    T: std::str::FromStr,
{
    let Some(value) = non_blank(value) else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| DomainError::invalid_id(format!("invalid id in {name}: '{s}'")))
        })
        .collect()
}
