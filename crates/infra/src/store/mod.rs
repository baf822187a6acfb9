//! Storefront persistence.
//!
//! One trait per aggregate family, bundled into [`Store`]. Two backends:
//! [`InMemoryStore`] for dev and tests, [`PostgresStore`] for production.
//!
//! Listing methods return rows in a fixed order so callers can paginate:
//! brands and categories by name, reviews / orders / wishlist entries newest
//! first, images by gallery position.

use std::collections::HashMap;

use async_trait::async_trait;

use exactmatch_catalog::{Battery, BatteryImage, Brand, Category, CategoryKind, Review, WishlistEntry};
use exactmatch_core::{BatteryId, BrandId, CategoryId, Money, OrderId, UserId, WishlistId};
use exactmatch_orders::Order;

use crate::error::StoreResult;
use crate::users::UserRecord;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_brands(&self) -> StoreResult<Vec<Brand>>;
    async fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>>;
    async fn insert_brand(&self, brand: Brand) -> StoreResult<()>;

    async fn list_categories(&self, kind: Option<CategoryKind>) -> StoreResult<Vec<Category>>;
    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn insert_category(&self, category: Category) -> StoreResult<()>;

    /// Every battery, active or not. Filtering happens in `BatteryQuery`.
    async fn list_batteries(&self) -> StoreResult<Vec<Battery>>;
    async fn get_battery(&self, id: BatteryId) -> StoreResult<Option<Battery>>;

    /// Current prices for the given ids; unknown ids are simply absent.
    async fn prices_of(&self, ids: &[BatteryId]) -> StoreResult<HashMap<BatteryId, Money>>;

    /// Insert a battery, replacing its slug with the first free variant.
    ///
    /// Fails with `NotFound` when the brand or category does not exist.
    async fn insert_battery(&self, battery: Battery) -> StoreResult<Battery>;

    async fn images_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<BatteryImage>>;
    async fn insert_image(&self, image: BatteryImage) -> StoreResult<()>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn reviews_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<Review>>;

    /// Fails with `Conflict` when the user already reviewed the battery.
    async fn insert_review(&self, review: Review) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist an order and all of its line items, or nothing.
    ///
    /// Fails with `NotFound` when a line item names an unknown battery.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    /// `None` lists every order.
    async fn list_orders(&self, user: Option<UserId>) -> StoreResult<Vec<Order>>;
    /// Persist status and fulfilment timestamps. Financial fields are never
    /// rewritten.
    async fn update_order_status(&self, order: &Order) -> StoreResult<()>;
    async fn has_purchased(&self, user: UserId, battery: BatteryId) -> StoreResult<bool>;
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn list_wishlist(&self, user: UserId) -> StoreResult<Vec<WishlistEntry>>;
    /// Returns the stored entry: `entry` itself, or the one already present
    /// for the same (user, battery).
    async fn add_to_wishlist(&self, entry: WishlistEntry) -> StoreResult<WishlistEntry>;
    /// Fails with `NotFound` unless the entry exists and belongs to `user`.
    async fn remove_from_wishlist(&self, user: UserId, id: WishlistId) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or refresh a profile. `date_joined` is kept from the first
    /// sighting.
    async fn upsert_user(&self, profile: UserRecord) -> StoreResult<UserRecord>;
    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>>;
}

/// Everything the API needs from persistence.
pub trait Store: CatalogStore + ReviewStore + OrderStore + WishlistStore + UserStore {}

impl<T> Store for T where T: CatalogStore + ReviewStore + OrderStore + WishlistStore + UserStore {}
