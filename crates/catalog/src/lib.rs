//! Battery catalog domain module.
//!
//! Brands, categories, batteries and their images, reviews and wishlist
//! entries, plus the browse/search query model. Pure domain logic: no IO, no
//! HTTP, no storage.

pub mod battery;
pub mod brand;
pub mod category;
pub mod query;
pub mod review;
pub mod wishlist;

pub use battery::{
    primary_image, slugify, unique_slug, Battery, BatteryImage, Condition, NewBattery, NewBatteryImage,
};
pub use brand::{Brand, NewBrand};
pub use category::{Category, CategoryKind, NewCategory};
pub use query::{BatteryQuery, Page, Paginated, Sort, SortField, SortOrder};
pub use review::{NewReview, Review, ReviewSummary};
pub use wishlist::WishlistEntry;
