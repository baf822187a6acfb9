//! `exactmatch-core`: storefront foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    BatteryId, BrandId, CategoryId, ImageId, OrderId, OrderItemId, ReviewId, UserId, WishlistId,
};
pub use money::{Money, Rate};
pub use value_object::ValueObject;
