//! Fixtures shared by the store and checkout tests.

use chrono::Utc;
use rust_decimal_macros::dec;

use exactmatch_catalog::{
    Battery, Brand, Category, Condition, NewBattery, NewBrand, NewCategory, NewReview, Review,
};
use exactmatch_core::{BatteryId, BrandId, CategoryId, Money, ReviewId, UserId};
use exactmatch_orders::{
    place_order, CheckoutRequest, Order, OrderRequestItem, PricingPolicy, ShippingAddress,
};

use crate::users::UserRecord;

pub(crate) fn brand(name: &str) -> Brand {
    NewBrand {
        name: name.to_string(),
        logo: None,
        description: String::new(),
        website: None,
    }
    .into_brand(BrandId::new(), Utc::now())
    .unwrap()
}

pub(crate) fn category(name: &str) -> Category {
    NewCategory {
        name: name.to_string(),
        description: String::new(),
        image: None,
        kind: None,
    }
    .into_category(CategoryId::new(), Utc::now())
    .unwrap()
}

/// Model number is always `M-1`, so the base slug is `<name>-m-1`.
pub(crate) fn battery(brand: &Brand, category: &Category, name: &str, price: u16) -> Battery {
    let listing = NewBattery {
        name: name.to_string(),
        brand_id: brand.id,
        category_id: category.id,
        model_number: "M-1".to_string(),
        voltage: dec!(12),
        amp_hours: dec!(50),
        cold_cranking_amps: Some(600),
        reserve_capacity: None,
        length: None,
        width: None,
        height: None,
        weight: None,
        condition: Condition::New,
        price: Money::from_units(price),
        original_price: None,
        stock_quantity: 5,
        seller_id: None,
        description: String::new(),
        short_description: String::new(),
        features: String::new(),
        compatibility: String::new(),
        is_featured: false,
        is_popular: false,
        is_active: true,
    };
    let slug = listing.base_slug();
    listing.into_battery(BatteryId::new(), slug, Utc::now()).unwrap()
}

pub(crate) fn review(battery_id: BatteryId, user_id: UserId, rating: u8) -> Review {
    NewReview {
        battery_id,
        rating,
        title: "Solid".to_string(),
        comment: "Starts every morning".to_string(),
    }
    .into_review(ReviewId::new(), user_id, "tester".to_string(), false, Utc::now())
    .unwrap()
}

pub(crate) fn shipping() -> ShippingAddress {
    ShippingAddress {
        shipping_address: "1 Main St".to_string(),
        shipping_city: "Springfield".to_string(),
        shipping_postal_code: "12345".to_string(),
        shipping_country: "US".to_string(),
        phone_number: "555-0100".to_string(),
    }
}

pub(crate) fn checkout(items: &[(BatteryId, i64)]) -> CheckoutRequest {
    CheckoutRequest {
        shipping: shipping(),
        items: items
            .iter()
            .map(|(battery_id, quantity)| OrderRequestItem {
                battery_id: *battery_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

/// A priced pending order; `(battery, quantity, unit price)` per line.
pub(crate) fn order_for(user: UserId, lines: &[(BatteryId, i64, u16)]) -> Order {
    let request = checkout(&lines.iter().map(|(b, q, _)| (*b, *q)).collect::<Vec<_>>());
    place_order(
        request,
        |id| {
            lines
                .iter()
                .find(|(b, _, _)| b == id)
                .map(|(_, _, p)| Money::from_units(*p))
        },
        user,
        "tester",
        &PricingPolicy::default(),
        Utc::now(),
    )
    .unwrap()
}

pub(crate) fn user(username: &str) -> UserRecord {
    UserRecord {
        id: UserId::new(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        date_joined: Utc::now(),
    }
}
