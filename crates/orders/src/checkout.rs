//! Turning a checkout request into a priced order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::{BatteryId, DomainError, DomainResult, Money, OrderId, UserId};

use crate::order::{Order, OrderLineItem};
use crate::pricing::PricingPolicy;

/// Where an order ships to. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub phone_number: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> DomainResult<()> {
        let fields = [
            ("shipping_address", &self.shipping_address),
            ("shipping_city", &self.shipping_city),
            ("shipping_postal_code", &self.shipping_postal_code),
            ("shipping_country", &self.shipping_country),
            ("phone_number", &self.phone_number),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderRequestItem {
    #[serde(alias = "battery")]
    pub battery_id: BatteryId,
    /// Signed so that `0` and negatives reach validation instead of failing
    /// deserialization.
    pub quantity: i64,
}

/// Client-supplied order: shipping details plus `(battery, quantity)` pairs.
///
/// Prices and totals are never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub shipping: ShippingAddress,
    #[serde(default)]
    pub items: Vec<OrderRequestItem>,
}

impl CheckoutRequest {
    pub fn validate(&self) -> DomainResult<()> {
        self.shipping.validate()?;
        if self.items.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }
        for item in &self.items {
            quantity_of(item)?;
        }
        Ok(())
    }
}

fn quantity_of(item: &OrderRequestItem) -> DomainResult<u32> {
    if item.quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity for battery {} must be positive (got {})",
            item.battery_id, item.quantity
        )));
    }
    u32::try_from(item.quantity).map_err(|_| {
        DomainError::validation(format!(
            "quantity for battery {} is too large (got {})",
            item.battery_id, item.quantity
        ))
    })
}

/// Price a checkout request and build the pending order.
///
/// `resolve_price` returns the current price of a battery, or `None` when the
/// battery does not exist. Duplicate battery ids become separate lines.
pub fn place_order(
    request: CheckoutRequest,
    resolve_price: impl Fn(&BatteryId) -> Option<Money>,
    user_id: UserId,
    user_name: impl Into<String>,
    policy: &PricingPolicy,
    now: DateTime<Utc>,
) -> DomainResult<Order> {
    request.validate()?;

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let quantity = quantity_of(item)?;
        let unit_price = resolve_price(&item.battery_id)
            .ok_or_else(|| DomainError::not_found(format!("battery {}", item.battery_id)))?;
        items.push(OrderLineItem::new(item.battery_id, quantity, unit_price)?);
    }

    let subtotal = Money::try_sum(items.iter().map(|i| i.total_price))?;
    let totals = policy.totals(subtotal)?;

    Ok(Order::pending(
        OrderId::new(),
        user_id,
        user_name.into(),
        totals,
        request.shipping,
        items,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn request(items: Vec<(BatteryId, i64)>) -> CheckoutRequest {
        CheckoutRequest {
            shipping: ShippingAddress {
                shipping_address: "1 Main St".to_string(),
                shipping_city: "Springfield".to_string(),
                shipping_postal_code: "12345".to_string(),
                shipping_country: "US".to_string(),
                phone_number: "555-0100".to_string(),
            },
            items: items
                .into_iter()
                .map(|(battery_id, quantity)| OrderRequestItem { battery_id, quantity })
                .collect(),
        }
    }

    fn catalog(prices: &[(BatteryId, u16)]) -> impl Fn(&BatteryId) -> Option<Money> {
        let map: HashMap<BatteryId, Money> = prices
            .iter()
            .map(|(id, p)| (*id, Money::from_units(*p)))
            .collect();
        move |id| map.get(id).copied()
    }

    #[test]
    fn two_units_over_threshold_ship_free() {
        let b = BatteryId::new();
        let order = place_order(
            request(vec![(b, 2)]),
            catalog(&[(b, 300)]),
            UserId::new(),
            "alice",
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();

        let t = order.totals();
        assert_eq!(t.subtotal.amount(), dec!(600));
        assert_eq!(t.shipping_cost.amount(), dec!(0));
        assert_eq!(t.tax_amount.amount(), dec!(60));
        assert_eq!(t.total_amount.amount(), dec!(660));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.items()[0].unit_price.amount(), dec!(300));
        assert_eq!(order.items()[0].total_price.amount(), dec!(600));
    }

    #[test]
    fn small_order_pays_shipping() {
        let b = BatteryId::new();
        let order = place_order(
            request(vec![(b, 1)]),
            catalog(&[(b, 100)]),
            UserId::new(),
            "bob",
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();

        let t = order.totals();
        assert_eq!(t.subtotal.amount(), dec!(100));
        assert_eq!(t.shipping_cost.amount(), dec!(50));
        assert_eq!(t.tax_amount.amount(), dec!(10));
        assert_eq!(t.total_amount.amount(), dec!(160));
        assert_eq!(order.user_name(), "bob");
    }

    #[test]
    fn duplicate_ids_become_separate_lines() {
        let b = BatteryId::new();
        let order = place_order(
            request(vec![(b, 1), (b, 2)]),
            catalog(&[(b, 100)]),
            UserId::new(),
            "carol",
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.totals().subtotal.amount(), dec!(300));
    }

    #[test]
    fn unknown_battery_is_not_found() {
        let known = BatteryId::new();
        let missing = BatteryId::new();
        let err = place_order(
            request(vec![(known, 1), (missing, 1)]),
            catalog(&[(known, 100)]),
            UserId::new(),
            "dave",
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref m) if m.contains(&missing.to_string())));
    }

    #[test]
    fn empty_and_non_positive_quantities_are_rejected() {
        let b = BatteryId::new();
        let policy = PricingPolicy::default();
        for req in [request(vec![]), request(vec![(b, 0)]), request(vec![(b, -3)])] {
            let err = place_order(req, catalog(&[(b, 1)]), UserId::new(), "x", &policy, Utc::now())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
        }
    }

    #[test]
    fn oversized_amounts_are_rejected_not_panicking() {
        let b = BatteryId::new();
        let policy = PricingPolicy::default();
        let expensive = move |_: &BatteryId| Some(Money::MAX);
        let err = place_order(
            request(vec![(b, 4_000_000_000)]),
            expensive,
            UserId::new(),
            "erin",
            &policy,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");

        // 1,000,000 x 300.00 leaves the storable range.
        let err = place_order(
            request(vec![(b, 1_000_000)]),
            catalog(&[(b, 300)]),
            UserId::new(),
            "erin",
            &policy,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");

        // Lines that fit alone but not together.
        let err = place_order(
            request(vec![(b, 200_000), (b, 200_000)]),
            catalog(&[(b, 300)]),
            UserId::new(),
            "erin",
            &policy,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
    }

    #[test]
    fn blank_shipping_field_is_rejected() {
        let mut req = request(vec![(BatteryId::new(), 1)]);
        req.shipping.shipping_city = "  ".to_string();
        let err = req.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("shipping_city")));
    }

    #[test]
    fn deserializes_flat_body_with_battery_alias() {
        let b = BatteryId::new();
        let body = serde_json::json!({
            "shipping_address": "1 Main St",
            "shipping_city": "Springfield",
            "shipping_postal_code": "12345",
            "shipping_country": "US",
            "phone_number": "555-0100",
            "items": [{ "battery": b, "quantity": 2 }]
        });
        let req: CheckoutRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.items, vec![OrderRequestItem { battery_id: b, quantity: 2 }]);
        assert_eq!(req.shipping.shipping_country, "US");
    }
}
