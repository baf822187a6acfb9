use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exactmatch_core::{BatteryId, DomainError, DomainResult, Entity, Money, OrderId, OrderItemId, UserId};

use crate::checkout::ShippingAddress;
use crate::pricing::OrderTotals;

/// Order fulfilment lifecycle.
///
/// ```text
/// pending -> processing -> shipped -> delivered
///    \           \
///     +-----------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// Order line: battery, quantity and the unit price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: OrderItemId,
    pub battery_id: BatteryId,
    pub quantity: u32,
    pub unit_price: Money,
    /// `quantity × unit_price`.
    pub total_price: Money,
}

impl OrderLineItem {
    pub fn new(battery_id: BatteryId, quantity: u32, unit_price: Money) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            id: OrderItemId::new(),
            battery_id,
            quantity,
            unit_price,
            total_price: unit_price.times(quantity)?,
        })
    }
}

/// A placed order.
///
/// Financial fields are computed once at checkout and never change; only the
/// status (and its timestamps) moves afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    user_name: String,
    status: OrderStatus,
    totals: OrderTotals,
    shipping: ShippingAddress,
    items: Vec<OrderLineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Order {
    pub(crate) fn pending(
        id: OrderId,
        user_id: UserId,
        user_name: String,
        totals: OrderTotals,
        shipping: ShippingAddress,
        items: Vec<OrderLineItem>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            user_name,
            status: OrderStatus::Pending,
            totals,
            shipping,
            items,
            created_at: now,
            updated_at: now,
            shipped_at: None,
            delivered_at: None,
        }
    }

    /// Rebuild an order from storage, checking the stored totals still add up.
    pub fn rehydrate(snapshot: OrderSnapshot) -> DomainResult<Self> {
        let subtotal = Money::try_sum(snapshot.items.iter().map(|i| i.total_price))?;
        if subtotal != snapshot.subtotal {
            return Err(DomainError::invariant(format!(
                "order {} subtotal {} does not match its items ({subtotal})",
                snapshot.id, snapshot.subtotal
            )));
        }
        let total = Money::try_sum([snapshot.subtotal, snapshot.shipping_cost, snapshot.tax_amount])?;
        if total != snapshot.total_amount {
            return Err(DomainError::invariant(format!(
                "order {} total {} is not subtotal + shipping + tax",
                snapshot.id, snapshot.total_amount
            )));
        }

        Ok(Self {
            id: snapshot.id,
            user_id: snapshot.user_id,
            user_name: snapshot.user_name,
            status: snapshot.status,
            totals: OrderTotals {
                subtotal: snapshot.subtotal,
                shipping_cost: snapshot.shipping_cost,
                tax_amount: snapshot.tax_amount,
                total_amount: snapshot.total_amount,
            },
            shipping: snapshot.shipping,
            items: snapshot.items,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            shipped_at: snapshot.shipped_at,
            delivered_at: snapshot.delivered_at,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn shipping(&self) -> &ShippingAddress {
        &self.shipping
    }

    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    /// Move the order along its lifecycle.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "order is already {} and can no longer change",
                self.status
            )));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "order cannot move from {} to {}",
                self.status, next
            )));
        }

        match next {
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Flat, storage-friendly form of an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub user_id: UserId,
    pub user_name: String,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub shipping: ShippingAddress,
    pub items: Vec<OrderLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderSnapshot {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            user_id: o.user_id,
            user_name: o.user_name,
            status: o.status,
            subtotal: o.totals.subtotal,
            shipping_cost: o.totals.shipping_cost,
            tax_amount: o.totals.tax_amount,
            total_amount: o.totals.total_amount,
            shipping: o.shipping,
            items: o.items,
            created_at: o.created_at,
            updated_at: o.updated_at,
            shipped_at: o.shipped_at,
            delivered_at: o.delivered_at,
        }
    }
}
