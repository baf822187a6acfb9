//! Order placement: validate, price from the catalog, persist atomically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use exactmatch_core::{BatteryId, DomainError, UserId};
use exactmatch_orders::{place_order, CheckoutRequest, Order, PricingPolicy};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CheckoutService {
    store: Arc<dyn Store>,
    policy: PricingPolicy,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, policy: PricingPolicy) -> Self {
        Self { store, policy }
    }

    /// Price `request` against current catalog prices and store the order
    /// with all of its line items.
    ///
    /// Nothing is written when validation fails or any battery is unknown.
    #[instrument(
        skip(self, request, user_name),
        fields(user_id = %user_id, item_count = request.items.len()),
        err
    )]
    pub async fn place(
        &self,
        request: CheckoutRequest,
        user_id: UserId,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        request.validate()?;

        let ids: Vec<BatteryId> = request.items.iter().map(|i| i.battery_id).collect();
        let prices = self.store.prices_of(&ids).await?;

        let order = place_order(
            request,
            |id| prices.get(id).copied(),
            user_id,
            user_name,
            &self.policy,
            now,
        )?;

        self.store.insert_order(&order).await?;

        let totals = order.totals();
        info!(
            order_id = %order.id_typed(),
            subtotal = %totals.subtotal,
            shipping_cost = %totals.shipping_cost,
            tax_amount = %totals.tax_amount,
            total_amount = %totals.total_amount,
            "order placed"
        );
        Ok(order)
    }
}
