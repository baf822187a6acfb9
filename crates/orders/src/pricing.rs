//! Order total computation.
//!
//! ```text
//! subtotal = Σ quantity × unit_price
//! shipping = flat fee if subtotal < threshold, else 0
//! tax      = subtotal × tax rate (rounded to cents)
//! total    = subtotal + shipping + tax
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use exactmatch_core::{DomainResult, Money, Rate};

/// Shipping and tax rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold: Money,
    pub flat_shipping_fee: Money,
    pub tax_rate: Rate,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_units(500),
            flat_shipping_fee: Money::from_units(50),
            tax_rate: Rate::from_basis_points(1_000),
        }
    }
}

/// Server-computed financial fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl PricingPolicy {
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal < self.free_shipping_threshold {
            self.flat_shipping_fee
        } else {
            Money::ZERO
        }
    }

    pub fn tax_for(&self, subtotal: Money) -> Money {
        subtotal.apply_rate(self.tax_rate)
    }

    /// Fails when the grand total would exceed [`Money::MAX`].
    pub fn totals(&self, subtotal: Money) -> DomainResult<OrderTotals> {
        let shipping_cost = self.shipping_for(subtotal);
        let tax_amount = self.tax_for(subtotal);
        Ok(OrderTotals {
            subtotal,
            shipping_cost,
            tax_amount,
            total_amount: Money::try_sum([subtotal, shipping_cost, tax_amount])?,
        })
    }
}
