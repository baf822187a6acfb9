//! Orders domain module.
//!
//! Checkout pricing (subtotal, shipping, tax), the order/line-item model and
//! the fulfilment status lifecycle, implemented as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod checkout;
pub mod order;
pub mod pricing;

pub use checkout::{place_order, CheckoutRequest, OrderRequestItem, ShippingAddress};
pub use order::{Order, OrderLineItem, OrderSnapshot, OrderStatus};
pub use pricing::{OrderTotals, PricingPolicy};
