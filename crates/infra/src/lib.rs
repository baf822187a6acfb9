//! Infrastructure layer: persistence backends and the checkout workflow.

pub mod checkout;
pub mod error;
pub mod store;
pub mod users;

#[cfg(test)]
mod testing;

pub use checkout::{CheckoutError, CheckoutService};
pub use error::{StoreError, StoreResult};
pub use store::{
    CatalogStore, InMemoryStore, OrderStore, PostgresStore, ReviewStore, Store, UserStore,
    WishlistStore,
};
pub use users::UserRecord;
