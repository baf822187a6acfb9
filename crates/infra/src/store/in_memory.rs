//! In-memory store for dev and tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use exactmatch_catalog::{
    unique_slug, Battery, BatteryImage, Brand, Category, CategoryKind, Review, WishlistEntry,
};
use exactmatch_core::{BatteryId, BrandId, CategoryId, Entity, Money, OrderId, UserId, WishlistId};
use exactmatch_orders::{Order, OrderSnapshot};

use super::{CatalogStore, OrderStore, ReviewStore, UserStore, WishlistStore};
use crate::error::{StoreError, StoreResult};
use crate::users::UserRecord;

#[derive(Debug, Default)]
struct State {
    brands: HashMap<BrandId, Brand>,
    categories: HashMap<CategoryId, Category>,
    batteries: HashMap<BatteryId, Battery>,
    images: Vec<BatteryImage>,
    reviews: Vec<Review>,
    orders: HashMap<OrderId, Order>,
    wishlist: Vec<WishlistEntry>,
    users: HashMap<UserId, UserRecord>,
}

/// Every collection sits behind one lock, so each write (an order and its
/// lines included) is applied whole or not at all.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

/// Insert under the entity's own id; an id already present is a conflict.
fn insert_new<E>(map: &mut HashMap<E::Id, E>, entity: E, what: &str) -> StoreResult<()>
where
    E: Entity,
    E::Id: core::fmt::Display,
{
    let id = entity.id().clone();
    if map.contains_key(&id) {
        return Err(StoreError::Conflict(format!("{what} {id} already exists")));
    }
    map.insert(id, entity);
    Ok(())
}

fn by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by_key(|i| name(i).to_lowercase());
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let mut brands: Vec<Brand> = self.read()?.brands.values().cloned().collect();
        by_name(&mut brands, |b| &b.name);
        Ok(brands)
    }

    async fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>> {
        Ok(self.read()?.brands.get(&id).cloned())
    }

    async fn insert_brand(&self, brand: Brand) -> StoreResult<()> {
        insert_new(&mut self.write()?.brands, brand, "brand")
    }

    async fn list_categories(&self, kind: Option<CategoryKind>) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .read()?
            .categories
            .values()
            .filter(|c| kind.is_none() || c.kind == kind)
            .cloned()
            .collect();
        by_name(&mut categories, |c| &c.name);
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn insert_category(&self, category: Category) -> StoreResult<()> {
        insert_new(&mut self.write()?.categories, category, "category")
    }

    async fn list_batteries(&self) -> StoreResult<Vec<Battery>> {
        Ok(self.read()?.batteries.values().cloned().collect())
    }

    async fn get_battery(&self, id: BatteryId) -> StoreResult<Option<Battery>> {
        Ok(self.read()?.batteries.get(&id).cloned())
    }

    async fn prices_of(&self, ids: &[BatteryId]) -> StoreResult<HashMap<BatteryId, Money>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.batteries.get(id).map(|b| (*id, b.price)))
            .collect())
    }

    async fn insert_battery(&self, mut battery: Battery) -> StoreResult<Battery> {
        let mut state = self.write()?;
        if !state.brands.contains_key(&battery.brand_id) {
            return Err(StoreError::NotFound(format!("brand {}", battery.brand_id)));
        }
        if !state.categories.contains_key(&battery.category_id) {
            return Err(StoreError::NotFound(format!("category {}", battery.category_id)));
        }

        battery.slug = unique_slug(&battery.slug, |candidate| {
            state.batteries.values().any(|b| b.slug == candidate)
        });
        insert_new(&mut state.batteries, battery.clone(), "battery")?;
        Ok(battery)
    }

    async fn images_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<BatteryImage>> {
        let mut images: Vec<BatteryImage> = self
            .read()?
            .images
            .iter()
            .filter(|i| ids.contains(&i.battery_id))
            .cloned()
            .collect();
        images.sort_by_key(|i| (i.order, i.id));
        Ok(images)
    }

    async fn insert_image(&self, image: BatteryImage) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.batteries.contains_key(&image.battery_id) {
            return Err(StoreError::NotFound(format!("battery {}", image.battery_id)));
        }
        state.images.push(image);
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn reviews_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .read()?
            .reviews
            .iter()
            .filter(|r| ids.contains(&r.battery_id))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn insert_review(&self, review: Review) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.batteries.contains_key(&review.battery_id) {
            return Err(StoreError::NotFound(format!("battery {}", review.battery_id)));
        }
        let duplicate = state
            .reviews
            .iter()
            .any(|r| r.user_id == review.user_id && r.battery_id == review.battery_id);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "user {} already reviewed battery {}",
                review.user_id, review.battery_id
            )));
        }
        state.reviews.push(review);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = order
            .items()
            .iter()
            .find(|i| !state.batteries.contains_key(&i.battery_id))
        {
            return Err(StoreError::NotFound(format!("battery {}", missing.battery_id)));
        }
        insert_new(&mut state.orders, order.clone(), "order")
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn list_orders(&self, user: Option<UserId>) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| user.is_none_or(|u| o.user_id() == u))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id_typed().cmp(&a.id_typed()))
        });
        Ok(orders)
    }

    async fn update_order_status(&self, order: &Order) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .orders
            .get_mut(&order.id_typed())
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id_typed())))?;

        let mut snapshot = OrderSnapshot::from(stored.clone());
        snapshot.status = order.status();
        snapshot.updated_at = order.updated_at();
        snapshot.shipped_at = order.shipped_at();
        snapshot.delivered_at = order.delivered_at();
        *stored = Order::rehydrate(snapshot).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(())
    }

    async fn has_purchased(&self, user: UserId, battery: BatteryId) -> StoreResult<bool> {
        Ok(self.read()?.orders.values().any(|o| {
            o.user_id() == user && o.items().iter().any(|i| i.battery_id == battery)
        }))
    }
}

#[async_trait]
impl WishlistStore for InMemoryStore {
    async fn list_wishlist(&self, user: UserId) -> StoreResult<Vec<WishlistEntry>> {
        let mut entries: Vec<WishlistEntry> = self
            .read()?
            .wishlist
            .iter()
            .filter(|w| w.user_id == user)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn add_to_wishlist(&self, entry: WishlistEntry) -> StoreResult<WishlistEntry> {
        let mut state = self.write()?;
        if !state.batteries.contains_key(&entry.battery_id) {
            return Err(StoreError::NotFound(format!("battery {}", entry.battery_id)));
        }
        if let Some(existing) = state
            .wishlist
            .iter()
            .find(|w| w.user_id == entry.user_id && w.battery_id == entry.battery_id)
        {
            return Ok(existing.clone());
        }
        state.wishlist.push(entry.clone());
        Ok(entry)
    }

    async fn remove_from_wishlist(&self, user: UserId, id: WishlistId) -> StoreResult<()> {
        let mut state = self.write()?;
        let before = state.wishlist.len();
        state.wishlist.retain(|w| !(w.id == id && w.user_id == user));
        if state.wishlist.len() == before {
            return Err(StoreError::NotFound(format!("wishlist entry {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn upsert_user(&self, profile: UserRecord) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        let record = match state.users.remove(&profile.id) {
            Some(existing) => existing.refreshed(profile),
            None => profile,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{battery, brand, category, order_for, review, user};
    use chrono::{Duration, Utc};
    use exactmatch_orders::OrderStatus;

    async fn seeded() -> (InMemoryStore, Battery) {
        let store = InMemoryStore::new();
        let brand = brand("Optima");
        let category = category("Automotive");
        store.insert_brand(brand.clone()).await.unwrap();
        store.insert_category(category.clone()).await.unwrap();
        let b = store
            .insert_battery(battery(&brand, &category, "RedTop", 300))
            .await
            .unwrap();
        (store, b)
    }

    #[tokio::test]
    async fn slugs_are_made_unique() {
        let (store, first) = seeded().await;
        let brand = store.get_brand(first.brand_id).await.unwrap().unwrap();
        let category = store.get_category(first.category_id).await.unwrap().unwrap();

        let second = store
            .insert_battery(battery(&brand, &category, "RedTop", 250))
            .await
            .unwrap();
        assert_eq!(first.slug, "redtop-m-1");
        assert_eq!(second.slug, "redtop-m-1-2");
    }

    #[tokio::test]
    async fn battery_requires_known_brand_and_category() {
        let store = InMemoryStore::new();
        let err = store
            .insert_battery(battery(&brand("Ghost"), &category("Nowhere"), "X", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref m) if m.starts_with("brand")));
    }

    #[tokio::test]
    async fn order_with_unknown_battery_leaves_nothing_behind() {
        let (store, b) = seeded().await;
        let ghost = BatteryId::new();
        let order = order_for(UserId::new(), &[(b.id, 1, 300), (ghost, 1, 10)]);

        let err = store.insert_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orders_are_listed_per_user_newest_first() {
        let (store, b) = seeded().await;
        let alice = UserId::new();
        let bob = UserId::new();
        let first = order_for(alice, &[(b.id, 1, 300)]);
        let second = order_for(alice, &[(b.id, 2, 300)]);
        let other = order_for(bob, &[(b.id, 1, 300)]);
        for o in [&first, &second, &other] {
            store.insert_order(o).await.unwrap();
        }

        let mine = store.list_orders(Some(alice)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].created_at() >= mine[1].created_at());
        assert_eq!(store.list_orders(None).await.unwrap().len(), 3);
        assert!(store.has_purchased(bob, b.id).await.unwrap());
        assert!(!store.has_purchased(UserId::new(), b.id).await.unwrap());
    }

    #[tokio::test]
    async fn status_update_keeps_financials() {
        let (store, b) = seeded().await;
        let order = order_for(UserId::new(), &[(b.id, 1, 300)]);
        store.insert_order(&order).await.unwrap();

        let mut moved = order.clone();
        let later = order.created_at() + Duration::hours(2);
        moved.transition_to(OrderStatus::Processing, later).unwrap();
        store.update_order_status(&moved).await.unwrap();

        let stored = store.get_order(order.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Processing);
        assert_eq!(stored.updated_at(), later);
        assert_eq!(stored.totals(), order.totals());
    }

    #[tokio::test]
    async fn second_review_by_same_user_conflicts() {
        let (store, b) = seeded().await;
        let author = UserId::new();
        store.insert_review(review(b.id, author, 5)).await.unwrap();

        let err = store.insert_review(review(b.id, author, 3)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.insert_review(review(b.id, UserId::new(), 4)).await.unwrap();
        assert_eq!(store.reviews_for(&[b.id]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wishlist_add_is_idempotent_and_remove_is_owner_only() {
        let (store, b) = seeded().await;
        let owner = UserId::new();
        let entry = |user| WishlistEntry {
            id: WishlistId::new(),
            user_id: user,
            battery_id: b.id,
            created_at: Utc::now(),
        };

        let first = store.add_to_wishlist(entry(owner)).await.unwrap();
        let again = store.add_to_wishlist(entry(owner)).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(store.list_wishlist(owner).await.unwrap().len(), 1);

        let err = store.remove_from_wishlist(UserId::new(), first.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        store.remove_from_wishlist(owner, first.id).await.unwrap();
        assert!(store.list_wishlist(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_keeps_join_date() {
        let store = InMemoryStore::new();
        let first = store.upsert_user(user("alice")).await.unwrap();

        let mut renamed = user("alice2");
        renamed.id = first.id;
        renamed.date_joined = first.date_joined + Duration::days(30);
        let stored = store.upsert_user(renamed).await.unwrap();

        assert_eq!(stored.username, "alice2");
        assert_eq!(stored.date_joined, first.date_joined);
    }

    #[tokio::test]
    async fn categories_filter_by_kind() {
        let store = InMemoryStore::new();
        let mut car = category("Cars");
        car.kind = Some(CategoryKind::VehicleType);
        store.insert_category(car).await.unwrap();
        store.insert_category(category("Misc")).await.unwrap();

        let all = store.list_categories(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let vehicles = store
            .list_categories(Some(CategoryKind::VehicleType))
            .await
            .unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].name, "Cars");
    }
}
