use std::collections::HashMap;
use std::sync::Arc;

use exactmatch_catalog::{primary_image, Battery, BatteryImage, Brand, Category, Review};
use exactmatch_core::{BatteryId, BrandId, CategoryId};
use exactmatch_infra::{
    CheckoutService, InMemoryStore, PostgresStore, Store, StoreError, StoreResult,
};
use exactmatch_orders::Order;

use crate::app::dto::{
    BatteryDetailView, BatteryListView, BatteryRelations, MediaUrls, OrderItemView, OrderView,
};
use crate::config::Config;

pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub checkout: CheckoutService,
    pub media: MediaUrls,
}

/// Pick the backend from `config` and wire the services on top of it.
pub async fn build_services(config: &Config) -> StoreResult<AppServices> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("using postgres store");
            Arc::new(PostgresStore::connect(url).await?)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(AppServices::new(store, config))
}

/// Brands and categories keyed by id, for joining onto battery rows.
pub struct CatalogIndex {
    pub brands: HashMap<BrandId, Brand>,
    pub categories: HashMap<CategoryId, Category>,
}

impl CatalogIndex {
    pub fn brand_name(&self, id: &BrandId) -> &str {
        self.brands.get(id).map(|b| b.name.as_str()).unwrap_or("")
    }
}

fn group_by_battery<T>(rows: Vec<T>, key: impl Fn(&T) -> BatteryId) -> HashMap<BatteryId, Vec<T>> {
    let mut grouped: HashMap<BatteryId, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            checkout: CheckoutService::new(store.clone(), config.pricing),
            media: MediaUrls::new(config.media_base_url.clone()),
            store,
        }
    }

    pub async fn catalog_index(&self) -> StoreResult<CatalogIndex> {
        let brands = self.store.list_brands().await?;
        let categories = self.store.list_categories(None).await?;
        Ok(CatalogIndex {
            brands: brands.into_iter().map(|b| (b.id, b)).collect(),
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
        })
    }

    /// List views for `batteries`, in the given order.
    pub async fn battery_list_views(
        &self,
        index: &CatalogIndex,
        batteries: &[&Battery],
    ) -> StoreResult<Vec<BatteryListView>> {
        let ids: Vec<BatteryId> = batteries.iter().map(|b| b.id).collect();
        let images = group_by_battery(self.store.images_for(&ids).await?, |i| i.battery_id);
        let reviews = group_by_battery(self.store.reviews_for(&ids).await?, |r| r.battery_id);

        batteries
            .iter()
            .map(|battery| {
                let images: Vec<&BatteryImage> =
                    images.get(&battery.id).map(|v| v.iter().collect()).unwrap_or_default();
                let reviews: Vec<&Review> =
                    reviews.get(&battery.id).map(|v| v.iter().collect()).unwrap_or_default();
                let (brand, category) = relations_of(index, battery)?;
                let rel = BatteryRelations {
                    brand,
                    category,
                    images: &images,
                    reviews: &reviews,
                };
                Ok(BatteryListView::build(battery, &rel, &self.media))
            })
            .collect()
    }

    pub async fn battery_detail_view(&self, battery: &Battery) -> StoreResult<BatteryDetailView> {
        let index = self.catalog_index().await?;
        let ids = [battery.id];
        let images = self.store.images_for(&ids).await?;
        let reviews = self.store.reviews_for(&ids).await?;
        let seller_name = match battery.seller_id {
            Some(seller) => self.store.get_user(seller).await?.map(|u| u.username),
            None => None,
        };

        let images: Vec<&BatteryImage> = images.iter().collect();
        let reviews: Vec<&Review> = reviews.iter().collect();
        let (brand, category) = relations_of(&index, battery)?;
        let rel = BatteryRelations {
            brand,
            category,
            images: &images,
            reviews: &reviews,
        };
        Ok(BatteryDetailView::build(battery, &rel, seller_name, &self.media))
    }

    /// Order views with the current battery name and primary image joined
    /// onto each line.
    pub async fn order_views(&self, orders: &[Order]) -> StoreResult<Vec<OrderView>> {
        let mut ids: Vec<BatteryId> = orders
            .iter()
            .flat_map(|o| o.items().iter().map(|i| i.battery_id))
            .collect();
        ids.sort();
        ids.dedup();

        let mut names = HashMap::with_capacity(ids.len());
        for id in &ids {
            if let Some(battery) = self.store.get_battery(*id).await? {
                names.insert(*id, battery.name);
            }
        }
        let images = group_by_battery(self.store.images_for(&ids).await?, |i| i.battery_id);

        Ok(orders
            .iter()
            .map(|order| {
                let items = order
                    .items()
                    .iter()
                    .map(|item| {
                        let image = images
                            .get(&item.battery_id)
                            .and_then(|v| primary_image(v.iter()))
                            .map(|i| self.media.url(&i.image));
                        OrderItemView::build(item, names.get(&item.battery_id).cloned(), image)
                    })
                    .collect();
                OrderView::build(order, items)
            })
            .collect())
    }

    pub async fn order_view(&self, order: &Order) -> StoreResult<OrderView> {
        let mut views = self.order_views(std::slice::from_ref(order)).await?;
        views
            .pop()
            .ok_or_else(|| StoreError::Corrupt(format!("order {} has no view", order.id_typed())))
    }
}

fn relations_of<'a>(
    index: &'a CatalogIndex,
    battery: &Battery,
) -> StoreResult<(&'a Brand, &'a Category)> {
    let brand = index
        .brands
        .get(&battery.brand_id)
        .ok_or_else(|| StoreError::Corrupt(format!("battery {} has unknown brand", battery.id)))?;
    let category = index
        .categories
        .get(&battery.category_id)
        .ok_or_else(|| StoreError::Corrupt(format!("battery {} has unknown category", battery.id)))?;
    Ok((brand, category))
}
