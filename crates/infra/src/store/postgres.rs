//! Postgres-backed store.
//!
//! ## Error mapping
//!
//! | Postgres error code | `StoreError` |
//! |---|---|
//! | `23505` unique violation | `Conflict` |
//! | `23503` foreign key violation | `NotFound` |
//! | anything else, pool/IO failures | `Backend` |
//!
//! Rows that no longer decode into domain values map to `Corrupt`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, instrument};
use uuid::Uuid;

use exactmatch_catalog::{
    unique_slug, Battery, BatteryImage, Brand, Category, CategoryKind, Condition, Review,
    WishlistEntry,
};
use exactmatch_core::{BatteryId, BrandId, CategoryId, Money, OrderId, UserId, WishlistId};
use exactmatch_orders::{Order, OrderLineItem, OrderSnapshot, OrderStatus, ShippingAddress};

use super::{CatalogStore, OrderStore, ReviewStore, UserStore, WishlistStore};
use crate::error::{StoreError, StoreResult};
use crate::users::UserRecord;

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("database schema is up to date");
        Ok(())
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<OrderLineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, battery_id, quantity, unit_price, total_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order_items", e))?;

        let mut items: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = get(&row, "order_id")?;
            let item = OrderLineItem {
                id: get::<Uuid>(&row, "id")?.into(),
                battery_id: get::<Uuid>(&row, "battery_id")?.into(),
                quantity: to_u32(get(&row, "quantity")?, "quantity")?,
                unit_price: money(get(&row, "unit_price")?)?,
                total_price: money(get(&row, "total_price")?)?,
            };
            items.entry(order_id).or_default().push(item);
        }
        Ok(items)
    }

    async fn orders_from_rows(&self, rows: Vec<PgRow>) -> StoreResult<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|r| get::<Uuid>(r, "id"))
            .collect::<StoreResult<Vec<_>>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = get(row, "id")?;
                order_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn money(value: Decimal) -> StoreResult<Money> {
    Money::new(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("column {column}: {value} out of range")))
}

fn opt_u32(value: Option<i64>, column: &str) -> StoreResult<Option<u32>> {
    value.map(|v| to_u32(v, column)).transpose()
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

fn brand_from_row(row: &PgRow) -> StoreResult<Brand> {
    Ok(Brand {
        id: get::<Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        logo: get(row, "logo")?,
        description: get(row, "description")?,
        website: get(row, "website")?,
        created_at: get(row, "created_at")?,
    })
}

fn category_from_row(row: &PgRow) -> StoreResult<Category> {
    let kind: Option<String> = get(row, "kind")?;
    Ok(Category {
        id: get::<Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        description: get(row, "description")?,
        image: get(row, "image")?,
        kind: kind
            .map(|k| k.parse::<CategoryKind>())
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn battery_from_row(row: &PgRow) -> StoreResult<Battery> {
    let condition: String = get(row, "condition")?;
    let original_price: Option<Decimal> = get(row, "original_price")?;
    let seller_id: Option<Uuid> = get(row, "seller_id")?;
    Ok(Battery {
        id: get::<Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        brand_id: get::<Uuid>(row, "brand_id")?.into(),
        category_id: get::<Uuid>(row, "category_id")?.into(),
        model_number: get(row, "model_number")?,
        slug: get(row, "slug")?,
        voltage: get(row, "voltage")?,
        amp_hours: get(row, "amp_hours")?,
        cold_cranking_amps: opt_u32(get(row, "cold_cranking_amps")?, "cold_cranking_amps")?,
        reserve_capacity: opt_u32(get(row, "reserve_capacity")?, "reserve_capacity")?,
        length: get(row, "length")?,
        width: get(row, "width")?,
        height: get(row, "height")?,
        weight: get(row, "weight")?,
        condition: condition
            .parse::<Condition>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        price: money(get(row, "price")?)?,
        original_price: original_price.map(money).transpose()?,
        stock_quantity: to_u32(get(row, "stock_quantity")?, "stock_quantity")?,
        seller_id: seller_id.map(UserId::from),
        description: get(row, "description")?,
        short_description: get(row, "short_description")?,
        features: get(row, "features")?,
        compatibility: get(row, "compatibility")?,
        is_featured: get(row, "is_featured")?,
        is_popular: get(row, "is_popular")?,
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn image_from_row(row: &PgRow) -> StoreResult<BatteryImage> {
    Ok(BatteryImage {
        id: get::<Uuid>(row, "id")?.into(),
        battery_id: get::<Uuid>(row, "battery_id")?.into(),
        image: get(row, "image")?,
        alt_text: get(row, "alt_text")?,
        is_primary: get(row, "is_primary")?,
        order: to_u32(get(row, "position")?, "position")?,
    })
}

fn review_from_row(row: &PgRow) -> StoreResult<Review> {
    let rating: i16 = get(row, "rating")?;
    Ok(Review {
        id: get::<Uuid>(row, "id")?.into(),
        battery_id: get::<Uuid>(row, "battery_id")?.into(),
        user_id: get::<Uuid>(row, "user_id")?.into(),
        user_name: get(row, "user_name")?,
        rating: u8::try_from(rating)
            .map_err(|_| StoreError::Corrupt(format!("column rating: {rating} out of range")))?,
        title: get(row, "title")?,
        comment: get(row, "comment")?,
        is_verified_purchase: get(row, "is_verified_purchase")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn wishlist_from_row(row: &PgRow) -> StoreResult<WishlistEntry> {
    Ok(WishlistEntry {
        id: get::<Uuid>(row, "id")?.into(),
        user_id: get::<Uuid>(row, "user_id")?.into(),
        battery_id: get::<Uuid>(row, "battery_id")?.into(),
        created_at: get(row, "created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<UserRecord> {
    Ok(UserRecord {
        id: get::<Uuid>(row, "id")?.into(),
        username: get(row, "username")?,
        email: get(row, "email")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        date_joined: get(row, "date_joined")?,
    })
}

fn order_from_row(row: &PgRow, items: Vec<OrderLineItem>) -> StoreResult<Order> {
    let status: String = get(row, "status")?;
    let snapshot = OrderSnapshot {
        id: get::<Uuid>(row, "id")?.into(),
        user_id: get::<Uuid>(row, "user_id")?.into(),
        user_name: get(row, "user_name")?,
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        subtotal: money(get(row, "subtotal")?)?,
        shipping_cost: money(get(row, "shipping_cost")?)?,
        tax_amount: money(get(row, "tax_amount")?)?,
        total_amount: money(get(row, "total_amount")?)?,
        shipping: ShippingAddress {
            shipping_address: get(row, "shipping_address")?,
            shipping_city: get(row, "shipping_city")?,
            shipping_postal_code: get(row, "shipping_postal_code")?,
            shipping_country: get(row, "shipping_country")?,
            phone_number: get(row, "phone_number")?,
        },
        items,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        shipped_at: get(row, "shipped_at")?,
        delivered_at: get(row, "delivered_at")?,
    };
    Order::rehydrate(snapshot).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let rows = sqlx::query("SELECT * FROM brands ORDER BY lower(name), id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_brands", e))?;
        rows.iter().map(brand_from_row).collect()
    }

    async fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>> {
        let row = sqlx::query("SELECT * FROM brands WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_brand", e))?;
        row.as_ref().map(brand_from_row).transpose()
    }

    #[instrument(skip(self, brand), fields(brand_id = %brand.id), err)]
    async fn insert_brand(&self, brand: Brand) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO brands (id, name, logo, description, website, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*brand.id.as_uuid())
        .bind(&brand.name)
        .bind(&brand.logo)
        .bind(&brand.description)
        .bind(&brand.website)
        .bind(brand.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_brand", e))?;
        Ok(())
    }

    async fn list_categories(&self, kind: Option<CategoryKind>) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT * FROM categories WHERE ($1::TEXT IS NULL OR kind = $1) ORDER BY lower(name), id",
        )
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: Category) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, image, kind, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.kind.map(|k| k.as_str()))
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn list_batteries(&self) -> StoreResult<Vec<Battery>> {
        let rows = sqlx::query("SELECT * FROM batteries")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_batteries", e))?;
        rows.iter().map(battery_from_row).collect()
    }

    async fn get_battery(&self, id: BatteryId) -> StoreResult<Option<Battery>> {
        let row = sqlx::query("SELECT * FROM batteries WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_battery", e))?;
        row.as_ref().map(battery_from_row).transpose()
    }

    async fn prices_of(&self, ids: &[BatteryId]) -> StoreResult<HashMap<BatteryId, Money>> {
        let rows = sqlx::query("SELECT id, price FROM batteries WHERE id = ANY($1)")
            .bind(uuids(ids))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("prices_of", e))?;
        rows.iter()
            .map(|row| -> StoreResult<(BatteryId, Money)> {
                Ok((get::<Uuid>(row, "id")?.into(), money(get(row, "price")?)?))
            })
            .collect()
    }

    #[instrument(skip(self, battery), fields(battery_id = %battery.id, slug = %battery.slug), err)]
    async fn insert_battery(&self, mut battery: Battery) -> StoreResult<Battery> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let brand_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM brands WHERE id = $1)")
            .bind(*battery.brand_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_brand", e))?;
        if !brand_exists {
            return Err(StoreError::NotFound(format!("brand {}", battery.brand_id)));
        }
        let category_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(*battery.category_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("check_category", e))?;
        if !category_exists {
            return Err(StoreError::NotFound(format!("category {}", battery.category_id)));
        }

        let taken: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM batteries WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(&battery.slug)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_slugs", e))?
        .into_iter()
        .collect();
        battery.slug = unique_slug(&battery.slug, |candidate| taken.contains(candidate));

        sqlx::query(
            r#"
            INSERT INTO batteries (
                id, name, brand_id, category_id, model_number, slug,
                voltage, amp_hours, cold_cranking_amps, reserve_capacity,
                length, width, height, weight,
                condition, price, original_price, stock_quantity, seller_id,
                description, short_description, features, compatibility,
                is_featured, is_popular, is_active, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14,
                $15, $16, $17, $18, $19,
                $20, $21, $22, $23,
                $24, $25, $26, $27, $28
            )
            "#,
        )
        .bind(*battery.id.as_uuid())
        .bind(&battery.name)
        .bind(*battery.brand_id.as_uuid())
        .bind(*battery.category_id.as_uuid())
        .bind(&battery.model_number)
        .bind(&battery.slug)
        .bind(battery.voltage)
        .bind(battery.amp_hours)
        .bind(battery.cold_cranking_amps.map(i64::from))
        .bind(battery.reserve_capacity.map(i64::from))
        .bind(battery.length)
        .bind(battery.width)
        .bind(battery.height)
        .bind(battery.weight)
        .bind(battery.condition.as_str())
        .bind(battery.price.amount())
        .bind(battery.original_price.map(|p| p.amount()))
        .bind(i64::from(battery.stock_quantity))
        .bind(battery.seller_id.map(Uuid::from))
        .bind(&battery.description)
        .bind(&battery.short_description)
        .bind(&battery.features)
        .bind(&battery.compatibility)
        .bind(battery.is_featured)
        .bind(battery.is_popular)
        .bind(battery.is_active)
        .bind(battery.created_at)
        .bind(battery.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_battery", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(battery)
    }

    async fn images_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<BatteryImage>> {
        let rows = sqlx::query(
            "SELECT * FROM battery_images WHERE battery_id = ANY($1) ORDER BY position, id",
        )
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("images_for", e))?;
        rows.iter().map(image_from_row).collect()
    }

    async fn insert_image(&self, image: BatteryImage) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO battery_images (id, battery_id, image, alt_text, is_primary, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*image.id.as_uuid())
        .bind(*image.battery_id.as_uuid())
        .bind(&image.image)
        .bind(&image.alt_text)
        .bind(image.is_primary)
        .bind(i64::from(image.order))
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_image", e) {
            StoreError::NotFound(_) => StoreError::NotFound(format!("battery {}", image.battery_id)),
            other => other,
        })?;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for PostgresStore {
    async fn reviews_for(&self, ids: &[BatteryId]) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query(
            "SELECT * FROM reviews WHERE battery_id = ANY($1) ORDER BY created_at DESC, id DESC",
        )
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("reviews_for", e))?;
        rows.iter().map(review_from_row).collect()
    }

    #[instrument(skip(self, review), fields(battery_id = %review.battery_id, user_id = %review.user_id), err)]
    async fn insert_review(&self, review: Review) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, battery_id, user_id, user_name, rating, title, comment,
                is_verified_purchase, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*review.id.as_uuid())
        .bind(*review.battery_id.as_uuid())
        .bind(*review.user_id.as_uuid())
        .bind(&review.user_name)
        .bind(i16::from(review.rating))
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_verified_purchase)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_review", e) {
            StoreError::Conflict(_) => StoreError::Conflict(format!(
                "user {} already reviewed battery {}",
                review.user_id, review.battery_id
            )),
            StoreError::NotFound(_) => StoreError::NotFound(format!("battery {}", review.battery_id)),
            other => other,
        })?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), item_count = order.items().len()),
        err
    )]
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let totals = order.totals();
        let shipping = order.shipping();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, user_name, status,
                subtotal, shipping_cost, tax_amount, total_amount,
                shipping_address, shipping_city, shipping_postal_code, shipping_country, phone_number,
                created_at, updated_at, shipped_at, delivered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(*order.id_typed().as_uuid())
        .bind(*order.user_id().as_uuid())
        .bind(order.user_name())
        .bind(order.status().as_str())
        .bind(totals.subtotal.amount())
        .bind(totals.shipping_cost.amount())
        .bind(totals.tax_amount.amount())
        .bind(totals.total_amount.amount())
        .bind(&shipping.shipping_address)
        .bind(&shipping.shipping_city)
        .bind(&shipping.shipping_postal_code)
        .bind(&shipping.shipping_country)
        .bind(&shipping.phone_number)
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (line_no, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, line_no, battery_id, quantity, unit_price, total_price
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(*order.id_typed().as_uuid())
            .bind(line_no as i64)
            .bind(*item.battery_id.as_uuid())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.amount())
            .bind(item.total_price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("insert_order_item", e) {
                StoreError::NotFound(_) => StoreError::NotFound(format!("battery {}", item.battery_id)),
                other => other,
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        match row {
            Some(row) => Ok(self.orders_from_rows(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, user: Option<UserId>) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user.map(Uuid::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;
        self.orders_from_rows(rows).await
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed(), status = %order.status()), err)]
    async fn update_order_status(&self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3, shipped_at = $4, delivered_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*order.id_typed().as_uuid())
        .bind(order.status().as_str())
        .bind(order.updated_at())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_order_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {}", order.id_typed())));
        }
        Ok(())
    }

    async fn has_purchased(&self, user: UserId, battery: BatteryId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM order_items i
                JOIN orders o ON o.id = i.order_id
                WHERE o.user_id = $1 AND i.battery_id = $2
            )
            "#,
        )
        .bind(*user.as_uuid())
        .bind(*battery.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("has_purchased", e))
    }
}

#[async_trait]
impl WishlistStore for PostgresStore {
    async fn list_wishlist(&self, user: UserId) -> StoreResult<Vec<WishlistEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM wishlist WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(*user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_wishlist", e))?;
        rows.iter().map(wishlist_from_row).collect()
    }

    async fn add_to_wishlist(&self, entry: WishlistEntry) -> StoreResult<WishlistEntry> {
        sqlx::query(
            r#"
            INSERT INTO wishlist (id, user_id, battery_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, battery_id) DO NOTHING
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.user_id.as_uuid())
        .bind(*entry.battery_id.as_uuid())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("add_to_wishlist", e) {
            StoreError::NotFound(_) => StoreError::NotFound(format!("battery {}", entry.battery_id)),
            other => other,
        })?;

        let row = sqlx::query("SELECT * FROM wishlist WHERE user_id = $1 AND battery_id = $2")
            .bind(*entry.user_id.as_uuid())
            .bind(*entry.battery_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_wishlist_entry", e))?;
        wishlist_from_row(&row)
    }

    async fn remove_from_wishlist(&self, user: UserId, id: WishlistId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM wishlist WHERE id = $1 AND user_id = $2")
            .bind(*id.as_uuid())
            .bind(*user.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_from_wishlist", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("wishlist entry {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn upsert_user(&self, profile: UserRecord) -> StoreResult<UserRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, date_joined)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name
            RETURNING *
            "#,
        )
        .bind(*profile.id.as_uuid())
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.date_joined)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_user", e))?;
        user_from_row(&row)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{battery, brand, category, order_for};
    use chrono::{DateTime, DurationRound, Utc};

    /// Timestamps come back from Postgres at microsecond precision.
    fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.duration_trunc(chrono::Duration::microseconds(1)).unwrap_or(ts)
    }

    /// Runs only when `TEST_DATABASE_URL` points at a disposable database.
    async fn store() -> Option<PostgresStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(PostgresStore::connect(&url).await.unwrap())
    }

    #[tokio::test]
    async fn order_roundtrip_and_atomic_failure() {
        let Some(store) = store().await else {
            return;
        };

        let brand = brand("Exide");
        let category = category("Marine");
        store.insert_brand(brand.clone()).await.unwrap();
        store.insert_category(category.clone()).await.unwrap();
        let b = store
            .insert_battery(battery(&brand, &category, "Edge", 300))
            .await
            .unwrap();

        let user = UserId::new();
        let order = order_for(user, &[(b.id, 2, 300)]);
        store.insert_order(&order).await.unwrap();
        let stored = store.get_order(order.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.totals(), order.totals());
        assert_eq!(stored.items().len(), 1);
        assert_eq!(truncate_micros(stored.created_at()), truncate_micros(order.created_at()));

        let ghost = order_for(user, &[(b.id, 1, 300), (BatteryId::new(), 1, 5)]);
        let err = store.insert_order(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.get_order(ghost.id_typed()).await.unwrap().is_none());
    }
}
