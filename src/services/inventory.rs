use crate::{
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

lazy_static! {
    static ref STOCK_RESERVATIONS: IntCounter = register_int_counter!(
        "storefront_stock_reservations_total",
        "Total number of successful stock reservations"
    )
    .expect("metric can be created");
    static ref STOCK_RESERVATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "storefront_stock_reservation_failures_total",
        "Total number of failed stock reservations",
        &["error_type"]
    )
    .expect("metric can be created");
    static ref STOCK_RELEASES: IntCounter = register_int_counter!(
        "storefront_stock_releases_total",
        "Total number of stock releases"
    )
    .expect("metric can be created");
}

/// Inventory ledger. Sole owner of stock mutation: every decrement goes
/// through [`reserve`](InventoryService::reserve) and every increment
/// through [`release`](InventoryService::release), so no other code path
/// can drive a counter negative.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Catalog read used by the cart and order workflows. Runs on the
    /// caller's connection so it sees uncommitted state inside a
    /// checkout transaction.
    pub async fn get_variant<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        ProductVariant::find_by_id(variant_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))
    }

    /// Atomically checks `stock >= quantity` and decrements in a single
    /// conditional UPDATE. Zero rows affected means the check failed;
    /// the row is never observed below zero, and two concurrent callers
    /// racing for the last unit cannot both succeed.
    #[instrument(skip(self, conn))]
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity < 1 {
            STOCK_RESERVATION_FAILURES
                .with_label_values(&["invalid_quantity"])
                .inc();
            return Err(ServiceError::ValidationError(format!(
                "Reservation quantity must be at least 1, got {}",
                quantity
            )));
        }

        let result = ProductVariant::update_many()
            .col_expr(
                product_variant::Column::StockQuantity,
                Expr::col(product_variant::Column::StockQuantity).sub(quantity),
            )
            .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product_variant::Column::Id.eq(variant_id))
            .filter(product_variant::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return match ProductVariant::find_by_id(variant_id).one(conn).await? {
                Some(variant) => {
                    STOCK_RESERVATION_FAILURES
                        .with_label_values(&["insufficient_stock"])
                        .inc();
                    Err(ServiceError::InsufficientStock(format!(
                        "variant {}: requested {}, available {}",
                        variant.sku, quantity, variant.stock_quantity
                    )))
                }
                None => {
                    STOCK_RESERVATION_FAILURES
                        .with_label_values(&["variant_not_found"])
                        .inc();
                    Err(ServiceError::NotFound(format!(
                        "Variant {} not found",
                        variant_id
                    )))
                }
            };
        }

        STOCK_RESERVATIONS.inc();
        Ok(())
    }

    /// Returns previously reserved stock, e.g. on cancellation. Callers
    /// are responsible for not releasing the same reservation twice.
    #[instrument(skip(self, conn))]
    pub async fn release<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Release quantity must be at least 1, got {}",
                quantity
            )));
        }

        let result = ProductVariant::update_many()
            .col_expr(
                product_variant::Column::StockQuantity,
                Expr::col(product_variant::Column::StockQuantity).add(quantity),
            )
            .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product_variant::Column::Id.eq(variant_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Variant {} not found",
                variant_id
            )));
        }

        STOCK_RELEASES.inc();
        Ok(())
    }

    /// Admin restock: overwrite a variant's counter outright. Not part
    /// of the checkout path; reservations still go through `reserve`.
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<product_variant::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Stock quantity cannot be negative, got {}",
                quantity
            )));
        }

        let variant = self.get_variant(&*self.db, variant_id).await?;
        let mut active: product_variant::ActiveModel = variant.into();
        active.stock_quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(variant_id = %variant_id, stock = quantity, "Stock level set");
        Ok(updated)
    }
}
