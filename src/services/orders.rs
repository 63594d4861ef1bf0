use crate::{
    entities::{
        cart::{self, Entity as Cart},
        cart_item::Entity as CartItem,
        order::{self, Entity as Order, OrderStatus, PaymentMethod},
        order_item::{self, Entity as OrderItem},
        product::Entity as Product,
        user_interaction::InteractionKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{carts::CartService, inventory::InventoryService},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ORDERS_PLACED: IntCounter = register_int_counter!(
        "storefront_orders_placed_total",
        "Total number of orders placed"
    )
    .expect("metric can be created");
    static ref ORDERS_CANCELLED: IntCounter = register_int_counter!(
        "storefront_orders_cancelled_total",
        "Total number of orders cancelled"
    )
    .expect("metric can be created");
}

/// Order workflow: converts carts into orders and drives the order
/// lifecycle.
///
/// Checkout runs as one transaction: stock reservations, the order
/// insert, and the cart clear all commit or all roll back, so no other
/// request ever observes a partial order or a leaked reservation.
/// Lifecycle transitions are applied with a status-guarded UPDATE so
/// two concurrent transitions on one order cannot both win.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    inventory: Arc<InventoryService>,
    carts: Arc<CartService>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        inventory: Arc<InventoryService>,
        carts: Arc<CartService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            inventory,
            carts,
        }
    }

    /// Places an order from the user's cart.
    ///
    /// Reserves stock for every line, snapshots prices and shipping
    /// details, persists the order as `PENDING`, and clears the cart.
    /// If any reservation fails the whole transaction rolls back and
    /// the error names the offending variant.
    #[instrument(skip(self, request))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        request: PlaceOrderRequest,
    ) -> Result<OrderSnapshot, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let lines = cart.find_related(CartItem).all(&txn).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let mut total_amount = Decimal::ZERO;
        let mut item_models = Vec::with_capacity(lines.len());
        let mut purchased_products: Vec<Uuid> = Vec::new();

        for line in &lines {
            self.inventory
                .reserve(&txn, line.variant_id, line.quantity)
                .await?;

            let variant = self.inventory.get_variant(&txn, line.variant_id).await?;
            let product = Product::find_by_id(variant.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", variant.product_id))
                })?;

            total_amount += variant.price * Decimal::from(line.quantity);
            if !purchased_products.contains(&variant.product_id) {
                purchased_products.push(variant.product_id);
            }

            item_models.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                variant_id: Set(variant.id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                color: Set(variant.color),
                size: Set(variant.size),
                quantity: Set(line.quantity),
                unit_price: Set(variant.price),
                created_at: Set(now),
            });
        }

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            order_date: Set(now),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total_amount),
            payment_method: Set(request.payment_method),
            receiver_name: Set(request.receiver_name),
            shipping_address: Set(request.shipping_address),
            shipping_phone: Set(request.phone_number),
            delivery_date: Set(None),
            cancel_reason: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(item_models.len());
        for item in item_models {
            items.push(item.insert(&txn).await?);
        }

        self.carts.clear_items(&txn, cart.id).await?;

        txn.commit().await?;

        ORDERS_PLACED.inc();
        self.event_sender
            .send_or_log(Event::OrderPlaced(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;
        for product_id in purchased_products {
            self.event_sender
                .send_or_log(Event::Interaction {
                    user_id,
                    product_id,
                    kind: InteractionKind::Purchase,
                })
                .await;
        }

        info!(
            order_id = %order_id,
            total = %order.total_amount,
            items = items.len(),
            "Order placed"
        );
        Ok(to_snapshot(order, items))
    }

    /// The caller's order history, newest first.
    #[instrument(skip(self))]
    pub async fn get_my_orders(&self, user_id: Uuid) -> Result<Vec<OrderSnapshot>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::OrderDate)
            .all(&*self.db)
            .await?;

        let mut snapshots = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.load_items(&*self.db, order.id).await?;
            snapshots.push(to_snapshot(order, items));
        }
        Ok(snapshots)
    }

    /// Single order, restricted to its owner.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderSnapshot, ServiceError> {
        let order = self.find_order(&*self.db, order_id).await?;
        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }
        let items = self.load_items(&*self.db, order.id).await?;
        Ok(to_snapshot(order, items))
    }

    /// User-initiated cancellation. Only the owner may cancel, and only
    /// while the order is still `PENDING`; stock returns to the shelf.
    #[instrument(skip(self))]
    pub async fn user_cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderSnapshot, ServiceError> {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Changed mind".to_string());

        let txn = self.db.begin().await?;

        let order = self.find_order(&txn, order_id).await?;
        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::invalid_transition(
                order.status,
                OrderStatus::Cancelled,
            ));
        }

        let released = self.apply_cancellation(&txn, &order, reason).await?;
        txn.commit().await?;

        self.emit_cancellation(order_id, &released).await;
        self.load_snapshot(order_id).await
    }

    /// Admin lifecycle transition. Permits exactly the transitions of
    /// the status table; everything else fails with
    /// `InvalidStateTransition` naming both states.
    #[instrument(skip(self))]
    pub async fn admin_update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderSnapshot, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.find_order(&txn, order_id).await?;
        if !order.status.can_transition_to(new_status) {
            return Err(ServiceError::invalid_transition(order.status, new_status));
        }

        let old_status = order.status;
        let mut released = Vec::new();
        match new_status {
            OrderStatus::Cancelled => {
                released = self
                    .apply_cancellation(&txn, &order, "Cancelled by admin".to_string())
                    .await?;
            }
            OrderStatus::Delivered => {
                self.guarded_transition(&txn, &order, new_status, true, None)
                    .await?;
            }
            _ => {
                self.guarded_transition(&txn, &order, new_status, false, None)
                    .await?;
            }
        }

        txn.commit().await?;

        if new_status == OrderStatus::Cancelled {
            self.emit_cancellation(order_id, &released).await;
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );
        self.load_snapshot(order_id).await
    }

    /// Admin listing, newest first, with pagination.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderSnapshot>, u64), ServiceError> {
        let paginator = Order::find()
            .order_by_desc(order::Column::OrderDate)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut snapshots = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.load_items(&*self.db, order.id).await?;
            snapshots.push(to_snapshot(order, items));
        }
        Ok((snapshots, total))
    }

    /// Applies the transition as a single UPDATE guarded on the status
    /// observed at read time. Zero rows affected means another request
    /// transitioned the order first.
    async fn guarded_transition<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        new_status: OrderStatus,
        set_delivery_date: bool,
        cancel_reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut update = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now));

        if set_delivery_date {
            update = update.col_expr(order::Column::DeliveryDate, Expr::value(Some(now)));
        }
        if let Some(reason) = cancel_reason {
            update = update.col_expr(order::Column::CancelReason, Expr::value(Some(reason)));
        }

        let result = update
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(order.status))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order.id));
        }
        Ok(())
    }

    /// Cancels and restocks. Returns the released items so the caller
    /// can emit events after its transaction commits.
    async fn apply_cancellation<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        reason: String,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        self.guarded_transition(conn, order, OrderStatus::Cancelled, false, Some(reason))
            .await?;

        let items = order.find_related(OrderItem).all(conn).await?;
        for item in &items {
            self.inventory
                .release(conn, item.variant_id, item.quantity)
                .await?;
        }
        Ok(items)
    }

    async fn emit_cancellation(&self, order_id: Uuid, released: &[order_item::Model]) {
        ORDERS_CANCELLED.inc();
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        for item in released {
            self.event_sender
                .send_or_log(Event::StockReleased {
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                })
                .await;
        }
    }

    async fn find_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(conn)
            .await?)
    }

    async fn load_snapshot(&self, order_id: Uuid) -> Result<OrderSnapshot, ServiceError> {
        let order = self.find_order(&*self.db, order_id).await?;
        let items = self.load_items(&*self.db, order_id).await?;
        Ok(to_snapshot(order, items))
    }
}

fn to_snapshot(order: order::Model, items: Vec<order_item::Model>) -> OrderSnapshot {
    OrderSnapshot {
        id: order.id,
        order_date: order.order_date,
        total_amount: order.total_amount,
        status: order.status,
        payment_method: order.payment_method,
        shipping_address: order.shipping_address,
        delivery_date: order.delivery_date,
        cancel_reason: order.cancel_reason,
        items: items
            .into_iter()
            .map(|item| OrderItemSnapshot {
                product_id: item.product_id,
                product_name: item.product_name,
                color: item.color,
                size: item.size,
                quantity: item.quantity,
                price: item.unit_price,
            })
            .collect(),
    }
}

/// Input for placing an order. The shipping fields are copied verbatim
/// onto the order as a snapshot.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "Receiver name is required"))]
    pub receiver_name: String,
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
    pub payment_method: PaymentMethod,
}

/// Input for an admin status transition
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Read view of an order and its immutable lines
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub items: Vec<OrderItemSnapshot>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemSnapshot {
    pub product_id: Uuid,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub quantity: i32,
    pub price: Decimal,
}
