use crate::{
    entities::{
        cart::{self, Entity as Cart},
        cart_item::{self, Entity as CartItem},
        product::Entity as Product,
        user_interaction::InteractionKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Cart store: per-user cart contents keyed by variant.
///
/// The stock check here is a soft check: stock can change between add
/// and checkout, so the inventory ledger's `reserve` at checkout is the
/// final authority.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    inventory: Arc<InventoryService>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        inventory: Arc<InventoryService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            inventory,
        }
    }

    /// Adds a variant to the user's cart, merging into an existing line
    /// if the variant is already present. The cart itself is created
    /// lazily on first add.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartRequest,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let variant = self.inventory.get_variant(&txn, input.variant_id).await?;

        let cart = match Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                let now = Utc::now();
                cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::VariantId.eq(input.variant_id))
            .one(&txn)
            .await?;

        let combined = existing.as_ref().map_or(0, |item| item.quantity) + input.quantity;
        if variant.stock_quantity < combined {
            return Err(ServiceError::InsufficientStock(format!(
                "variant {}: requested {}, available {}",
                variant.sku, combined, variant.stock_quantity
            )));
        }

        if let Some(item) = existing {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(combined);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                variant_id: Set(input.variant_id),
                quantity: Set(input.quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        let mut touched: cart::ActiveModel = cart.clone().into();
        touched.updated_at = Set(Utc::now());
        touched.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                variant_id: input.variant_id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::Interaction {
                user_id,
                product_id: variant.product_id,
                kind: InteractionKind::Cart,
            })
            .await;

        info!(
            cart_id = %cart.id,
            variant_id = %input.variant_id,
            quantity = input.quantity,
            "Added item to cart"
        );
        self.get_cart(user_id).await
    }

    /// Removes a line, but only from the requesting user's own cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let item = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let cart = Cart::find_by_id(item.cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", item.cart_id)))?;

        if cart.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Cart item belongs to another user".to_string(),
            ));
        }

        let cart_id = cart.id;
        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { cart_id, item_id })
            .await;

        info!(cart_id = %cart_id, item_id = %item_id, "Removed cart item");
        Ok(())
    }

    /// Read view with computed totals. A user without a cart gets an
    /// empty view, not an error.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(CartView::empty());
        };

        let lines = cart
            .find_related(CartItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total_amount = Decimal::ZERO;
        for line in lines {
            let variant = self.inventory.get_variant(&*self.db, line.variant_id).await?;
            let product = Product::find_by_id(variant.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", variant.product_id))
                })?;

            let line_total = variant.price * Decimal::from(line.quantity);
            total_amount += line_total;
            items.push(CartItemView {
                id: line.id,
                product_id: product.id,
                product_name: product.name,
                color: variant.color,
                size: variant.size,
                unit_price: variant.price,
                quantity: line.quantity,
                line_total,
            });
        }

        Ok(CartView {
            id: Some(cart.id),
            total_amount,
            total_items: items.len() as i32,
            items,
        })
    }

    /// Empties the cart on the caller's connection. Called only by the
    /// order workflow inside its checkout transaction.
    pub(crate) async fn clear_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(conn)
            .await?;

        let cart = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;
        let mut cart: cart::ActiveModel = cart.into();
        cart.updated_at = Set(Utc::now());
        cart.update(conn).await?;

        Ok(())
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    pub variant_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Cart read view with computed totals
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub id: Option<Uuid>,
    pub total_amount: Decimal,
    pub total_items: i32,
    pub items: Vec<CartItemView>,
}

impl CartView {
    fn empty() -> Self {
        Self {
            id: None,
            total_amount: Decimal::ZERO,
            total_items: 0,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_to_cart_request_rejects_non_positive_quantity() {
        let zero = AddToCartRequest {
            variant_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(zero.validate().is_err());

        let negative = AddToCartRequest {
            variant_id: Uuid::new_v4(),
            quantity: -3,
        };
        assert!(negative.validate().is_err());

        let one = AddToCartRequest {
            variant_id: Uuid::new_v4(),
            quantity: 1,
        };
        assert!(one.validate().is_ok());
    }

    #[test]
    fn add_to_cart_request_deserialization() {
        let json = r#"{
            "variant_id": "550e8400-e29b-41d4-a716-446655440000",
            "quantity": 3
        }"#;

        let input: AddToCartRequest =
            serde_json::from_str(json).expect("deserialization should succeed");
        assert_eq!(input.quantity, 3);
        assert_eq!(
            input.variant_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn empty_cart_view() {
        let view = CartView::empty();
        assert!(view.id.is_none());
        assert_eq!(view.total_amount, Decimal::ZERO);
        assert_eq!(view.total_items, 0);
        assert!(view.items.is_empty());
    }

    #[test]
    fn line_total_arithmetic() {
        let unit_price = dec!(25.50);
        let line_total = unit_price * Decimal::from(3);
        assert_eq!(line_total, dec!(76.50));
    }
}
