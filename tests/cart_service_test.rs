//! Cart store behavior: lazy creation, line merging, the soft stock
//! check, ownership-scoped removal, and interaction recording.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::time::Duration;
use storefront_api::{
    entities::user_interaction::{self, Entity as UserInteraction},
    errors::ServiceError,
    services::carts::AddToCartRequest,
};
use uuid::Uuid;

#[tokio::test]
async fn get_cart_returns_empty_view_for_new_user() {
    let app = TestApp::new().await;
    let view = app.carts.get_cart(Uuid::new_v4()).await.expect("cart view");

    assert!(view.id.is_none());
    assert_eq!(view.total_amount, Decimal::ZERO);
    assert_eq!(view.total_items, 0);
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn add_item_creates_cart_lazily_and_computes_totals() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let variant = app.seed_variant("SHIRT-BLU-M", dec!(25.50), 10).await;

    let view = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 3,
            },
        )
        .await
        .expect("add item");

    assert!(view.id.is_some());
    assert_eq!(view.total_items, 1);
    assert_eq!(view.items[0].quantity, 3);
    assert_eq!(view.items[0].unit_price, dec!(25.50));
    assert_eq!(view.items[0].line_total, dec!(76.50));
    assert_eq!(view.total_amount, dec!(76.50));
    // Adding to the cart does not touch stock.
    assert_eq!(app.stock_of(variant.id).await, 10);
}

#[tokio::test]
async fn adding_same_variant_merges_into_one_line() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let variant = app.seed_variant("SHIRT-RED-L", dec!(10.00), 10).await;

    app.carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 2,
            },
        )
        .await
        .expect("first add");
    let view = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 3,
            },
        )
        .await
        .expect("second add");

    assert_eq!(view.total_items, 1, "lines must merge, not duplicate");
    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.total_amount, dec!(50.00));
}

#[tokio::test]
async fn add_item_rejects_quantity_beyond_stock() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let variant = app.seed_variant("SCARF-GRN", dec!(15.00), 4).await;

    let err = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 5,
            },
        )
        .await
        .expect_err("should exceed stock");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The combined quantity across adds is what counts.
    app.carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 3,
            },
        )
        .await
        .expect("first add fits");
    let err = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 2,
            },
        )
        .await
        .expect_err("combined quantity exceeds stock");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The failed add must not have grown the line.
    let view = app.carts.get_cart(user_id).await.expect("cart view");
    assert_eq!(view.items[0].quantity, 3);
}

#[tokio::test]
async fn add_item_validates_quantity_and_variant() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let variant = app.seed_variant("HAT-BLK", dec!(8.00), 5).await;

    let err = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 0,
            },
        )
        .await
        .expect_err("zero quantity");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = app
        .carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await
        .expect_err("unknown variant");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn remove_item_is_scoped_to_the_owner() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let variant = app.seed_variant("BELT-BRN", dec!(12.00), 5).await;

    let view = app
        .carts
        .add_item(
            owner,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 1,
            },
        )
        .await
        .expect("add item");
    let item_id = view.items[0].id;

    let err = app
        .carts
        .remove_item(stranger, item_id)
        .await
        .expect_err("stranger cannot remove");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = app
        .carts
        .remove_item(owner, Uuid::new_v4())
        .await
        .expect_err("unknown item");
    assert!(matches!(err, ServiceError::NotFound(_)));

    app.carts
        .remove_item(owner, item_id)
        .await
        .expect("owner removes");
    let view = app.carts.get_cart(owner).await.expect("cart view");
    assert_eq!(view.total_items, 0);
}

#[tokio::test]
async fn add_item_records_a_cart_interaction() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let variant = app.seed_variant("SOCK-WHT", dec!(3.00), 9).await;

    app.carts
        .add_item(
            user_id,
            AddToCartRequest {
                variant_id: variant.id,
                quantity: 1,
            },
        )
        .await
        .expect("add item");

    // Interaction recording is best-effort and asynchronous; poll
    // briefly for the row to land.
    let mut recorded = Vec::new();
    for _ in 0..100 {
        recorded = UserInteraction::find()
            .filter(user_interaction::Column::UserId.eq(user_id))
            .all(&*app.db)
            .await
            .expect("query interactions");
        if !recorded.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].product_id, variant.product_id);
    assert_eq!(recorded[0].rating_value, 3.0);
}
