use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use storefront_api::{
    config::AppConfig,
    entities::{order::PaymentMethod, product, product_variant},
    events::{self, EventSender},
    handlers::AppServices,
    migrator::Migrator,
    services::{
        carts::CartService,
        inventory::InventoryService,
        orders::{OrderService, PlaceOrderRequest},
    },
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Signing secret shared by the harness and token-issuing tests.
#[allow(dead_code)]
pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Test harness backed by an in-memory SQLite database.
///
/// The pool is capped at a single connection so every task shares one
/// database and concurrent operations serialize the way row locks
/// would on a server database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub inventory: Arc<InventoryService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub event_sender: EventSender,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.expect("test database");
        Migrator::up(&db, None).await.expect("migrations");
        let db = Arc::new(db);

        let (tx, rx) = mpsc::channel(64);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx, db.clone()));

        let inventory = Arc::new(InventoryService::new(db.clone()));
        let carts = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            inventory.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            inventory.clone(),
            carts.clone(),
        ));

        Self {
            db,
            inventory,
            carts,
            orders,
            event_sender,
            _event_task: event_task,
        }
    }

    /// Seeds a product with a single variant at the given price and stock.
    pub async fn seed_variant(
        &self,
        sku: &str,
        price: Decimal,
        stock: i32,
    ) -> product_variant::Model {
        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {}", sku)),
            description: Set(None),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product");

        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            sku: Set(sku.to_string()),
            color: Set("Blue".to_string()),
            size: Set("M".to_string()),
            price: Set(price),
            stock_quantity: Set(stock),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed variant")
    }

    /// Axum router over this harness's state, for HTTP-level tests.
    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        let state = AppState {
            db: self.db.clone(),
            config: AppConfig::new(
                "sqlite::memory:".to_string(),
                JWT_SECRET.to_string(),
                "127.0.0.1".to_string(),
                0,
            ),
            event_sender: self.event_sender.clone(),
            services: AppServices::new(self.db.clone(), self.event_sender.clone()),
        };
        Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state)
    }

    #[allow(dead_code)]
    pub async fn stock_of(&self, variant_id: Uuid) -> i32 {
        self.inventory
            .get_variant(&*self.db, variant_id)
            .await
            .expect("variant exists")
            .stock_quantity
    }
}

/// A well-formed shipping request for checkout tests.
#[allow(dead_code)]
pub fn shipping_request() -> PlaceOrderRequest {
    PlaceOrderRequest {
        receiver_name: "Alex Doe".to_string(),
        shipping_address: "12 Elm Street, Springfield".to_string(),
        phone_number: "0123456789".to_string(),
        payment_method: PaymentMethod::Cod,
    }
}
