pub mod carts;
pub mod orders;

use crate::events::EventSender;
use crate::services::{carts::CartService, inventory::InventoryService, orders::OrderService};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregated services consumed by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        let inventory = Arc::new(InventoryService::new(db.clone()));
        let carts = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            inventory.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            db,
            event_sender,
            inventory.clone(),
            carts.clone(),
        ));
        Self {
            inventory,
            carts,
            orders,
        }
    }
}
