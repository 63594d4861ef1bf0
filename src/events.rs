use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::user_interaction::{self, InteractionKind};

/// Events emitted by the services. Everything here is advisory: the
/// sender never observes the outcome of event handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    CartItemAdded {
        cart_id: Uuid,
        variant_id: Uuid,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared(Uuid),
    StockReleased {
        variant_id: Uuid,
        quantity: i32,
    },
    Interaction {
        user_id: Uuid,
        product_id: Uuid,
        kind: InteractionKind,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing the failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget send. A full or closed channel is logged and
    /// dropped; the request path never fails because of it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Persists interaction rows for the recommendation pipeline.
struct InteractionRecorder {
    db: Arc<DatabaseConnection>,
}

impl InteractionRecorder {
    fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn record(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), DbErr> {
        let interaction = user_interaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            interaction_type: Set(kind),
            rating_value: Set(kind.score()),
            occurred_at: Set(Utc::now()),
        };
        interaction.insert(&*self.db).await?;
        Ok(())
    }
}

/// Consumes events off the channel. Runs as its own task for the
/// lifetime of the process; interaction-recording failures are logged
/// and dropped so they can never affect an order outcome.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, db: Arc<DatabaseConnection>) {
    info!("Starting event processing loop");
    let recorder = InteractionRecorder::new(db);

    while let Some(event) = rx.recv().await {
        match event {
            Event::Interaction {
                user_id,
                product_id,
                kind,
            } => {
                if let Err(e) = recorder.record(user_id, product_id, kind).await {
                    warn!(
                        user_id = %user_id,
                        product_id = %product_id,
                        error = %e,
                        "Failed to record interaction; dropping"
                    );
                }
            }
            Event::OrderPlaced(order_id) => {
                info!(order_id = %order_id, "Order placed");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "Order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status changed"
                );
            }
            other => {
                debug!("Event observed: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_never_fails_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or return an error to the caller.
        sender.send_or_log(Event::OrderPlaced(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn send_surfaces_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::CartCleared(Uuid::new_v4())).await.is_err());
    }
}
