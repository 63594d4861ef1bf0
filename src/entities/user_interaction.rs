use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recorded user/product interaction, consumed by the recommendation
/// pipeline. Rows are written off the request path by the event loop;
/// a lost row is acceptable, a blocked checkout is not.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_interactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub interaction_type: InteractionKind,
    pub rating_value: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Interaction kinds and their training scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    #[sea_orm(string_value = "VIEW")]
    View,
    #[sea_orm(string_value = "CART")]
    Cart,
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
}

impl InteractionKind {
    /// Score fed to the recommender when this interaction is logged.
    pub fn score(self) -> f64 {
        match self {
            InteractionKind::View => 1.0,
            InteractionKind::Cart => 3.0,
            InteractionKind::Purchase => 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_scores() {
        assert_eq!(InteractionKind::View.score(), 1.0);
        assert_eq!(InteractionKind::Cart.score(), 3.0);
        assert_eq!(InteractionKind::Purchase.score(), 5.0);
    }
}
