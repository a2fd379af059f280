use serde::Serialize;
use utoipa::ToSchema;

use crate::models::OrderSummary;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderSummary>,
}
