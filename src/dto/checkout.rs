use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Area id or ward code as posted by the checkout form: either a JSON number
/// or the string the `<select>` produced, possibly blank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AreaId {
    Number(i64),
    Text(String),
}

impl AreaId {
    /// Trimmed textual form; `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AreaId::Number(n) => Some(n.to_string()),
            AreaId::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PreviewOrderRequest {
    pub district: Option<AreaId>,
    pub ward: Option<AreaId>,
}

/// Checkout form as posted by the storefront.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct SubmitOrderRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub full_address: Option<String>,
    pub province: Option<AreaId>,
    pub district: Option<AreaId>,
    pub ward: Option<AreaId>,
    pub note: Option<String>,
    pub payment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitOrderResponse {
    pub order_id: Uuid,
    pub shipping_code: String,
    pub total_amount: i64,
    pub shipping_fee: i64,
}
