//! GHN (Giao Hàng Nhanh) carrier integration.
//!
//! The client speaks the carrier's JSON envelope protocol, the cache sits in
//! front of it for lookups whose answers rarely change.

mod cache;
mod client;
mod types;

use reqwest::StatusCode;
use secrecy::SecretString;
use thiserror::Error;

pub use cache::ShippingCache;
pub use client::GhnClient;
pub use types::{
    District, OrderParcel, PreviewInfo, Province, Recipient, ShippingOrderCreated, Ward,
};

/// Connection settings for the carrier API.
#[derive(Debug, Clone)]
pub struct GhnConfig {
    /// Base URL without a trailing slash, e.g. `https://dev-online-gateway.ghn.vn/shiip/public-api`.
    pub endpoint: String,
    pub token: SecretString,
    pub shop_id: String,
}

#[derive(Debug, Error)]
pub enum GhnError {
    #[error("request to carrier failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("carrier responded with HTTP {0}")]
    Status(StatusCode),

    #[error("carrier rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("carrier response carried no data")]
    MissingData,

    #[error("carrier response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}
