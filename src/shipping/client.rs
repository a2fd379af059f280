use std::{sync::Arc, time::Duration};

use secrecy::ExposeSecret;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::instrument;

use super::types::{
    Envelope, RawCreatedOrder, RawDistrict, RawPreview, RawProvince, RawWard, create_request,
    preview_request, project_districts, project_provinces, project_wards,
};
use super::{
    District, GhnConfig, GhnError, OrderParcel, PreviewInfo, Province, Recipient,
    ShippingOrderCreated, Ward,
};
use crate::models::PaymentMethod;

/// HTTP client for the GHN public API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct GhnClient {
    inner: Arc<GhnClientInner>,
}

struct GhnClientInner {
    http: reqwest::Client,
    config: GhnConfig,
}

impl GhnClient {
    pub fn new(config: GhnConfig) -> Result<Self, GhnError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            inner: Arc::new(GhnClientInner { http, config }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.endpoint, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GhnError> {
        let status = response.status();
        if !status.is_success() {
            return Err(GhnError::Status(status));
        }
        let envelope: Envelope = response.json().await?;
        envelope.into_data()
    }

    /// Master-data lookups only need the API token.
    async fn master_data<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, GhnError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.inner.config.token.expose_secret();
        let request = match body {
            Some(body) => self.inner.http.post(self.url(path)).json(body),
            None => self.inner.http.get(self.url(path)),
        };
        let response = request.header("token", token).send().await?;
        Self::decode(response).await
    }

    /// Shipping-order endpoints are scoped to a shop.
    async fn shop_request<B, T>(&self, path: &str, body: &B) -> Result<T, GhnError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .http
            .post(self.url(path))
            .header("token", self.inner.config.token.expose_secret())
            .header("shop_id", self.inner.config.shop_id.as_str())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    pub async fn provinces(&self) -> Result<Vec<Province>, GhnError> {
        let raw: Vec<RawProvince> = self
            .master_data::<serde_json::Value, _>("/master-data/province", None)
            .await?;
        Ok(project_provinces(raw))
    }

    #[instrument(skip(self))]
    pub async fn districts(&self, province_id: i64) -> Result<Vec<District>, GhnError> {
        let body = json!({ "province_id": province_id });
        let raw: Vec<RawDistrict> = self
            .master_data("/master-data/district", Some(&body))
            .await?;
        Ok(project_districts(raw))
    }

    #[instrument(skip(self))]
    pub async fn wards(&self, district_id: i64) -> Result<Vec<Ward>, GhnError> {
        let body = json!({ "district_id": district_id });
        let raw: Vec<RawWard> = self.master_data("/master-data/ward", Some(&body)).await?;
        Ok(project_wards(raw))
    }

    #[instrument(skip(self))]
    pub async fn preview_order(&self, parcel: &OrderParcel) -> Result<PreviewInfo, GhnError> {
        let raw: RawPreview = self
            .shop_request("/v2/shipping-order/preview", &preview_request(parcel))
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self, recipient, note), fields(payment = payment.as_str()))]
    pub async fn create_order(
        &self,
        recipient: &Recipient,
        payment: PaymentMethod,
        parcel: &OrderParcel,
        note: Option<&str>,
    ) -> Result<ShippingOrderCreated, GhnError> {
        let body = create_request(recipient, payment, parcel, note);
        let raw: RawCreatedOrder = self
            .shop_request("/v2/shipping-order/create", &body)
            .await?;
        let created = ShippingOrderCreated::from(raw);
        tracing::info!(shipping_code = %created.shipping_code, "shipping order created");
        Ok(created)
    }
}
