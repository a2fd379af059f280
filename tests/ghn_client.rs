use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use bookstore_api::{
    models::PaymentMethod,
    shipping::{GhnClient, GhnConfig, GhnError, OrderParcel, Province, Recipient, ShippingCache},
};
use secrecy::SecretString;
use serde_json::{Value, json};

const TOKEN: &str = "test-token";
const SHOP_ID: &str = "885";

#[derive(Default)]
struct MockGhn {
    province_hits: AtomicUsize,
    last_body: Mutex<Option<Value>>,
    last_shop_id: Mutex<Option<String>>,
}

fn success(data: Value) -> Json<Value> {
    Json(json!({ "code": 200, "message": "Success", "data": data }))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("token").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

async fn provinces(State(mock): State<Arc<MockGhn>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "code": 401, "message": "Token is not valid" })));
    }
    mock.province_hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        success(json!([
            { "ProvinceID": 202, "ProvinceName": "Hồ Chí Minh", "IsEnable": 1, "Status": 1 },
            { "ProvinceID": 201, "ProvinceName": "Hà Nội", "IsEnable": 1, "Status": 1 },
            { "ProvinceID": 999, "ProvinceName": "Ngừng hoạt động", "IsEnable": 0, "Status": 1 }
        ])),
    )
}

async fn districts(State(mock): State<Arc<MockGhn>>, Json(body): Json<Value>) -> Json<Value> {
    *mock.last_body.lock().unwrap() = Some(body);
    success(json!([
        { "DistrictID": 1442, "DistrictName": "Quận 1", "IsEnable": 1, "Status": 1, "SupportType": 3 },
        { "DistrictID": 3695, "DistrictName": "Thành phố Thủ Đức", "IsEnable": 1, "Status": 1, "SupportType": 1 }
    ]))
}

async fn wards() -> Json<Value> {
    Json(json!({ "code": 400, "message": "district_id is invalid", "data": null }))
}

async fn preview(
    State(mock): State<Arc<MockGhn>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    *mock.last_shop_id.lock().unwrap() = headers
        .get("shop_id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *mock.last_body.lock().unwrap() = Some(body);
    success(json!({
        "order_code": "",
        "total_fee": 36300,
        "expected_delivery_time": "2026-10-20T16:59:59Z"
    }))
}

async fn create(State(mock): State<Arc<MockGhn>>, Json(body): Json<Value>) -> Json<Value> {
    *mock.last_body.lock().unwrap() = Some(body);
    success(json!({
        "order_code": "LX7FQK",
        "total_fee": 36300,
        "expected_delivery_time": "2026-10-20T16:59:59Z"
    }))
}

fn client_for(endpoint: &str, token: &str) -> GhnClient {
    GhnClient::new(GhnConfig {
        endpoint: endpoint.to_string(),
        token: SecretString::from(token.to_string()),
        shop_id: SHOP_ID.to_string(),
    })
    .unwrap()
}

async fn spawn_mock() -> (String, Arc<MockGhn>) {
    let mock = Arc::new(MockGhn::default());
    let app = Router::new()
        .route("/master-data/province", get(provinces))
        .route("/master-data/district", post(districts))
        .route("/master-data/ward", post(wards))
        .route("/v2/shipping-order/preview", post(preview))
        .route("/v2/shipping-order/create", post(create))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), mock)
}

async fn mock_client() -> (GhnClient, Arc<MockGhn>) {
    let (endpoint, mock) = spawn_mock().await;
    (client_for(&endpoint, TOKEN), mock)
}

fn parcel(quantity: i64) -> OrderParcel {
    OrderParcel {
        district_id: 1442,
        ward_code: "20109".into(),
        quantity,
    }
}

#[tokio::test]
async fn provinces_are_filtered_and_sorted() {
    let (client, _) = mock_client().await;
    let provinces = client.provinces().await.unwrap();
    let names: Vec<&str> = provinces.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Hà Nội", "Hồ Chí Minh"]);
}

#[tokio::test]
async fn districts_send_the_province_id() {
    let (client, mock) = mock_client().await;
    let districts = client.districts(202).await.unwrap();
    assert_eq!(districts.len(), 1);
    assert_eq!(districts[0].id, 1442);
    assert_eq!(
        mock.last_body.lock().unwrap().clone(),
        Some(json!({ "province_id": 202 }))
    );
}

#[tokio::test]
async fn rejected_envelope_is_an_error() {
    let (client, _) = mock_client().await;
    let err = client.wards(1).await.unwrap_err();
    assert!(matches!(err, GhnError::Rejected { code: 400, .. }));
}

#[tokio::test]
async fn wrong_token_surfaces_the_http_status() {
    let (endpoint, mock) = spawn_mock().await;
    let err = client_for(&endpoint, "nope").provinces().await.unwrap_err();
    assert!(matches!(err, GhnError::Status(status) if status == StatusCode::UNAUTHORIZED));
    assert_eq!(mock.province_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preview_uses_book_dimensions_and_shop_header() {
    let (client, mock) = mock_client().await;
    let info = client.preview_order(&parcel(3)).await.unwrap();
    assert_eq!(info.shipping_fee, 36300);
    assert_eq!(info.shipping_time, "2026-10-20T16:59:59Z");

    let body = mock.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["weight"], 900);
    assert_eq!(body["height"], 6);
    assert_eq!(body["to_district_id"], 1442);
    assert_eq!(body["to_ward_code"], "20109");
    assert_eq!(body["required_note"], "KHONGCHOXEMHANG");
    assert_eq!(mock.last_shop_id.lock().unwrap().as_deref(), Some(SHOP_ID));
}

#[tokio::test]
async fn create_order_maps_payment_and_returns_code() {
    let (client, mock) = mock_client().await;
    let recipient = Recipient {
        name: "Nguyễn Văn A".into(),
        phone: "0971443356".into(),
        address: "12 Lê Lợi, Quận 1".into(),
    };
    let created = client
        .create_order(&recipient, PaymentMethod::Momo, &parcel(2), Some("Giao giờ hành chính"))
        .await
        .unwrap();
    assert_eq!(created.shipping_code, "LX7FQK");
    assert_eq!(created.shipping_fee, 36300);

    let body = mock.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["payment_type_id"], 1);
    assert_eq!(body["to_name"], "Nguyễn Văn A");
    assert_eq!(body["note"], "Giao giờ hành chính");
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn cached_lookups_hit_the_carrier_once() {
    let (client, mock) = mock_client().await;
    let cache = ShippingCache::memory(Duration::from_secs(60));

    for _ in 0..3 {
        let provinces: Vec<Province> = cache
            .get_or_fetch("province", || client.provinces())
            .await
            .unwrap();
        assert_eq!(provinces.len(), 2);
    }
    assert_eq!(mock.province_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_carrier_is_an_http_error() {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), TOKEN);
    assert!(matches!(client.provinces().await, Err(GhnError::Http(_))));
}
