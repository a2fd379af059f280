use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::checkout::{PreviewOrderRequest, SubmitOrderRequest, SubmitOrderResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::checkout_service::{self, parse_area_id},
    shipping::{District, PreviewInfo, Province, Ward},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/province", get(provinces))
        .route("/district/{province_id}", get(districts))
        .route("/ward/{district_id}", get(wards))
        .route("/preview-order", post(preview_order))
        .route("/submit-order", post(submit_order))
}

#[utoipa::path(
    get,
    path = "/api/checkout/province",
    responses(
        (status = 200, description = "Provinces served by the carrier", body = ApiResponse<Vec<Province>>),
        (status = 500, description = "Carrier unavailable"),
    ),
    tag = "Checkout"
)]
pub async fn provinces(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Province>>>> {
    let resp = checkout_service::get_provinces(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/district/{province_id}",
    params(("province_id" = i64, Path, description = "GHN province id")),
    responses(
        (status = 200, description = "Districts of a province", body = ApiResponse<Vec<District>>),
        (status = 400, description = "Invalid provinceId"),
    ),
    tag = "Checkout"
)]
pub async fn districts(
    State(state): State<AppState>,
    Path(province_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<District>>>> {
    let province_id = parse_area_id(&province_id, "provinceId")?;
    let resp = checkout_service::get_districts(&state, province_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/ward/{district_id}",
    params(("district_id" = i64, Path, description = "GHN district id")),
    responses(
        (status = 200, description = "Wards of a district", body = ApiResponse<Vec<Ward>>),
        (status = 400, description = "Invalid districtId"),
    ),
    tag = "Checkout"
)]
pub async fn wards(
    State(state): State<AppState>,
    Path(district_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Ward>>>> {
    let district_id = parse_area_id(&district_id, "districtId")?;
    let resp = checkout_service::get_wards(&state, district_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/preview-order",
    request_body = PreviewOrderRequest,
    responses(
        (status = 200, description = "Shipping fee and expected delivery", body = ApiResponse<PreviewInfo>),
        (status = 400, description = "Missing destination or empty cart"),
    ),
    security(("session_cookie" = [])),
    tag = "Checkout"
)]
pub async fn preview_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PreviewOrderRequest>,
) -> AppResult<Json<ApiResponse<PreviewInfo>>> {
    let resp = checkout_service::preview_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/submit-order",
    request_body = SubmitOrderRequest,
    responses(
        (status = 200, description = "Order placed and shipment created", body = ApiResponse<SubmitOrderResponse>),
        (status = 400, description = "Invalid form or empty cart"),
        (status = 500, description = "Carrier rejected the shipment"),
    ),
    security(("session_cookie" = [])),
    tag = "Checkout"
)]
pub async fn submit_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SubmitOrderRequest>,
) -> AppResult<Json<ApiResponse<SubmitOrderResponse>>> {
    let resp = checkout_service::submit_order(&state, &user, payload).await?;
    Ok(Json(resp))
}
