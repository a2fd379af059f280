use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit,
    dto::checkout::{AreaId, PreviewOrderRequest, SubmitOrderRequest, SubmitOrderResponse},
    entity::{books::Model as BookModel, orders::ActiveModel as OrderActive},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, OrderItem, PaymentMethod, order_total},
    response::{ApiResponse, Meta},
    services::{
        auth_service::find_user,
        cart_service::{books_in_cart, cart_from_user, lock_user, save_cart},
    },
    shipping::{District, OrderParcel, PreviewInfo, Province, Recipient, Ward},
    state::AppState,
    validation::{is_valid_email, is_valid_phone, non_blank},
};

const PROVINCE_CACHE_KEY: &str = "province";

fn district_cache_key(province_id: i64) -> String {
    format!("district:{province_id}")
}

fn ward_cache_key(district_id: i64) -> String {
    format!("ward:{district_id}")
}

/// Parse an area id taken from the path. Only non-negative integers are ids.
pub fn parse_area_id(raw: &str, field: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<u32>()
        .map(i64::from)
        .map_err(|_| AppError::BadRequest(format!("Invalid {field}")))
}

pub async fn get_provinces(state: &AppState) -> AppResult<ApiResponse<Vec<Province>>> {
    let provinces = state
        .cache
        .get_or_fetch(PROVINCE_CACHE_KEY, || state.ghn.provinces())
        .await?;
    Ok(ApiResponse::success("OK", provinces, Some(Meta::empty())))
}

pub async fn get_districts(
    state: &AppState,
    province_id: i64,
) -> AppResult<ApiResponse<Vec<District>>> {
    let districts = state
        .cache
        .get_or_fetch(&district_cache_key(province_id), || {
            state.ghn.districts(province_id)
        })
        .await?;
    Ok(ApiResponse::success("OK", districts, Some(Meta::empty())))
}

pub async fn get_wards(state: &AppState, district_id: i64) -> AppResult<ApiResponse<Vec<Ward>>> {
    let wards = state
        .cache
        .get_or_fetch(&ward_cache_key(district_id), || state.ghn.wards(district_id))
        .await?;
    Ok(ApiResponse::success("OK", wards, Some(Meta::empty())))
}

/// A blank or missing district or ward is "required"; a district that is
/// not a non-negative integer is "Invalid districtId".
fn destination(district: Option<&AreaId>, ward: Option<&AreaId>) -> AppResult<(i64, String)> {
    let district = district
        .and_then(AreaId::as_text)
        .ok_or_else(|| AppError::BadRequest("District is required".into()))?;
    let district = parse_area_id(&district, "districtId")?;
    let ward = ward
        .and_then(AreaId::as_text)
        .ok_or_else(|| AppError::BadRequest("Ward is required".into()))?;
    Ok((district, ward))
}

fn non_empty_cart(cart: Cart) -> AppResult<Cart> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    Ok(cart)
}

pub async fn preview_order(
    state: &AppState,
    user: &AuthUser,
    payload: PreviewOrderRequest,
) -> AppResult<ApiResponse<PreviewInfo>> {
    let (district_id, ward_code) =
        destination(payload.district.as_ref(), payload.ward.as_ref())?;

    let model = find_user(&state.orm, user.user_id).await?;
    let cart = non_empty_cart(cart_from_user(&model)?)?;
    let parcel = OrderParcel {
        district_id,
        ward_code,
        quantity: cart.total_quantity(),
    };

    let preview = state
        .cache
        .get_or_fetch(&parcel.cache_key(), || state.ghn.preview_order(&parcel))
        .await?;
    Ok(ApiResponse::success("OK", preview, Some(Meta::empty())))
}

/// Checkout form after validation.
#[derive(Debug, Clone)]
struct CheckoutForm {
    recipient: Recipient,
    email: String,
    full_address: String,
    district_id: i64,
    ward_code: String,
    note: Option<String>,
    payment: PaymentMethod,
}

fn validate_form(payload: &SubmitOrderRequest) -> AppResult<CheckoutForm> {
    let bad = |msg: &str| AppError::BadRequest(msg.to_string());

    let name = non_blank(payload.name.as_deref()).ok_or_else(|| bad("Name is required"))?;
    let address =
        non_blank(payload.address.as_deref()).ok_or_else(|| bad("Address is required"))?;
    let phone = non_blank(payload.phone.as_deref()).ok_or_else(|| bad("Phone is required"))?;
    if !is_valid_phone(phone) {
        return Err(bad("Invalid phone number"));
    }
    let email = non_blank(payload.email.as_deref()).ok_or_else(|| bad("Email is required"))?;
    if !is_valid_email(email) {
        return Err(bad("Invalid email address"));
    }
    let payment = non_blank(payload.payment.as_deref())
        .and_then(PaymentMethod::parse)
        .ok_or_else(|| bad("Payment must be COD or MOMO"))?;
    let (district_id, ward_code) =
        destination(payload.district.as_ref(), payload.ward.as_ref())?;

    Ok(CheckoutForm {
        recipient: Recipient {
            name: name.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
        },
        email: email.to_string(),
        full_address: non_blank(payload.full_address.as_deref())
            .unwrap_or(address)
            .to_string(),
        district_id,
        ward_code,
        note: non_blank(payload.note.as_deref()).map(str::to_string),
        payment,
    })
}

/// Freeze each cart line at the book's current price.
fn snapshot_items(cart: &Cart, books: &HashMap<Uuid, BookModel>) -> AppResult<Vec<OrderItem>> {
    cart.items()
        .iter()
        .map(|item| {
            let book = books.get(&item.book_id).ok_or_else(|| {
                AppError::BadRequest(format!("Book {} is no longer available", item.book_id))
            })?;
            Ok(OrderItem {
                book_id: book.id,
                name: book.name.clone(),
                image: book.image.clone(),
                unit_price: book.current_price,
                quantity: item.quantity,
            })
        })
        .collect()
}

pub async fn submit_order(
    state: &AppState,
    user: &AuthUser,
    payload: SubmitOrderRequest,
) -> AppResult<ApiResponse<SubmitOrderResponse>> {
    let form = validate_form(&payload)?;

    let model = find_user(&state.orm, user.user_id).await?;
    let cart = non_empty_cart(cart_from_user(&model)?)?;
    let books = books_in_cart(&state.orm, &cart).await?;
    let items = snapshot_items(&cart, &books)?;
    let total_amount = order_total(&items);

    let parcel = OrderParcel {
        district_id: form.district_id,
        ward_code: form.ward_code.clone(),
        quantity: cart.total_quantity(),
    };
    let shipment = state
        .ghn
        .create_order(&form.recipient, form.payment, &parcel, form.note.as_deref())
        .await?;

    let order_id = Uuid::new_v4();
    let items_json = serde_json::to_value(&items).map_err(anyhow::Error::from)?;

    let txn = state.orm.begin().await?;
    OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        recipient_name: Set(form.recipient.name),
        phone: Set(form.recipient.phone),
        email: Set(form.email),
        full_address: Set(form.full_address),
        shipping_code: Set(shipment.shipping_code.clone()),
        note: Set(form.note),
        payment: Set(form.payment.as_str().to_string()),
        items: Set(items_json),
        total_amount: Set(total_amount),
        shipping_fee: Set(shipment.shipping_fee),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    // Only the ordered lines leave the cart; anything added while the
    // carrier call was in flight stays.
    let locked = lock_user(&txn, user.user_id).await?;
    let mut remaining = cart_from_user(&locked)?;
    remaining.subtract(&cart);
    save_cart(&txn, locked, &remaining).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order_id,
        user_id = %user.user_id,
        shipping_code = %shipment.shipping_code,
        total_amount,
        "order placed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "order_create",
        "orders",
        serde_json::json!({
            "order_id": order_id,
            "shipping_code": shipment.shipping_code,
            "total_amount": total_amount,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        SubmitOrderResponse {
            order_id,
            shipping_code: shipment.shipping_code,
            total_amount,
            shipping_fee: shipment.shipping_fee,
        },
        Some(Meta::empty()),
    ))
}
