use chrono::Utc;
use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    dto::orders::OrderList,
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderSummary, PaymentMethod, order_quantity, order_total},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

fn order_items(model: &OrderModel) -> AppResult<Vec<OrderItem>> {
    serde_json::from_value(model.items.clone()).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("corrupt items for order {}: {e}", model.id))
    })
}

fn order_summary(model: OrderModel, items: &[OrderItem]) -> AppResult<OrderSummary> {
    let payment = PaymentMethod::parse(&model.payment).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown payment '{}' on order {}",
            model.payment,
            model.id
        ))
    })?;
    Ok(OrderSummary {
        id: model.id,
        recipient_name: model.recipient_name,
        phone: model.phone,
        email: model.email,
        full_address: model.full_address,
        shipping_code: model.shipping_code,
        note: model.note,
        payment,
        shipping_fee: model.shipping_fee,
        quantity: order_quantity(items),
        total: order_total(items),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.validate()?;

    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| {
            let items = order_items(&model)?;
            order_summary(model, &items)
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let model = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    let items = order_items(&model)?;
    let summary = order_summary(model, &items)?;
    Ok(ApiResponse::success(
        "Ok",
        Order { summary, items },
        Some(Meta::empty()),
    ))
}
