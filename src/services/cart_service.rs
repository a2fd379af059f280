use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    db::OrmConn,
    dto::cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
    entity::{
        books::{Column as BookCol, Entity as Books, Model as BookModel},
        users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, CartLine, ImageSize},
    response::{ApiResponse, Meta},
    services::{auth_service::find_user, book_service::book_summary},
    state::AppState,
};

pub fn cart_from_user(user: &UserModel) -> AppResult<Cart> {
    let items: Vec<CartItem> = serde_json::from_value(user.cart.clone())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt cart for user {}: {e}", user.id)))?;
    Ok(Cart::new(items))
}

/// Load the user row with `FOR UPDATE`; cart writers on the same user queue
/// behind the holder until its transaction ends.
pub async fn lock_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn save_cart<C: ConnectionTrait>(conn: &C, user: UserModel, cart: &Cart) -> AppResult<()> {
    let cart = serde_json::to_value(cart).map_err(anyhow::Error::from)?;
    let mut active: UserActive = user.into();
    active.cart = Set(cart);
    active.update(conn).await?;
    Ok(())
}

/// Read-modify-write of the stored cart under the user's row lock.
async fn update_cart<F>(state: &AppState, user_id: Uuid, change: F) -> AppResult<Cart>
where
    F: FnOnce(&mut Cart) -> AppResult<()>,
{
    let txn = state.orm.begin().await?;
    let model = lock_user(&txn, user_id).await?;
    let mut cart = cart_from_user(&model)?;
    change(&mut cart)?;
    save_cart(&txn, model, &cart).await?;
    txn.commit().await?;
    Ok(cart)
}

/// Fetch the catalog rows referenced by a cart, keyed by id.
pub async fn books_in_cart(orm: &OrmConn, cart: &Cart) -> AppResult<HashMap<Uuid, BookModel>> {
    if cart.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = cart.items().iter().map(|item| item.book_id).collect();
    let books = Books::find()
        .filter(BookCol::Id.is_in(ids))
        .all(orm)
        .await?
        .into_iter()
        .map(|book| (book.id, book))
        .collect();
    Ok(books)
}

fn cart_view(cart: &Cart, mut books: HashMap<Uuid, BookModel>) -> CartView {
    let items: Vec<CartLine> = cart
        .items()
        .iter()
        .filter_map(|item| {
            let Some(book) = books.remove(&item.book_id) else {
                tracing::debug!(book_id = %item.book_id, "cart references a missing book");
                return None;
            };
            let line_total = book.current_price * i64::from(item.quantity);
            Some(CartLine {
                book: book_summary(book, ImageSize::Small),
                quantity: item.quantity,
                line_total,
            })
        })
        .collect();

    CartView {
        total_quantity: items.iter().map(|line| i64::from(line.quantity)).sum(),
        subtotal: items.iter().map(|line| line.line_total).sum(),
        items,
    }
}

async fn render(orm: &OrmConn, cart: &Cart, message: &str) -> AppResult<ApiResponse<CartView>> {
    let books = books_in_cart(orm, cart).await?;
    Ok(ApiResponse::success(
        message,
        cart_view(cart, books),
        Some(Meta::empty()),
    ))
}

async fn ensure_book_exists(orm: &OrmConn, book_id: Uuid) -> AppResult<()> {
    if Books::find_by_id(book_id).one(orm).await?.is_none() {
        return Err(AppError::BadRequest("Book not found".into()));
    }
    Ok(())
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let model = find_user(&state.orm, user.user_id).await?;
    let cart = cart_from_user(&model)?;
    render(&state.orm, &cart, "OK").await
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    ensure_book_exists(&state.orm, payload.book_id).await?;

    let cart = update_cart(state, user.user_id, |cart| {
        cart.add(payload.book_id, payload.quantity);
        Ok(())
    })
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "users.cart",
        serde_json::json!({ "book_id": payload.book_id, "quantity": payload.quantity }),
    )
    .await;

    render(&state.orm, &cart, "Added to cart").await
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    book_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    if payload.quantity > 0 {
        let current = cart_from_user(&find_user(&state.orm, user.user_id).await?)?;
        if current.quantity_of(book_id).is_none() {
            ensure_book_exists(&state.orm, book_id).await?;
        }
    }

    let cart = update_cart(state, user.user_id, |cart| {
        cart.set_quantity(book_id, payload.quantity);
        Ok(())
    })
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "users.cart",
        serde_json::json!({ "book_id": book_id, "quantity": payload.quantity }),
    )
    .await;

    render(&state.orm, &cart, "Cart updated").await
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    book_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart = update_cart(state, user.user_id, |cart| {
        if cart.remove(book_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("Book is not in the cart".into()))
        }
    })
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "users.cart",
        serde_json::json!({ "book_id": book_id }),
    )
    .await;

    render(&state.orm, &cart, "Removed from cart").await
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = update_cart(state, user.user_id, |cart| {
        cart.clear();
        Ok(())
    })
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_clear",
        "users.cart",
        serde_json::json!({}),
    )
    .await;

    render(&state.orm, &cart, "Cart cleared").await
}
