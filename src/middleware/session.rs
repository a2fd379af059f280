//! Server-side sessions backed by PostgreSQL.

use tower_sessions::{Expiry, SessionManagerLayer, cookie::SameSite, cookie::time::Duration};
use tower_sessions_sqlx_store::PostgresStore;

use crate::db::DbPool;

pub const SESSION_COOKIE_NAME: &str = "bookstore_session";

/// Key under which the logged-in user's id is stored.
pub const SESSION_USER_KEY: &str = "user_id";

const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session store and its table if missing.
pub async fn create_session_store(pool: &DbPool) -> anyhow::Result<PostgresStore> {
    let store = PostgresStore::new(pool.clone());
    store.migrate().await?;
    Ok(store)
}

pub fn create_session_layer(store: PostgresStore, secure: bool) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(SESSION_EXPIRY_SECONDS)))
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
