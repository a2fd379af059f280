use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    audit,
    db::OrmConn,
    dto::auth::{LoginRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::{auth::{AuthUser, session_user_id}, session::SESSION_USER_KEY},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
    validation::{is_valid_email, non_blank},
};

pub const MIN_PASSWORD_LEN: usize = 6;

const EMAIL_TAKEN: &str = "Email is already taken";

/// A registration racing another one for the same email loses on the
/// unique index; report that as the same 400 the pre-check gives.
fn registration_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::BadRequest(EMAIL_TAKEN.into()),
        _ => AppError::from(err),
    }
}

pub async fn find_user(orm: &OrmConn, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(orm)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Validated, normalized registration fields.
fn validate_registration(payload: &RegisterRequest) -> AppResult<(String, String)> {
    let name = non_blank(Some(payload.name.as_str()))
        .ok_or_else(|| AppError::BadRequest("Name is required".into()))?;
    let email = non_blank(Some(payload.email.as_str()))
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::BadRequest("Email is required".into()))?;
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok((name.to_string(), email))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let (name, email) = validate_registration(&payload)?;

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest(EMAIL_TAKEN.into()));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        cart: Set(serde_json::json!([])),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(registration_error)?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    session: &Session,
    payload: LoginRequest,
) -> AppResult<ApiResponse<User>> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());
    let email = payload.email.trim().to_lowercase();

    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    // New id on privilege change.
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user.id).await?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn logout_user(
    state: &AppState,
    session: &Session,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user_id = session_user_id(session).await?;
    session.flush().await?;

    if let Some(user_id) = user_id {
        audit::record(
            &state.pool,
            user_id,
            "user_logout",
            "users",
            serde_json::json!({ "user_id": user_id }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", user_from_entity(model), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn registration_normalizes_email() {
        let (name, email) =
            validate_registration(&request(" Minh ", " Minh@Books.vn ", "secret1")).unwrap();
        assert_eq!(name, "Minh");
        assert_eq!(email, "minh@books.vn");
    }

    #[test]
    fn registration_rejects_bad_input() {
        for req in [
            request("", "a@b.vn", "secret1"),
            request("A", "not-an-email", "secret1"),
            request("A", "a@b.vn", "123"),
        ] {
            assert!(matches!(
                validate_registration(&req),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn other_insert_failures_stay_server_errors() {
        let err = registration_error(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, AppError::OrmError(_)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
