use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::dto::auth::{
    AuthResponse, Claims, LoginRequest, RegisterRequest, UpdateProfileRequest,
    VerificationRequest, VerificationStatus,
};
use crate::{
    audit::log_audit,
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Profile, User},
    response::{ApiResponse, Meta},
};

const PROFILE_COLUMNS: &str = "id, name, email, phone, image, is_verified, created_at";

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let RegisterRequest {
        name,
        email,
        password,
        phone,
    } = payload;

    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Missing required fields: name, email, password".into(),
        ));
    }
    if password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters long".into(),
        ));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let id = Uuid::new_v4();
    let profile: Profile = sqlx::query_as(&format!(
        "INSERT INTO users (id, name, email, password_hash, phone) VALUES ($1, $2, $3, $4, $5) \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(id)
    .bind(name.as_str())
    .bind(email.as_str())
    .bind(password_hash)
    .bind(phone)
    .fetch_one(pool)
    .await?;

    let token = issue_token(profile.id)?;

    if let Err(err) = log_audit(
        pool,
        Some(profile.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": profile.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created",
        AuthResponse {
            user: profile,
            token,
        },
        None,
    ))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let token = issue_token(user.id)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse {
            user: Profile {
                id: user.id,
                name: user.name,
                email: user.email,
                phone: user.phone,
                image: user.image,
                is_verified: user.is_verified,
                created_at: user.created_at,
            },
            token,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_me(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<Profile>> {
    let profile: Option<Profile> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    match profile {
        Some(p) => Ok(ApiResponse::success("Profile", p, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_profile(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<Profile>> {
    let profile: Option<Profile> = sqlx::query_as(&format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            image = COALESCE($4, image),
            updated_at = now()
        WHERE id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(user.user_id)
    .bind(payload.name)
    .bind(payload.phone)
    .bind(payload.image)
    .fetch_optional(pool)
    .await?;

    let profile = match profile {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "profile_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Profile updated",
        profile,
        Some(Meta::empty()),
    ))
}

/// Store verification documents. New documents always reset the verified
/// flag; an operator flips it back after checking them.
pub async fn submit_verification(
    pool: &DbPool,
    user: &AuthUser,
    payload: VerificationRequest,
) -> AppResult<ApiResponse<VerificationStatus>> {
    if payload.id_document_number.is_none() && payload.driving_license_number.is_none() {
        return Err(AppError::BadRequest(
            "Provide id_document_number or driving_license_number".into(),
        ));
    }

    let status: Option<VerificationRow> = sqlx::query_as(
        r#"
        UPDATE users
        SET id_document_number = COALESCE($2, id_document_number),
            driving_license_number = COALESCE($3, driving_license_number),
            is_verified = FALSE,
            updated_at = now()
        WHERE id = $1
        RETURNING id, is_verified, id_document_number, driving_license_number
        "#,
    )
    .bind(user.user_id)
    .bind(payload.id_document_number)
    .bind(payload.driving_license_number)
    .fetch_optional(pool)
    .await?;

    match status {
        Some(row) => Ok(ApiResponse::success(
            "Verification documents stored",
            row.into(),
            Some(Meta::empty()),
        )),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_verification(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<VerificationStatus>> {
    let status: Option<VerificationRow> = sqlx::query_as(
        "SELECT id, is_verified, id_document_number, driving_license_number FROM users WHERE id = $1",
    )
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    match status {
        Some(row) => Ok(ApiResponse::success("Verification status", row.into(), None)),
        None => Err(AppError::NotFound),
    }
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    id: Uuid,
    is_verified: bool,
    id_document_number: Option<String>,
    driving_license_number: Option<String>,
}

impl From<VerificationRow> for VerificationStatus {
    fn from(row: VerificationRow) -> Self {
        VerificationStatus {
            id: row.id,
            is_verified: row.is_verified,
            id_document_number: row.id_document_number,
            driving_license_number: row.driving_license_number,
        }
    }
}

fn issue_token(user_id: Uuid) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(format!("Bearer {}", token))
}
