use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::{
    authentication::{
        cryptography::{generate_reset_token, hash_password, verify_password},
        jwt::{issue_token, verify_token, SessionData, TokenKind},
        permissions::ActionType,
    },
    config::Settings,
    error::{Error, QueryError},
    registry::StoreRegistry,
    schema::{Id, TokenPair, User, UserRole},
};

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 50;

pub async fn get_user(pool: &SqlitePool, username: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(row)
}

/// Creates the account and provisions its isolated store in one call.
/// Uniqueness is enforced by the database, not by a pre-check, so two
/// concurrent registrations for the same email cannot both succeed.
pub async fn register_user(
    email: &str,
    username: &str,
    password: &str,
    registry: &StoreRegistry,
) -> Result<User, Error> {
    validate_email(email)?;
    validate_username(username)?;
    validate_password(password)?;

    let pool = registry.central().await?;
    let password_hash = hash_password(password)?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, password_hash, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT DO NOTHING RETURNING *
    ",
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_optional(&pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let user = user.ok_or_else(|| {
        Error::Conflict(String::from("email or username is already registered"))
    })?;

    registry.provision(&user.tenant_key()).await?;
    log::info!("registered account {} ({})", user.username, user.id);

    Ok(user)
}

/// Accepts either the email or the username as the identifier. Unknown
/// account and wrong password collapse to the same error so login probes
/// cannot enumerate accounts.
pub async fn login_user(
    identifier: &str,
    password: &str,
    registry: &StoreRegistry,
    settings: &Settings,
) -> Result<(User, TokenPair), Error> {
    let pool = registry.central().await?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1 OR username = $1")
        .bind(identifier)
        .fetch_optional(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let user = match user {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => return Err(Error::Unauthenticated),
    };

    if !user.is_active {
        return Err(Error::Forbidden(String::from("account is deactivated")));
    }

    let tokens = issue_token_pair(user.id, settings)?;
    Ok((user, tokens))
}

pub async fn refresh_session(
    refresh_token: &str,
    registry: &StoreRegistry,
    settings: &Settings,
) -> Result<TokenPair, Error> {
    let claims = verify_token(refresh_token, TokenKind::Refresh, settings)
        .ok_or(Error::Unauthenticated)?;

    let pool = registry.central().await?;
    let user = get_user_by_id(&pool, claims.sub)
        .await?
        .ok_or(Error::Unauthenticated)?;

    if !user.is_active {
        return Err(Error::Forbidden(String::from("account is deactivated")));
    }

    issue_token_pair(user.id, settings)
}

/// Resolves an access token into the caller's identity. Every failure
/// mode (bad signature, expiry, wrong token kind, deleted account) maps
/// to the same unauthenticated error.
pub async fn authenticate_user(
    access_token: &str,
    registry: &StoreRegistry,
    settings: &Settings,
) -> Result<SessionData, Error> {
    let claims =
        verify_token(access_token, TokenKind::Access, settings).ok_or(Error::Unauthenticated)?;

    let pool = registry.central().await?;
    let user = get_user_by_id(&pool, claims.sub)
        .await?
        .ok_or(Error::Unauthenticated)?;

    if !user.is_active {
        return Err(Error::Forbidden(String::from("account is deactivated")));
    }

    Ok(SessionData::from(&user))
}

pub async fn update_profile(
    user_id: Id,
    email: Option<&str>,
    username: Option<&str>,
    registry: &StoreRegistry,
) -> Result<User, Error> {
    let pool = registry.central().await?;
    let current = get_user_by_id(&pool, user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    let email = match email {
        Some(email) => {
            validate_email(email)?;
            if let Some(other) = get_user_by_email(&pool, email).await? {
                if other.id != user_id {
                    return Err(Error::Conflict(String::from("email is already registered")));
                }
            }
            email.to_string()
        }
        None => current.email,
    };

    let username = match username {
        Some(username) => {
            validate_username(username)?;
            if let Some(other) = get_user(&pool, username).await? {
                if other.id != user_id {
                    return Err(Error::Conflict(String::from("username is already taken")));
                }
            }
            username.to_string()
        }
        None => current.username,
    };

    let user: User = sqlx::query_as(
        "UPDATE users SET email = $1, username = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(email)
    .bind(username)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(user)
}

pub async fn change_password(
    user_id: Id,
    current_password: &str,
    new_password: &str,
    registry: &StoreRegistry,
) -> Result<(), Error> {
    let pool = registry.central().await?;
    let user = get_user_by_id(&pool, user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    if !verify_password(current_password, &user.password_hash) {
        return Err(Error::Unauthenticated);
    }
    validate_password(new_password)?;

    let password_hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(())
}

/// Issues a single-use reset token. Returns `Ok(None)` for an unknown
/// email so the caller can answer identically either way.
pub async fn request_password_reset(
    email: &str,
    registry: &StoreRegistry,
    settings: &Settings,
) -> Result<Option<String>, Error> {
    let pool = registry.central().await?;

    let user = match get_user_by_email(&pool, email).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let token = generate_reset_token();
    let expires = Utc::now() + Duration::hours(settings.reset_token_ttl_hours);

    sqlx::query("UPDATE users SET reset_token = $1, reset_token_expires = $2 WHERE id = $3")
        .bind(&token)
        .bind(expires)
        .bind(user.id)
        .execute(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(Some(token))
}

pub async fn confirm_password_reset(
    token: &str,
    new_password: &str,
    registry: &StoreRegistry,
) -> Result<(), Error> {
    validate_password(new_password)?;

    let pool = registry.central().await?;
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE reset_token = $1")
        .bind(token)
        .fetch_optional(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    let user = user.ok_or(Error::Unauthenticated)?;
    let live = user
        .reset_token_expires
        .is_some_and(|expires| expires > Utc::now());
    if !live {
        return Err(Error::Unauthenticated);
    }

    let password_hash = hash_password(new_password)?;
    sqlx::query(
        "
        UPDATE users
        SET password_hash = $1, reset_token = NULL, reset_token_expires = NULL, updated_at = $2
        WHERE id = $3
    ",
    )
    .bind(password_hash)
    .bind(Utc::now())
    .bind(user.id)
    .execute(&pool)
    .await
    .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(())
}

/// Soft-disables the account. The store stays on disk; login, refresh and
/// access tokens all stop working until the flag is flipped back.
pub async fn deactivate_user(user_id: Id, registry: &StoreRegistry) -> Result<(), Error> {
    let pool = registry.central().await?;

    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("user"));
    }
    Ok(())
}

/// Irreversibly removes the account row, its database file and its upload
/// directory.
pub async fn delete_user_account(user_id: Id, registry: &StoreRegistry) -> Result<(), Error> {
    let pool = registry.central().await?;
    let user = get_user_by_id(&pool, user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    registry.teardown(&user.tenant_key()).await?;
    log::info!("deleted account {} ({})", user.username, user.id);

    Ok(())
}

pub async fn admin_list_users(
    session: &SessionData,
    registry: &StoreRegistry,
) -> Result<Vec<User>, Error> {
    session.authenticate(ActionType::ManageUsers)?;

    let pool = registry.central().await?;
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id")
        .fetch_all(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(rows)
}

pub async fn admin_create_user(
    session: &SessionData,
    email: &str,
    username: &str,
    password: &str,
    role: UserRole,
    registry: &StoreRegistry,
) -> Result<User, Error> {
    session.authenticate(ActionType::ManageUsers)?;

    let user = register_user(email, username, password, registry).await?;
    if role == UserRole::User {
        return Ok(user);
    }

    let pool = registry.central().await?;
    let user: User = sqlx::query_as("UPDATE users SET role = $1 WHERE id = $2 RETURNING *")
        .bind(role)
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .map_err(|e| -> Error { QueryError::from(e).into() })?;

    Ok(user)
}

pub async fn admin_delete_user(
    session: &SessionData,
    target_id: Id,
    registry: &StoreRegistry,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageUsers)?;

    if session.user_id == target_id {
        return Err(Error::Forbidden(String::from(
            "administrators cannot delete their own account",
        )));
    }

    delete_user_account(target_id, registry).await
}

fn issue_token_pair(user_id: Id, settings: &Settings) -> Result<TokenPair, Error> {
    Ok(TokenPair {
        access_token: issue_token(user_id, TokenKind::Access, settings)?,
        refresh_token: issue_token(user_id, TokenKind::Refresh, settings)?,
    })
}

fn validate_email(email: &str) -> Result<(), Error> {
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });

    if !well_formed {
        return Err(Error::Validation(String::from("invalid email address")));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), Error> {
    let length = username.chars().count();
    if length < MIN_USERNAME_LENGTH || length > MAX_USERNAME_LENGTH {
        return Err(Error::Validation(format!(
            "username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(Error::Validation(String::from(
            "username may only contain letters, numbers, '-' and '_'",
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
