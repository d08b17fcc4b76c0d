mod common;

use recipe_shelf_sdk::actions::users;
use recipe_shelf_sdk::error::Error;
use recipe_shelf_sdk::jwt::SessionData;
use recipe_shelf_sdk::schema::UserRole;

#[tokio::test]
async fn register_login_authenticate_roundtrip() {
    let (registry, settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    assert_eq!(user.role, UserRole::User);
    assert!(registry.db_path(&user.tenant_key()).is_file());

    let (logged_in, tokens) = users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);

    let session = users::authenticate_user(&tokens.access_token, &registry, &settings)
        .await
        .unwrap();
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.username, "maija");
    assert!(!session.is_admin);
}

#[tokio::test]
async fn login_accepts_email_or_username() {
    let (registry, settings, _guard) = common::setup();

    users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    users::login_user("maija@example.com", "salasana123", &registry, &settings)
        .await
        .unwrap();
    users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (registry, _settings, _guard) = common::setup();

    users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    let err = users::register_user("maija@example.com", "different", "salasana123", &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = users::register_user("other@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn bad_credentials_collapse_to_one_error() {
    let (registry, settings, _guard) = common::setup();

    users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    let wrong_password = users::login_user("maija", "wrong-password", &registry, &settings)
        .await
        .unwrap_err();
    let unknown_account = users::login_user("nobody", "salasana123", &registry, &settings)
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, Error::Unauthenticated));
    assert!(matches!(unknown_account, Error::Unauthenticated));
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_access_token() {
    let (registry, settings, _guard) = common::setup();

    users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    let (_, tokens) = users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap();

    let err = users::authenticate_user(&tokens.refresh_token, &registry, &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));

    // And the other way around.
    let err = users::refresh_session(&tokens.access_token, &registry, &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));

    let refreshed = users::refresh_session(&tokens.refresh_token, &registry, &settings)
        .await
        .unwrap();
    users::authenticate_user(&refreshed.access_token, &registry, &settings)
        .await
        .unwrap();
}

#[tokio::test]
async fn deactivated_accounts_are_locked_out() {
    let (registry, settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    let (_, tokens) = users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap();

    users::deactivate_user(user.id, &registry).await.unwrap();

    let login = users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap_err();
    assert!(matches!(login, Error::Forbidden(_)));

    let authenticate = users::authenticate_user(&tokens.access_token, &registry, &settings)
        .await
        .unwrap_err();
    assert!(matches!(authenticate, Error::Forbidden(_)));
}

#[tokio::test]
async fn password_reset_flow_end_to_end() {
    let (registry, settings, _guard) = common::setup();

    users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    // Unknown email answers identically to a known one.
    let unknown = users::request_password_reset("nobody@example.com", &registry, &settings)
        .await
        .unwrap();
    assert!(unknown.is_none());

    let token = users::request_password_reset("maija@example.com", &registry, &settings)
        .await
        .unwrap()
        .expect("known email yields a token");

    users::confirm_password_reset(&token, "uusi-salasana", &registry)
        .await
        .unwrap();

    users::login_user("maija", "uusi-salasana", &registry, &settings)
        .await
        .unwrap();
    let old = users::login_user("maija", "salasana123", &registry, &settings)
        .await
        .unwrap_err();
    assert!(matches!(old, Error::Unauthenticated));

    // The token is single use.
    let reused = users::confirm_password_reset(&token, "kolmas-salasana", &registry)
        .await
        .unwrap_err();
    assert!(matches!(reused, Error::Unauthenticated));
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let (registry, settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    let err = users::change_password(user.id, "wrong-password", "uusi-salasana", &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));

    users::change_password(user.id, "salasana123", "uusi-salasana", &registry)
        .await
        .unwrap();
    users::login_user("maija", "uusi-salasana", &registry, &settings)
        .await
        .unwrap();
}

#[tokio::test]
async fn profile_updates_enforce_uniqueness() {
    let (registry, _settings, _guard) = common::setup();

    let maija = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    users::register_user("pekka@example.com", "pekka", "salasana123", &registry)
        .await
        .unwrap();

    let err = users::update_profile(maija.id, Some("pekka@example.com"), None, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let updated = users::update_profile(maija.id, None, Some("maija_m"), &registry)
        .await
        .unwrap();
    assert_eq!(updated.username, "maija_m");
    assert_eq!(updated.email, "maija@example.com");
}

#[tokio::test]
async fn renamed_account_keeps_its_store() {
    let (registry, _settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    let key_before = user.tenant_key();

    let renamed = users::update_profile(user.id, None, Some("maija_m"), &registry)
        .await
        .unwrap();

    assert_eq!(renamed.tenant_key(), key_before);
    assert!(registry.db_path(&renamed.tenant_key()).is_file());
}

#[tokio::test]
async fn account_deletion_tears_down_the_store() {
    let (registry, _settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();
    let tenant = user.tenant_key();
    assert!(registry.db_path(&tenant).is_file());

    users::delete_user_account(user.id, &registry).await.unwrap();

    assert!(!registry.db_path(&tenant).exists());
    assert!(!registry.upload_dir(&tenant).exists());

    let pool = registry.central().await.unwrap();
    assert!(users::get_user(&pool, "maija").await.unwrap().is_none());
}

#[tokio::test]
async fn admins_manage_users_but_not_themselves() {
    let (registry, _settings, _guard) = common::setup();

    let admin = users::register_user("admin@example.com", "admin", "salasana123", &registry)
        .await
        .unwrap();
    // Promote the bootstrap account directly; there is no admin yet to do it.
    let pool = registry.central().await.unwrap();
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(admin.id)
        .execute(&pool)
        .await
        .unwrap();
    let admin = users::get_user_by_id(&pool, admin.id).await.unwrap().unwrap();
    let session = SessionData::from(&admin);

    let created = users::admin_create_user(
        &session,
        "pekka@example.com",
        "pekka",
        "salasana123",
        UserRole::Admin,
        &registry,
    )
    .await
    .unwrap();
    assert_eq!(created.role, UserRole::Admin);

    let listed = users::admin_list_users(&session, &registry).await.unwrap();
    assert_eq!(listed.len(), 2);

    let err = users::admin_delete_user(&session, admin.id, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    users::admin_delete_user(&session, created.id, &registry)
        .await
        .unwrap();

    // A regular user holds no user-management permission at all.
    let peon = users::register_user("kokki@example.com", "kokki", "salasana123", &registry)
        .await
        .unwrap();
    let peon_session = SessionData::from(&peon);
    let err = users::admin_list_users(&peon_session, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn serialized_users_never_expose_credentials() {
    let (registry, _settings, _guard) = common::setup();

    let user = users::register_user("maija@example.com", "maija", "salasana123", &registry)
        .await
        .unwrap();

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password_hash").is_none());
    assert!(json.get("reset_token").is_none());
    assert!(json.get("reset_token_expires").is_none());
    assert_eq!(json["username"], "maija");
    assert_eq!(json["role"], "user");
}

#[tokio::test]
async fn validation_gates_registration() {
    let (registry, _settings, _guard) = common::setup();

    let bad_email = users::register_user("not-an-email", "maija", "salasana123", &registry)
        .await
        .unwrap_err();
    assert!(matches!(bad_email, Error::Validation(_)));

    let short_password = users::register_user("maija@example.com", "maija", "short", &registry)
        .await
        .unwrap_err();
    assert!(matches!(short_password, Error::Validation(_)));

    let bad_username = users::register_user("maija@example.com", "ma", "salasana123", &registry)
        .await
        .unwrap_err();
    assert!(matches!(bad_username, Error::Validation(_)));
}
