use axum_movie_store_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::{
        ActivateRequest, LoginRequest, LogoutRequest, RegisterRequest, TokenRefreshRequest,
    },
    entity::{
        activation_tokens::{
            ActiveModel as ActivationTokenActive, Column as ActivationCol,
            Entity as ActivationTokens,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::AppError,
    gateway::PaymentGateway,
    mailer::Mailer,
    services::{auth_service, token_service},
    state::AppState,
};
use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement,
};
use uuid::Uuid;

// Registration -> activation -> login -> refresh -> logout, plus the
// expired-token sweep. Requires a database.
#[tokio::test]
async fn activation_login_logout_and_token_sweep() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    // SAFETY: single-test binary, set before any thread reads them.
    unsafe {
        std::env::set_var("JWT_SECRET_ACCESS", "integration-access-secret");
        std::env::set_var("JWT_SECRET_REFRESH", "integration-refresh-secret");
    }

    let state = setup_state(&database_url).await?;

    // Weak passwords are rejected up front.
    let err = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "weak@example.com".into(),
            password: "short".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let registered = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "Newcomer@Example.com".into(),
            password: "Str0ng!pass".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.email, "newcomer@example.com");
    assert!(!registered.is_active);

    // Re-registering the same address conflicts.
    let err = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "newcomer@example.com".into(),
            password: "Str0ng!pass".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Login before activation is forbidden.
    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: "newcomer@example.com".into(),
            password: "Str0ng!pass".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Activate with the stored token.
    let token_record = ActivationTokens::find()
        .filter(ActivationCol::UserId.eq(registered.id))
        .one(&state.orm)
        .await?
        .expect("activation token was created");
    auth_service::activate_account(
        &state,
        ActivateRequest {
            email: "newcomer@example.com".into(),
            token: token_record.token.clone(),
        },
    )
    .await?;

    let user = Users::find_by_id(registered.id).one(&state.orm).await?.unwrap();
    assert!(user.is_active);
    // The consumed token is gone.
    assert!(
        ActivationTokens::find()
            .filter(ActivationCol::UserId.eq(registered.id))
            .one(&state.orm)
            .await?
            .is_none()
    );

    // Login issues both tokens; refresh works until logout.
    let tokens = auth_service::login_user(
        &state,
        LoginRequest {
            email: "newcomer@example.com".into(),
            password: "Str0ng!pass".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let refreshed = auth_service::refresh_access_token(
        &state,
        TokenRefreshRequest {
            refresh_token: tokens.refresh_token.clone(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(!refreshed.access_token.is_empty());

    auth_service::logout_user(
        &state,
        LogoutRequest {
            refresh_token: tokens.refresh_token.clone(),
        },
    )
    .await?;

    // The revoked refresh token no longer works.
    let err = auth_service::refresh_access_token(
        &state,
        TokenRefreshRequest {
            refresh_token: tokens.refresh_token,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Seed an expired activation token and let the sweep remove it.
    let stale_user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set("stale@example.com".into()),
        password_hash: Set("dummy".into()),
        role: Set("user".into()),
        is_active: Set(false),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    ActivationTokenActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(stale_user.id),
        token: Set(token_service::generate_secure_token()),
        expires_at: Set((Utc::now() - Duration::hours(2)).into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let (activation_swept, _, _) = token_service::sweep_expired_tokens(&state.pool).await?;
    assert!(activation_swept >= 1);
    assert!(
        ActivationTokens::find()
            .filter(ActivationCol::UserId.eq(stale_user.id))
            .one(&state.orm)
            .await?
            .is_none()
    );

    // The fresh (unexpired) password hash still verifies after all of this.
    let user = Users::find()
        .filter(UserCol::Email.eq("newcomer@example.com"))
        .one(&state.orm)
        .await?
        .unwrap();
    assert!(auth_service::verify_password("Str0ng!pass", &user.password_hash)?);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE refund_requests, payments, order_items, orders, cart_items, \
         favorites, likes, ratings, comments, movie_actors, movie_genres, movies, \
         actors, genres, refresh_tokens, password_reset_tokens, activation_tokens, \
         audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        mailer: Mailer::disabled(),
        gateway: PaymentGateway::offline(),
        public_base_url: "http://127.0.0.1:3000".into(),
    })
}
