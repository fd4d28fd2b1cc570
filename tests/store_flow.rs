use axum_movie_store_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        payments::{CreateRefundRequest, RefundDecisionRequest},
    },
    entity::{
        cart_items::ActiveModel as CartItemActive,
        movies::{ActiveModel as MovieActive, Entity as Movies},
        orders::Entity as Orders,
        payments::Entity as Payments,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    gateway::PaymentGateway,
    mailer::Mailer,
    middleware::auth::AuthUser,
    services::{cart_service, movie_service, order_service, payment_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: cart -> checkout with an unavailable movie -> gateway
// webhook -> purchase guards -> refund path. Requires a database.
#[tokio::test]
async fn checkout_payment_and_refund_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
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

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "buyer@example.com").await?;
    let moderator_id = create_user(&state, "moderator", "moderator@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_moderator = AuthUser {
        user_id: moderator_id,
        role: "moderator".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    let movie_a = create_movie(&state, "First Picture", 990).await?;
    let movie_b = create_movie(&state, "Second Picture", 1490).await?;
    let movie_c = create_movie(&state, "Third Picture", 790).await?;

    for movie_id in [movie_a, movie_b, movie_c] {
        cart_service::add_to_cart(&state, &auth_user, AddToCartRequest { movie_id }).await?;
    }

    // The third movie is pulled from sale after it was added to the cart.
    let movie = Movies::find_by_id(movie_c).one(&state.orm).await?.unwrap();
    let mut active: MovieActive = movie.into();
    active.is_available = Set(false);
    active.update(&state.orm).await?;

    // Checkout drops the unavailable movie and names it in the notice.
    let checkout = order_service::checkout(&state, &auth_user).await?;
    assert!(checkout.message.contains("Third Picture"));
    let data = checkout.data.unwrap();
    assert_eq!(data.items.len(), 2);
    assert_eq!(data.excluded.len(), 1);
    assert_eq!(data.excluded[0].movie_id, movie_c);
    assert_eq!(data.excluded[0].reason, "no longer available");
    assert_eq!(data.order.total_amount, 990 + 1490);
    assert_eq!(data.order.status, "pending");
    let order_id = data.order.id;

    // Open a checkout session (offline gateway).
    let pay = payment_service::pay_order(&state, &auth_user, order_id).await?;
    let pay_data = pay.data.unwrap();
    assert!(!pay_data.checkout_url.is_empty());

    // Simulate the gateway completion webhook for the stored session.
    let payment = Payments::find_by_id(pay_data.payment_id)
        .one(&state.orm)
        .await?
        .unwrap();
    let body = serde_json::json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": payment.external_session_id,
            "payment_intent": "pi_test_123"
        } }
    });
    payment_service::handle_webhook(&state, body.to_string().as_bytes(), None).await?;

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.unwrap();
    assert_eq!(order.status, "paid");
    let payment = Payments::find_by_id(pay_data.payment_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(payment.status, "successful");
    assert_eq!(payment.external_payment_id.as_deref(), Some("pi_test_123"));

    // A purchased movie cannot go back into the cart.
    let err = cart_service::add_to_cart(
        &state,
        &auth_user,
        AddToCartRequest { movie_id: movie_a },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("already bought")));

    // A purchased movie cannot be deleted.
    let err = movie_service::delete_movie(&state, &auth_admin, movie_a)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // A paid order cannot be canceled directly.
    let err = order_service::cancel_order(&state, &auth_user, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("refund")));

    // The refund path is the only way from paid to canceled.
    let request = payment_service::create_refund_request(
        &state,
        &auth_user,
        pay_data.payment_id,
        CreateRefundRequest {
            reason: "Bought by mistake".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let decided = payment_service::decide_refund_request(
        &state,
        &auth_moderator,
        request.id,
        RefundDecisionRequest { approve: true },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(decided.status, "approved");

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.unwrap();
    assert_eq!(order.status, "canceled");
    let payment = Payments::find_by_id(pay_data.payment_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(payment.status, "refunded");

    // A movie nobody bought can be deleted, and carts holding it are emptied.
    CartItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(moderator_id),
        movie_id: Set(movie_c),
        added_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    let deleted = movie_service::delete_movie(&state, &auth_admin, movie_c).await?;
    assert_eq!(deleted.data.unwrap().carts_touched, 1);
    assert!(Movies::find_by_id(movie_c).one(&state.orm).await?.is_none());

    // After the refund the movie no longer counts as purchased, so it can
    // be bought again; a pending order can still be canceled directly.
    cart_service::add_to_cart(
        &state,
        &auth_user,
        AddToCartRequest { movie_id: movie_b },
    )
    .await?;
    let checkout = order_service::checkout(&state, &auth_user).await?;
    let second_order_id = checkout.data.unwrap().order.id;

    let canceled = order_service::cancel_order(&state, &auth_user, second_order_id).await?;
    assert_eq!(canceled.data.unwrap().status, "canceled");

    // Canceling twice is rejected.
    let err = order_service::cancel_order(&state, &auth_user, second_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let state = setup_state_no_truncate(database_url).await?;

    // Clean tables between runs
    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(
            backend,
            "TRUNCATE TABLE refund_requests, payments, order_items, orders, cart_items, \
             favorites, likes, ratings, comments, movie_actors, movie_genres, movies, \
             actors, genres, refresh_tokens, password_reset_tokens, activation_tokens, \
             audit_logs, users RESTART IDENTITY CASCADE",
        ))
        .await?;

    Ok(state)
}

async fn setup_state_no_truncate(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    Ok(AppState {
        pool,
        orm,
        mailer: Mailer::disabled(),
        gateway: PaymentGateway::offline(),
        public_base_url: "http://127.0.0.1:3000".into(),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_movie(state: &AppState, title: &str, price: i64) -> anyhow::Result<Uuid> {
    let movie = MovieActive {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        description: Set("A movie for testing".into()),
        year: Set(2021),
        duration_min: Set(100),
        imdb_rating: Set(7.0),
        votes: Set(1000),
        price: Set(price),
        certification: Set(Some("PG".into())),
        is_available: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(movie.id)
}
