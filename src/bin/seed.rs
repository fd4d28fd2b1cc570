use axum_movie_store_api::{
    config::AppConfig,
    db::create_pool,
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin123!pass", "admin").await?;
    let moderator_id =
        ensure_user(&pool, "moderator@example.com", "Mod123!pass", "moderator").await?;
    let user_id = ensure_user(&pool, "user@example.com", "User123!pass", "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin: {admin_id}, Moderator: {moderator_id}, User: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let movies = vec![
        (
            "The Hidden Fortress",
            "Two peasants escort a general and a princess through enemy lines",
            1958,
            139,
            8.1_f64,
            43_000,
            990_i64,
            "PG",
        ),
        (
            "Paper Moon",
            "A con man and a nine-year-old travel the Depression-era Midwest",
            1973,
            102,
            8.1,
            48_000,
            790,
            "PG",
        ),
        (
            "Night Train",
            "Strangers share a sleeper compartment on an overnight ride to the coast",
            1959,
            99,
            7.4,
            6_500,
            590,
            "NR",
        ),
        (
            "The Long Goodbye",
            "A private eye drifts through 1970s Los Angeles looking for the truth",
            1973,
            112,
            7.5,
            38_000,
            890,
            "R",
        ),
    ];

    for (title, description, year, duration, imdb, votes, price, certification) in movies {
        sqlx::query(
            r#"
            INSERT INTO movies (id, title, description, year, duration_min, imdb_rating,
                                votes, price, certification)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (title, year, duration_min) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(year)
        .bind(duration)
        .bind(imdb)
        .bind(votes)
        .bind(price)
        .bind(certification)
        .execute(pool)
        .await?;
    }

    for genre in ["Adventure", "Comedy", "Crime", "Drama"] {
        sqlx::query("INSERT INTO genres (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(genre)
            .execute(pool)
            .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
