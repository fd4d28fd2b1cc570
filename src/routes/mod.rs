use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod actors;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod favorites;
pub mod genres;
pub mod health;
pub mod movies;
pub mod orders;
pub mod params;
pub mod payments;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/movies", movies::router())
        .nest("/genres", genres::router())
        .nest("/actors", actors::router())
        .nest("/favorites", favorites::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/admin", admin::router())
}
