use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Movie;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddFavoriteRequest {
    pub movie_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteMovieList {
    pub items: Vec<Movie>,
}
