use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Actor, Comment, Genre, Movie};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMovieRequest {
    pub title: String,
    pub description: String,
    pub year: i32,
    pub duration_min: i32,
    pub imdb_rating: f64,
    pub votes: Option<i32>,
    pub price: i64,
    pub certification: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<Uuid>,
    #[serde(default)]
    pub actor_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub duration_min: Option<i32>,
    pub imdb_rating: Option<f64>,
    pub votes: Option<i32>,
    pub price: Option<i64>,
    pub certification: Option<String>,
    pub is_available: Option<bool>,
    pub genre_ids: Option<Vec<Uuid>>,
    pub actor_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovieList {
    pub items: Vec<Movie>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: Movie,
    pub genres: Vec<Genre>,
    pub actors: Vec<Actor>,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub like_count: i64,
    pub favorite_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteMovieResponse {
    pub carts_touched: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateMovieRequest {
    pub rating: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub body: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentList {
    pub items: Vec<Comment>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGenreRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenreList {
    pub items: Vec<Genre>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateActorRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActorList {
    pub items: Vec<Actor>,
}
