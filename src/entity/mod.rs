pub mod activation_tokens;
pub mod actors;
pub mod audit_logs;
pub mod cart_items;
pub mod comments;
pub mod favorites;
pub mod genres;
pub mod likes;
pub mod movie_actors;
pub mod movie_genres;
pub mod movies;
pub mod order_items;
pub mod orders;
pub mod password_reset_tokens;
pub mod payments;
pub mod ratings;
pub mod refresh_tokens;
pub mod refund_requests;
pub mod users;

pub use activation_tokens::Entity as ActivationTokens;
pub use actors::Entity as Actors;
pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use comments::Entity as Comments;
pub use favorites::Entity as Favorites;
pub use genres::Entity as Genres;
pub use likes::Entity as Likes;
pub use movie_actors::Entity as MovieActors;
pub use movie_genres::Entity as MovieGenres;
pub use movies::Entity as Movies;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use password_reset_tokens::Entity as PasswordResetTokens;
pub use payments::Entity as Payments;
pub use ratings::Entity as Ratings;
pub use refresh_tokens::Entity as RefreshTokens;
pub use refund_requests::Entity as RefundRequests;
pub use users::Entity as Users;
