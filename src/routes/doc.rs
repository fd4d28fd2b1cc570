use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginResponse, TokenRefreshResponse},
        cart::{CartItemDto, CartList},
        favorites::FavoriteMovieList,
        movies::{
            ActorList, CommentList, DeleteMovieResponse, GenreList, LikeResponse, MovieDetail,
            MovieList,
        },
        orders::{CheckoutResponse, ExcludedItem, OrderList, OrderWithItems},
        payments::{PayOrderResponse, PaymentDto, PaymentList, RefundRequestList},
        users::UserList,
    },
    models::{
        Actor, CartItem, Comment, Favorite, Genre, Movie, Order, OrderItem, RefundRequest, User,
    },
    response::{ApiResponse, Meta},
    routes::{actors, admin, auth, cart, favorites, genres, health, movies, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::activate,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::password_reset_request,
        auth::password_reset_complete,
        movies::list_movies,
        movies::get_movie,
        movies::create_movie,
        movies::update_movie,
        movies::delete_movie,
        movies::toggle_like,
        movies::rate_movie,
        movies::list_comments,
        movies::create_comment,
        genres::list_genres,
        genres::create_genre,
        genres::delete_genre,
        actors::list_actors,
        actors::create_actor,
        actors::delete_actor,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        cart::cart_list,
        cart::user_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::pay_order,
        payments::list_payments,
        payments::get_payment,
        payments::webhook,
        payments::create_refund_request,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::list_all_payments,
        admin::list_refund_requests,
        admin::decide_refund_request,
        admin::list_users,
        admin::update_user_role
    ),
    components(
        schemas(
            User,
            Movie,
            Genre,
            Actor,
            Comment,
            Favorite,
            CartItem,
            Order,
            OrderItem,
            RefundRequest,
            LoginResponse,
            TokenRefreshResponse,
            MovieList,
            MovieDetail,
            DeleteMovieResponse,
            LikeResponse,
            CommentList,
            GenreList,
            ActorList,
            FavoriteMovieList,
            CartItemDto,
            CartList,
            OrderList,
            OrderWithItems,
            ExcludedItem,
            CheckoutResponse,
            PayOrderResponse,
            PaymentDto,
            PaymentList,
            RefundRequestList,
            UserList,
            params::Pagination,
            params::MovieQuery,
            params::OrderListQuery,
            params::AdminOrderQuery,
            Meta,
            ApiResponse<Movie>,
            ApiResponse<MovieList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<PaymentList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, activation, login and token endpoints"),
        (name = "Movies", description = "Movie catalog endpoints"),
        (name = "Catalog", description = "Genre and actor endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment and refund endpoints"),
        (name = "Admin", description = "Moderation and admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
