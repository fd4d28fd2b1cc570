use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::movies::{CommentList, CreateCommentRequest},
    entity::{
        comments::{ActiveModel as CommentActive, Column as CommentCol, Entity as Comments, Model as CommentModel},
        movies::Entity as Movies,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Comment,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn create_comment(
    state: &AppState,
    user: &AuthUser,
    movie_id: Uuid,
    payload: CreateCommentRequest,
) -> AppResult<ApiResponse<Comment>> {
    if payload.body.trim().is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".into()));
    }

    let movie = Movies::find_by_id(movie_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let parent = match payload.parent_id {
        Some(parent_id) => {
            let parent = Comments::find_by_id(parent_id)
                .one(&state.orm)
                .await?
                .ok_or_else(|| AppError::BadRequest("Parent comment not found".into()))?;
            if parent.movie_id != movie_id {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to another movie".into(),
                ));
            }
            Some(parent)
        }
        None => None,
    };

    let comment = CommentActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        movie_id: Set(movie_id),
        parent_id: Set(payload.parent_id),
        body: Set(payload.body),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // Replying to someone else's comment notifies its author.
    if let Some(parent) = parent.filter(|p| p.user_id != user.user_id) {
        if let Some(author) = Users::find_by_id(parent.user_id).one(&state.orm).await? {
            if let Err(err) = state
                .mailer
                .send_comment_reply_email(&author.email, &movie.title)
                .await
            {
                tracing::warn!(error = %err, "comment reply email failed");
            }
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "comment_create",
        Some("comments"),
        Some(serde_json::json!({ "movie_id": movie_id, "comment_id": comment.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Comment created",
        comment_from_entity(comment),
        Some(Meta::empty()),
    ))
}

pub async fn list_comments(
    state: &AppState,
    movie_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<CommentList>> {
    Movies::find_by_id(movie_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let (page, limit, offset) = pagination.normalize();

    let finder = Comments::find()
        .filter(CommentCol::MovieId.eq(movie_id))
        .order_by_desc(CommentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(comment_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", CommentList { items }, Some(meta)))
}

fn comment_from_entity(model: CommentModel) -> Comment {
    Comment {
        id: model.id,
        user_id: model.user_id,
        movie_id: model.movie_id,
        parent_id: model.parent_id,
        body: model.body,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
