use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, record},
    dto::users::{SetPasswordRequest, SubscriptionList, SubscriptionQuery, UserList},
    entity::{
        follows::{self, Entity as Follows},
        recipes::{self, Entity as Recipes},
        users::{self, Entity as Users},
    },
    error::{AppError, AppResult, unique_violation_as},
    middleware::auth::AuthUser,
    models::{RecipeShort, Subscription, UserProfile},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::auth_service::{hash_password, verify_password},
    state::AppState,
};

const ALREADY_FOLLOWING: &str = "You are already subscribed to this user";
const SELF_FOLLOW: &str = "You cannot subscribe to yourself";

async fn find_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<users::Model> {
    Users::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Subset of `candidates` that `viewer` follows.
async fn followed_among<C: ConnectionTrait>(
    conn: &C,
    viewer: Uuid,
    candidates: Vec<Uuid>,
) -> AppResult<HashSet<Uuid>> {
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }
    Ok(Follows::find()
        .filter(follows::Column::UserId.eq(viewer))
        .filter(follows::Column::FollowingId.is_in(candidates))
        .all(conn)
        .await?
        .into_iter()
        .map(|f| f.following_id)
        .collect())
}

pub async fn list_users(
    state: &AppState,
    viewer: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_asc(users::Column::Username);
    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let followed = followed_among(
        &state.orm,
        viewer.user_id,
        models.iter().map(|u| u.id).collect(),
    )
    .await?;
    let items = models
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            UserProfile::from_entity(u, subscribed)
        })
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(
    state: &AppState,
    viewer: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<UserProfile>> {
    let user = find_user(&state.orm, id).await?;
    let subscribed = followed_among(&state.orm, viewer.user_id, vec![id])
        .await?
        .contains(&id);
    Ok(ApiResponse::success(
        "User",
        UserProfile::from_entity(user, subscribed),
        None,
    ))
}

pub async fn set_password(
    state: &AppState,
    viewer: &AuthUser,
    payload: SetPasswordRequest,
) -> AppResult<()> {
    payload.validate()?;
    let user = find_user(&state.orm, viewer.user_id).await?;
    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(AppError::field("current_password", "Wrong password"));
    }

    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.update(&state.orm).await?;

    record(
        &state.pool,
        viewer.user_id,
        AuditAction::PasswordChange,
        serde_json::json!({ "user_id": viewer.user_id }),
    )
    .await;
    Ok(())
}

pub async fn subscribe(
    state: &AppState,
    viewer: &AuthUser,
    author_id: Uuid,
    recipes_limit: Option<u64>,
) -> AppResult<ApiResponse<Subscription>> {
    if viewer.user_id == author_id {
        return Err(AppError::conflict(SELF_FOLLOW));
    }
    let author = find_user(&state.orm, author_id).await?;

    let existing = Follows::find_by_id((viewer.user_id, author_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict(ALREADY_FOLLOWING));
    }

    follows::ActiveModel {
        user_id: Set(viewer.user_id),
        following_id: Set(author_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| unique_violation_as(e, ALREADY_FOLLOWING))?;

    tracing::info!(follower = %viewer.user_id, following = %author_id, "subscribed");
    record(
        &state.pool,
        viewer.user_id,
        AuditAction::FollowAdd,
        serde_json::json!({ "following_id": author_id }),
    )
    .await;

    let mut views = subscription_views(&state.orm, vec![author], recipes_limit).await?;
    let view = views
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("subscription view missing")))?;
    Ok(ApiResponse::success("Subscribed", view, Some(Meta::empty())))
}

pub async fn unsubscribe(state: &AppState, viewer: &AuthUser, author_id: Uuid) -> AppResult<()> {
    let result = Follows::delete_by_id((viewer.user_id, author_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("You are not subscribed to this user"));
    }

    record(
        &state.pool,
        viewer.user_id,
        AuditAction::FollowRemove,
        serde_json::json!({ "following_id": author_id }),
    )
    .await;
    Ok(())
}

pub async fn list_subscriptions(
    state: &AppState,
    viewer: &AuthUser,
    query: SubscriptionQuery,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let followed_ids = Query::select()
        .column(follows::Column::FollowingId)
        .from(follows::Entity)
        .and_where(Expr::col(follows::Column::UserId).eq(viewer.user_id))
        .to_owned();
    let finder = Users::find()
        .filter(users::Column::Id.in_subquery(followed_ids))
        .order_by_asc(users::Column::Username);

    let total = finder.clone().count(&state.orm).await? as i64;
    let authors = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = subscription_views(&state.orm, authors, query.recipes_limit).await?;
    Ok(ApiResponse::success(
        "Subscriptions",
        SubscriptionList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Every author passed in is followed by the caller, so `is_subscribed` is true.
async fn subscription_views<C: ConnectionTrait>(
    conn: &C,
    authors: Vec<users::Model>,
    recipes_limit: Option<u64>,
) -> AppResult<Vec<Subscription>> {
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();

    let mut by_author: HashMap<Uuid, Vec<recipes::Model>> = HashMap::new();
    let all_recipes = Recipes::find()
        .filter(recipes::Column::AuthorId.is_in(ids))
        .order_by_desc(recipes::Column::PubDate)
        .all(conn)
        .await?;
    for recipe in all_recipes {
        by_author.entry(recipe.author_id).or_default().push(recipe);
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            let shown = match recipes_limit {
                Some(limit) => recipes.into_iter().take(limit as usize).collect::<Vec<_>>(),
                None => recipes,
            };
            Subscription {
                user: UserProfile::from_entity(author, true),
                recipes: shown.into_iter().map(RecipeShort::from).collect(),
                recipes_count,
            }
        })
        .collect())
}
