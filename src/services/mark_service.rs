use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    entity::favorite_carts::{self, Entity as FavoriteCarts},
    error::{AppError, AppResult},
    marks::{MarkAction, MarkKind, MarkRejection, RecipeMark},
    middleware::auth::AuthUser,
    models::RecipeShort,
    services::recipe_service::find_recipe,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub recipe: RecipeShort,
    pub mark: RecipeMark,
}

pub async fn toggle_favorite(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
    add: bool,
) -> AppResult<MarkOutcome> {
    apply_mark(state, user, recipe_id, MarkAction::new(MarkKind::Favorite, add)).await
}

pub async fn toggle_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
    add: bool,
) -> AppResult<MarkOutcome> {
    apply_mark(state, user, recipe_id, MarkAction::new(MarkKind::Cart, add)).await
}

/// Applies one transition to the (user, recipe) row inside a transaction.
///
/// The row is claimed with a single `INSERT .. ON CONFLICT DO UPDATE ..
/// RETURNING`: Postgres either inserts a fresh placeholder or waits for and
/// locks the live row, retrying the insert if a concurrent transaction deleted
/// it meanwhile. The returned row is therefore always present and locked until
/// commit. A rejected transition rolls back, taking a fresh placeholder with it.
pub async fn apply_mark(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
    action: MarkAction,
) -> AppResult<MarkOutcome> {
    let txn = state.orm.begin().await?;
    let recipe = find_recipe(&txn, recipe_id).await?;

    let row = FavoriteCarts::insert(favorite_carts::ActiveModel {
        user_id: Set(user.user_id),
        recipe_id: Set(recipe_id),
        favorited: Set(false),
        in_cart: Set(false),
        updated_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([
            favorite_carts::Column::UserId,
            favorite_carts::Column::RecipeId,
        ])
        // no-op update; it exists to take the row lock
        .value(
            favorite_carts::Column::UpdatedAt,
            Expr::col((favorite_carts::Entity, favorite_carts::Column::UpdatedAt)),
        )
        .to_owned(),
    )
    .exec_with_returning(&txn)
    .await?;

    let current = RecipeMark::from_flags(row.favorited, row.in_cart);
    let next = current.apply(action).map_err(rejection_error)?;

    if next == RecipeMark::None {
        FavoriteCarts::delete_by_id((user.user_id, recipe_id))
            .exec(&txn)
            .await?;
    } else {
        let (favorited, in_cart) = next.flags();
        let mut active: favorite_carts::ActiveModel = row.into();
        active.favorited = Set(favorited);
        active.in_cart = Set(in_cart);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }
    txn.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        %recipe_id,
        from = ?current,
        to = ?next,
        "recipe mark changed"
    );
    record(
        &state.pool,
        user.user_id,
        audit_action(action),
        serde_json::json!({ "recipe_id": recipe_id }),
    )
    .await;

    Ok(MarkOutcome {
        recipe: RecipeShort::from(recipe),
        mark: next,
    })
}

fn rejection_error(rejection: MarkRejection) -> AppError {
    match rejection {
        MarkRejection::AlreadySet(_) => AppError::conflict(rejection.message()),
        MarkRejection::NotSet(_) => AppError::not_found(rejection.message()),
    }
}

fn audit_action(action: MarkAction) -> AuditAction {
    match action {
        MarkAction::Add(MarkKind::Favorite) => AuditAction::FavoriteAdd,
        MarkAction::Remove(MarkKind::Favorite) => AuditAction::FavoriteRemove,
        MarkAction::Add(MarkKind::Cart) => AuditAction::CartAdd,
        MarkAction::Remove(MarkKind::Cart) => AuditAction::CartRemove,
    }
}
