use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    PasswordChange,
    RecipeCreate,
    RecipeUpdate,
    RecipeDelete,
    FavoriteAdd,
    FavoriteRemove,
    CartAdd,
    CartRemove,
    ShoppingListDownload,
    FollowAdd,
    FollowRemove,
    TagCreate,
    IngredientCreate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::PasswordChange => "password_change",
            AuditAction::RecipeCreate => "recipe_create",
            AuditAction::RecipeUpdate => "recipe_update",
            AuditAction::RecipeDelete => "recipe_delete",
            AuditAction::FavoriteAdd => "favorite_add",
            AuditAction::FavoriteRemove => "favorite_remove",
            AuditAction::CartAdd => "cart_add",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::ShoppingListDownload => "shopping_list_download",
            AuditAction::FollowAdd => "follow_add",
            AuditAction::FollowRemove => "follow_remove",
            AuditAction::TagCreate => "tag_create",
            AuditAction::IngredientCreate => "ingredient_create",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            AuditAction::UserRegister | AuditAction::UserLogin | AuditAction::PasswordChange => {
                "users"
            }
            AuditAction::RecipeCreate | AuditAction::RecipeUpdate | AuditAction::RecipeDelete => {
                "recipes"
            }
            AuditAction::FavoriteAdd
            | AuditAction::FavoriteRemove
            | AuditAction::CartAdd
            | AuditAction::CartRemove
            | AuditAction::ShoppingListDownload => "favorite_carts",
            AuditAction::FollowAdd | AuditAction::FollowRemove => "follows",
            AuditAction::TagCreate => "tags",
            AuditAction::IngredientCreate => "ingredients",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit entries never fail the request that produced them.
pub async fn record(pool: &DbPool, user_id: Uuid, action: AuditAction, metadata: Value) {
    if let Err(err) = log_audit(pool, Some(user_id), action, Some(metadata)).await {
        tracing::warn!(error = %err, action = action.as_str(), "audit log failed");
    }
}
