use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{AuditAction, record},
    dto::catalog::{
        CreateIngredientRequest, CreateTagRequest, IngredientList, IngredientQuery, TagList,
    },
    entity::{
        ingredients::{self, Entity as Ingredients},
        tags::{self, Entity as Tags},
    },
    error::{AppError, AppResult, unique_violation_as},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Ingredient, Tag},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_tags(state: &AppState) -> AppResult<ApiResponse<TagList>> {
    let items = Tags::find()
        .order_by_asc(tags::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Tag::from)
        .collect();
    Ok(ApiResponse::success("Tags", TagList { items }, None))
}

pub async fn get_tag(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Tag not found"))?;
    Ok(ApiResponse::success("Tag", Tag::from(tag), None))
}

pub async fn create_tag(
    state: &AppState,
    user: &AuthUser,
    payload: CreateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    ensure_admin(user)?;
    payload.validate()?;

    let tag = tags::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        color: Set(payload.color.to_uppercase()),
        slug: Set(payload.slug),
    }
    .insert(&state.orm)
    .await
    .map_err(|e| unique_violation_as(e, "A tag with this name, color or slug already exists"))?;

    record(
        &state.pool,
        user.user_id,
        AuditAction::TagCreate,
        serde_json::json!({ "tag_id": tag.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Tag created",
        Tag::from(tag),
        Some(Meta::empty()),
    ))
}

pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let mut finder = Ingredients::find();
    if let Some(name) = query.name.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(name));
        finder = finder.filter(Expr::col(ingredients::Column::Name).ilike(pattern));
    }

    let items = finder
        .order_by_asc(ingredients::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Ingredient::from)
        .collect();
    Ok(ApiResponse::success(
        "Ingredients",
        IngredientList { items },
        None,
    ))
}

pub async fn get_ingredient(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Ingredient>> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Ingredient not found"))?;
    Ok(ApiResponse::success(
        "Ingredient",
        Ingredient::from(ingredient),
        None,
    ))
}

pub async fn create_ingredient(
    state: &AppState,
    user: &AuthUser,
    payload: CreateIngredientRequest,
) -> AppResult<ApiResponse<Ingredient>> {
    ensure_admin(user)?;
    payload.validate()?;

    let ingredient = ingredients::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_lowercase()),
        measurement_unit: Set(payload.measurement_unit.trim().to_string()),
    }
    .insert(&state.orm)
    .await
    .map_err(|e| unique_violation_as(e, "This ingredient already exists"))?;

    record(
        &state.pool,
        user.user_id,
        AuditAction::IngredientCreate,
        serde_json::json!({ "ingredient_id": ingredient.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Ingredient created",
        Ingredient::from(ingredient),
        Some(Meta::empty()),
    ))
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("сахар"), "сахар");
    }
}
