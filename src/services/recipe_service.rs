use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record},
    dto::recipes::{
        CreateRecipeRequest, IngredientAmountInput, RecipeList, UpdateRecipeRequest,
        validate_recipe_payload,
    },
    entity::{
        favorite_carts::{self, Entity as FavoriteCarts},
        follows::{self, Entity as Follows},
        ingredient_amounts::{self, Entity as IngredientAmounts},
        ingredients::{self, Entity as Ingredients},
        recipe_tags::{self, Entity as RecipeTags},
        recipes::{self, Entity as Recipes},
        tags::{self, Entity as Tags},
        users::{self, Entity as Users},
    },
    error::{AppError, AppResult, unique_violation_as},
    marks::RecipeMark,
    middleware::auth::AuthUser,
    models::{Recipe, RecipeIngredient, Tag, UserProfile},
    response::{ApiResponse, Meta},
    routes::params::RecipeQuery,
    state::AppState,
};

const DUPLICATE_RECIPE: &str = "You have already created a recipe with this name";

pub async fn find_recipe<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<recipes::Model> {
    Recipes::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(author) = query.author {
        condition = condition.add(recipes::Column::AuthorId.eq(author));
    }

    let slugs = query.tag_slugs();
    if !slugs.is_empty() {
        condition = condition.add(recipes::Column::Id.in_subquery(tagged_with(slugs)));
    }

    let mark_filters = [
        (query.favorited(), favorite_carts::Column::Favorited),
        (query.in_shopping_cart(), favorite_carts::Column::InCart),
    ];
    for (wanted, column) in mark_filters {
        match (wanted, viewer) {
            (Some(true), Some(user)) => {
                condition =
                    condition.add(recipes::Column::Id.in_subquery(marked_by(user.user_id, column)));
            }
            (Some(false), Some(user)) => {
                condition = condition
                    .add(recipes::Column::Id.not_in_subquery(marked_by(user.user_id, column)));
            }
            // nothing is marked for an anonymous caller
            (Some(true), None) => {
                let data = RecipeList { items: Vec::new() };
                return Ok(ApiResponse::success("Recipes", data, Some(Meta::new(page, limit, 0))));
            }
            (Some(false), None) | (None, _) => {}
        }
    }

    let finder = Recipes::find()
        .filter(condition)
        .order_by_desc(recipes::Column::PubDate)
        .order_by_asc(recipes::Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = hydrate(&state.orm, viewer.map(|u| u.user_id), models).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Recipes", RecipeList { items }, Some(meta)))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Recipe>> {
    let model = find_recipe(&state.orm, id).await?;
    let recipe = hydrate_one(&state.orm, viewer.map(|u| u.user_id), model).await?;
    Ok(ApiResponse::success("Recipe", recipe, None))
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    validate_recipe_payload(
        &payload,
        Some(payload.ingredients.as_slice()),
        Some(payload.tags.as_slice()),
    )?;

    let txn = state.orm.begin().await?;

    let duplicate = Recipes::find()
        .filter(recipes::Column::AuthorId.eq(user.user_id))
        .filter(recipes::Column::Name.eq(payload.name.as_str()))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::conflict(DUPLICATE_RECIPE));
    }

    ensure_catalog_refs(&txn, &payload.ingredients, &payload.tags).await?;

    let recipe = recipes::ActiveModel {
        id: Set(Uuid::new_v4()),
        author_id: Set(user.user_id),
        name: Set(payload.name),
        image: Set(payload.image),
        text: Set(payload.text),
        cooking_time: Set(payload.cooking_time),
        pub_date: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|e| unique_violation_as(e, DUPLICATE_RECIPE))?;

    write_ingredients(&txn, recipe.id, &payload.ingredients).await?;
    write_tags(&txn, recipe.id, &payload.tags).await?;
    txn.commit().await?;

    tracing::info!(recipe_id = %recipe.id, author_id = %user.user_id, "recipe created");
    record(
        &state.pool,
        user.user_id,
        AuditAction::RecipeCreate,
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let recipe = hydrate_one(&state.orm, Some(user.user_id), recipe).await?;
    Ok(ApiResponse::success("Recipe created", recipe, Some(Meta::empty())))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    validate_recipe_payload(&payload, payload.ingredients.as_deref(), payload.tags.as_deref())?;

    let txn = state.orm.begin().await?;
    let existing = find_recipe(&txn, id).await?;
    if existing.author_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = payload.name.as_deref().filter(|n| *n != existing.name) {
        let duplicate = Recipes::find()
            .filter(recipes::Column::AuthorId.eq(user.user_id))
            .filter(recipes::Column::Name.eq(name))
            .filter(recipes::Column::Id.ne(id))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::conflict(DUPLICATE_RECIPE));
        }
    }

    ensure_catalog_refs(
        &txn,
        payload.ingredients.as_deref().unwrap_or_default(),
        payload.tags.as_deref().unwrap_or_default(),
    )
    .await?;

    let mut active: recipes::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(text) = payload.text {
        active.text = Set(text);
    }
    if let Some(cooking_time) = payload.cooking_time {
        active.cooking_time = Set(cooking_time);
    }
    let recipe = if active.is_changed() {
        active
            .update(&txn)
            .await
            .map_err(|e| unique_violation_as(e, DUPLICATE_RECIPE))?
    } else {
        find_recipe(&txn, id).await?
    };

    if let Some(ingredients) = payload.ingredients.as_deref() {
        IngredientAmounts::delete_many()
            .filter(ingredient_amounts::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        write_ingredients(&txn, id, ingredients).await?;
    }
    if let Some(tags) = payload.tags.as_deref() {
        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        write_tags(&txn, id, tags).await?;
    }
    txn.commit().await?;

    record(
        &state.pool,
        user.user_id,
        AuditAction::RecipeUpdate,
        serde_json::json!({ "recipe_id": id }),
    )
    .await;

    let recipe = hydrate_one(&state.orm, Some(user.user_id), recipe).await?;
    Ok(ApiResponse::success("Updated", recipe, Some(Meta::empty())))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = find_recipe(&state.orm, id).await?;
    if existing.author_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let result = Recipes::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Recipe not found"));
    }

    tracing::info!(recipe_id = %id, "recipe deleted");
    record(
        &state.pool,
        user.user_id,
        AuditAction::RecipeDelete,
        serde_json::json!({ "recipe_id": id }),
    )
    .await;
    Ok(())
}

/// Every referenced ingredient and tag must exist in the catalog.
async fn ensure_catalog_refs<C: ConnectionTrait>(
    conn: &C,
    ingredients: &[IngredientAmountInput],
    tags: &[Uuid],
) -> AppResult<()> {
    if !ingredients.is_empty() {
        let wanted: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
        let found: HashSet<Uuid> = Ingredients::find()
            .filter(ingredients::Column::Id.is_in(wanted.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        if let Some(missing) = wanted.iter().find(|id| !found.contains(id)) {
            return Err(AppError::not_found(format!(
                "Ingredient with id={missing} does not exist"
            )));
        }
    }

    if !tags.is_empty() {
        let found: HashSet<Uuid> = Tags::find()
            .filter(tags::Column::Id.is_in(tags.to_vec()))
            .all(conn)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if let Some(missing) = tags.iter().find(|id| !found.contains(id)) {
            return Err(AppError::not_found(format!(
                "Tag with id={missing} does not exist"
            )));
        }
    }
    Ok(())
}

async fn write_ingredients<C: ConnectionTrait>(
    conn: &C,
    recipe_id: Uuid,
    ingredients: &[IngredientAmountInput],
) -> AppResult<()> {
    if ingredients.is_empty() {
        return Ok(());
    }
    let rows = ingredients.iter().map(|i| ingredient_amounts::ActiveModel {
        recipe_id: Set(recipe_id),
        ingredient_id: Set(i.id),
        amount: Set(i.amount),
    });
    IngredientAmounts::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn write_tags<C: ConnectionTrait>(conn: &C, recipe_id: Uuid, tags: &[Uuid]) -> AppResult<()> {
    if tags.is_empty() {
        return Ok(());
    }
    let rows = tags.iter().map(|tag_id| recipe_tags::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    });
    RecipeTags::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

fn tagged_with(slugs: Vec<String>) -> SelectStatement {
    Query::select()
        .column((recipe_tags::Entity, recipe_tags::Column::RecipeId))
        .from(recipe_tags::Entity)
        .inner_join(
            tags::Entity,
            Expr::col((tags::Entity, tags::Column::Id))
                .equals((recipe_tags::Entity, recipe_tags::Column::TagId)),
        )
        .and_where(Expr::col((tags::Entity, tags::Column::Slug)).is_in(slugs))
        .to_owned()
}

fn marked_by(user_id: Uuid, flag: favorite_carts::Column) -> SelectStatement {
    Query::select()
        .column(favorite_carts::Column::RecipeId)
        .from(favorite_carts::Entity)
        .and_where(Expr::col(favorite_carts::Column::UserId).eq(user_id))
        .and_where(Expr::col(flag).eq(true))
        .to_owned()
}

pub async fn hydrate_one<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<Uuid>,
    model: recipes::Model,
) -> AppResult<Recipe> {
    hydrate(conn, viewer, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("recipe vanished while loading")))
}

/// Builds full representations for a page of recipes with one query per
/// related table, preserving the input order.
pub async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<Uuid>,
    models: Vec<recipes::Model>,
) -> AppResult<Vec<Recipe>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let author_ids: Vec<Uuid> = models
        .iter()
        .map(|m| m.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Uuid, users::Model> = Users::find()
        .filter(users::Column::Id.is_in(author_ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut ingredients_by_recipe: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    let amounts = IngredientAmounts::find()
        .filter(ingredient_amounts::Column::RecipeId.is_in(ids.clone()))
        .find_also_related(Ingredients)
        .all(conn)
        .await?;
    for (amount, ingredient) in amounts {
        let Some(ingredient) = ingredient else { continue };
        ingredients_by_recipe
            .entry(amount.recipe_id)
            .or_default()
            .push(RecipeIngredient {
                id: ingredient.id,
                name: ingredient.name,
                measurement_unit: ingredient.measurement_unit,
                amount: amount.amount,
            });
    }

    let mut tags_by_recipe: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    let tag_rows = RecipeTags::find()
        .filter(recipe_tags::Column::RecipeId.is_in(ids.clone()))
        .find_also_related(Tags)
        .all(conn)
        .await?;
    for (link, tag) in tag_rows {
        if let Some(tag) = tag {
            tags_by_recipe.entry(link.recipe_id).or_default().push(Tag::from(tag));
        }
    }

    let (marks, followed) = match viewer {
        Some(viewer) => {
            let marks: HashMap<Uuid, RecipeMark> = FavoriteCarts::find()
                .filter(favorite_carts::Column::UserId.eq(viewer))
                .filter(favorite_carts::Column::RecipeId.is_in(ids.clone()))
                .all(conn)
                .await?
                .into_iter()
                .map(|row| (row.recipe_id, RecipeMark::from_flags(row.favorited, row.in_cart)))
                .collect();
            let followed: HashSet<Uuid> = Follows::find()
                .filter(follows::Column::UserId.eq(viewer))
                .filter(follows::Column::FollowingId.is_in(author_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|f| f.following_id)
                .collect();
            (marks, followed)
        }
        None => (HashMap::new(), HashSet::new()),
    };

    let mut recipes = Vec::with_capacity(models.len());
    for model in models {
        let author = authors.get(&model.author_id).cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "author {} of recipe {} missing",
                model.author_id,
                model.id
            ))
        })?;
        let mark = marks.get(&model.id).copied().unwrap_or(RecipeMark::None);

        let mut ingredients = ingredients_by_recipe.remove(&model.id).unwrap_or_default();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        let mut tags = tags_by_recipe.remove(&model.id).unwrap_or_default();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let is_subscribed = followed.contains(&author.id);
        recipes.push(Recipe {
            id: model.id,
            tags,
            author: UserProfile::from_entity(author, is_subscribed),
            ingredients,
            is_favorited: mark.is_favorited(),
            is_in_shopping_cart: mark.is_in_cart(),
            name: model.name,
            image: model.image,
            text: model.text,
            cooking_time: model.cooking_time,
            pub_date: model.pub_date.with_timezone(&Utc),
        });
    }
    Ok(recipes)
}
