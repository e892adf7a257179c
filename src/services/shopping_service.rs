use crate::{
    audit::{AuditAction, record},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    pdf::render_shopping_list,
    shopping_list::{CartIngredientRow, ShoppingList},
    state::AppState,
};

pub enum ShoppingListExport {
    Empty,
    Pdf(Vec<u8>),
}

/// Ingredients of every recipe in the user's cart, summed per (name, unit).
pub async fn cart_summary(state: &AppState, user: &AuthUser) -> AppResult<ShoppingList> {
    let rows = sqlx::query_as::<_, CartIngredientRow>(
        r#"
        SELECT i.name, i.measurement_unit, ia.amount
        FROM favorite_carts fc
        JOIN ingredient_amounts ia ON ia.recipe_id = fc.recipe_id
        JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE fc.user_id = $1 AND fc.in_cart
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ShoppingList::aggregate(rows))
}

pub async fn export_shopping_list(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ShoppingListExport> {
    let list = cart_summary(state, user).await?;
    if list.is_empty() {
        return Ok(ShoppingListExport::Empty);
    }

    let items = list.items.len();
    let font = state.font.clone();
    let bytes = tokio::task::spawn_blocking(move || render_shopping_list(&list, &font))
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))??;

    tracing::info!(user_id = %user.user_id, items, bytes = bytes.len(), "shopping list rendered");
    record(
        &state.pool,
        user.user_id,
        AuditAction::ShoppingListDownload,
        serde_json::json!({ "items": items }),
    )
    .await;

    Ok(ShoppingListExport::Pdf(bytes))
}
