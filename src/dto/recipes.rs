use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::Recipe,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct IngredientAmountInput {
    pub id: Uuid,
    #[validate(range(min = 1, message = "Amount must be at least 1"))]
    pub amount: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    /// Data URI or URL of the dish picture.
    #[validate(length(min = 1, message = "This field is required"))]
    pub image: String,
    #[validate(length(min = 1, message = "This field is required"))]
    pub text: String,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    pub cooking_time: i32,
    #[validate(length(min = 1, message = "At least one ingredient is required"), nested)]
    pub ingredients: Vec<IngredientAmountInput>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

/// Partial update. Supplied `ingredients` or `tags` replace the current sets.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateRecipeRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "This field is required"))]
    pub image: Option<String>,
    #[validate(length(min = 1, message = "This field is required"))]
    pub text: Option<String>,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    pub cooking_time: Option<i32>,
    #[validate(length(min = 1, message = "At least one ingredient is required"), nested)]
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub tags: Option<Vec<Uuid>>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct RecipeList {
    #[schema(value_type = Vec<Recipe>)]
    pub items: Vec<Recipe>,
}

/// Runs the declarative rules, then rejects repeated ingredient or tag ids.
pub fn validate_recipe_payload<T: Validate>(
    payload: &T,
    ingredients: Option<&[IngredientAmountInput]>,
    tags: Option<&[Uuid]>,
) -> AppResult<()> {
    let mut fields = match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => match AppError::from(errors) {
            AppError::Validation(fields) => fields,
            other => return Err(other),
        },
    };

    if let Some(ingredients) = ingredients {
        if ingredients.iter().any(|i| i.amount < 1) {
            fields
                .entry("ingredients".into())
                .or_default()
                .push("Amount must be at least 1".into());
        }
        if has_duplicates(ingredients.iter().map(|i| i.id)) {
            fields
                .entry("ingredients".into())
                .or_default()
                .push("Ingredients must not repeat".into());
        }
    }
    if let Some(tags) = tags {
        if has_duplicates(tags.iter().copied()) {
            fields
                .entry("tags".into())
                .or_default()
                .push("Tags must not repeat".into());
        }
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(fields))
    }
}

fn has_duplicates(ids: impl Iterator<Item = Uuid>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(ingredients: Vec<IngredientAmountInput>, tags: Vec<Uuid>) -> CreateRecipeRequest {
        CreateRecipeRequest {
            name: "Syrniki".into(),
            image: "data:image/png;base64,iVBORw0KGgo=".into(),
            text: "Mix and fry.".into(),
            cooking_time: 20,
            ingredients,
            tags,
        }
    }

    fn check(p: &CreateRecipeRequest) -> AppResult<()> {
        validate_recipe_payload(p, Some(p.ingredients.as_slice()), Some(p.tags.as_slice()))
    }

    fn fields_of(result: AppResult<()>) -> FieldErrors {
        match result {
            Err(AppError::Validation(fields)) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_payload_passes() {
        let p = payload(
            vec![IngredientAmountInput { id: Uuid::new_v4(), amount: 200 }],
            vec![Uuid::new_v4()],
        );
        assert!(check(&p).is_ok());
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        let id = Uuid::new_v4();
        let p = payload(
            vec![
                IngredientAmountInput { id, amount: 1 },
                IngredientAmountInput { id, amount: 2 },
            ],
            vec![],
        );
        let fields = fields_of(check(&p));
        assert_eq!(fields["ingredients"], vec!["Ingredients must not repeat".to_string()]);
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let tag = Uuid::new_v4();
        let p = payload(
            vec![IngredientAmountInput { id: Uuid::new_v4(), amount: 1 }],
            vec![tag, tag],
        );
        assert!(fields_of(check(&p)).contains_key("tags"));
    }

    #[test]
    fn zero_cooking_time_and_empty_ingredients_are_field_errors() {
        let mut p = payload(vec![], vec![]);
        p.cooking_time = 0;
        let fields = fields_of(check(&p));
        assert!(fields.contains_key("cooking_time"));
        assert!(fields.contains_key("ingredients"));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let p = payload(
            vec![IngredientAmountInput { id: Uuid::new_v4(), amount: 0 }],
            vec![],
        );
        assert!(fields_of(check(&p)).contains_key("ingredients"));
    }

    #[test]
    fn empty_update_is_valid() {
        let update = UpdateRecipeRequest::default();
        assert!(validate_recipe_payload(&update, None, None).is_ok());
    }
}
