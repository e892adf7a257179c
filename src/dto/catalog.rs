use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Ingredient, Tag};

pub static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color pattern"));
pub static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(regex(path = *COLOR_RE, message = "Color must be a #RRGGBB hex value"))]
    pub color: String,
    #[validate(length(min = 1, max = 32), regex(path = *SLUG_RE, message = "Invalid slug"))]
    pub slug: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateIngredientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 16))]
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IngredientQuery {
    /// Case-insensitive substring of the ingredient name.
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TagList {
    #[schema(value_type = Vec<Tag>)]
    pub items: Vec<Tag>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct IngredientList {
    #[schema(value_type = Vec<Ingredient>)]
    pub items: Vec<Ingredient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_color_must_be_hex() {
        let tag = CreateTagRequest {
            name: "Breakfast".into(),
            color: "orange".into(),
            slug: "breakfast".into(),
        };
        let errors = tag.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("color"));

        let tag = CreateTagRequest {
            color: "#E26C2D".into(),
            ..tag
        };
        assert!(tag.validate().is_ok());
    }
}
