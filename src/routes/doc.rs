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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        catalog::{CreateIngredientRequest, CreateTagRequest, IngredientList, TagList},
        recipes::{CreateRecipeRequest, IngredientAmountInput, RecipeList, UpdateRecipeRequest},
        users::{SetPasswordRequest, SubscriptionList, UserList},
    },
    marks::RecipeMark,
    models::{Ingredient, Recipe, RecipeIngredient, RecipeShort, Subscription, Tag, UserProfile},
    response::{ApiResponse, Meta},
    routes::{auth, health, ingredients, params, recipes, tags, users},
    shopping_list::{ShoppingList, ShoppingListItem},
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
        auth::login,
        recipes::list_recipes,
        recipes::get_recipe,
        recipes::create_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        recipes::add_favorite,
        recipes::remove_favorite,
        recipes::add_to_cart,
        recipes::remove_from_cart,
        recipes::shopping_list,
        recipes::download_shopping_cart,
        ingredients::list_ingredients,
        ingredients::get_ingredient,
        ingredients::create_ingredient,
        tags::list_tags,
        tags::get_tag,
        tags::create_tag,
        users::list_users,
        users::me,
        users::get_user,
        users::set_password,
        users::list_subscriptions,
        users::subscribe,
        users::unsubscribe
    ),
    components(
        schemas(
            UserProfile,
            Tag,
            Ingredient,
            RecipeIngredient,
            Recipe,
            RecipeShort,
            RecipeMark,
            Subscription,
            ShoppingList,
            ShoppingListItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateTagRequest,
            CreateIngredientRequest,
            CreateRecipeRequest,
            UpdateRecipeRequest,
            IngredientAmountInput,
            SetPasswordRequest,
            RecipeList,
            TagList,
            IngredientList,
            UserList,
            SubscriptionList,
            params::Pagination,
            params::RecipeQuery,
            Meta,
            ApiResponse<Recipe>,
            ApiResponse<RecipeList>,
            ApiResponse<RecipeShort>,
            ApiResponse<UserProfile>,
            ApiResponse<Subscription>,
            ApiResponse<ShoppingList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Recipes", description = "Recipe endpoints"),
        (name = "Favorites", description = "Favorite marks"),
        (name = "Shopping cart", description = "Shopping cart marks and the printable list"),
        (name = "Ingredients", description = "Ingredient catalog"),
        (name = "Tags", description = "Tag catalog"),
        (name = "Users", description = "User profiles"),
        (name = "Subscriptions", description = "Following authors"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
