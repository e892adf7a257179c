pub mod audit_logs;
pub mod favorite_carts;
pub mod follows;
pub mod ingredient_amounts;
pub mod ingredients;
pub mod recipe_tags;
pub mod recipes;
pub mod tags;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use favorite_carts::Entity as FavoriteCarts;
pub use follows::Entity as Follows;
pub use ingredient_amounts::Entity as IngredientAmounts;
pub use ingredients::Entity as Ingredients;
pub use recipe_tags::Entity as RecipeTags;
pub use recipes::Entity as Recipes;
pub use tags::Entity as Tags;
pub use users::Entity as Users;
