use foodgram_api::{
    db::{create_pool, run_migrations},
    dto::recipes::{CreateRecipeRequest, IngredientAmountInput},
    entity::{
        favorite_carts::Entity as FavoriteCarts,
        ingredients::ActiveModel as IngredientActive,
        recipes::Entity as Recipes,
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::AppError,
    marks::RecipeMark,
    middleware::auth::AuthUser,
    pdf::BodyFont,
    services::{
        mark_service::{toggle_cart, toggle_favorite},
        recipe_service::create_recipe,
        shopping_service::{ShoppingListExport, cart_summary, export_shopping_list},
        user_service::subscribe,
    },
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use serial_test::serial;
use uuid::Uuid;

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run flow tests.");
            None
        }
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    // Empty carts never reach the renderer, so a signature-only font is enough.
    let state = AppState::new(pool, BodyFont::from_bytes(vec![0x00, 0x01, 0x00, 0x00])?);
    run_migrations(&state.orm).await?;

    let backend = state.orm.get_database_backend();
    state
        .orm
        .execute(Statement::from_string(
            backend,
            "TRUNCATE TABLE favorite_carts, recipe_tags, ingredient_amounts, recipes, follows, audit_logs, ingredients, tags, users CASCADE",
        ))
        .await?;

    Ok(state)
}

async fn create_user(state: &AppState, username: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{username}@example.com")),
        username: Set(username.to_string()),
        first_name: Set(username.to_string()),
        last_name: Set("Tester".into()),
        password_hash: Set("dummy".into()),
        role: Set("user".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

async fn create_ingredient(state: &AppState, name: &str, unit: &str) -> anyhow::Result<Uuid> {
    let ingredient = IngredientActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        measurement_unit: Set(unit.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(ingredient.id)
}

async fn recipe_with(
    state: &AppState,
    author: &AuthUser,
    name: &str,
    ingredients: Vec<(Uuid, i32)>,
) -> anyhow::Result<Uuid> {
    let payload = CreateRecipeRequest {
        name: name.into(),
        image: "data:image/png;base64,AAAA".into(),
        text: "Mix and serve.".into(),
        cooking_time: 10,
        ingredients: ingredients
            .into_iter()
            .map(|(id, amount)| IngredientAmountInput { id, amount })
            .collect(),
        tags: Vec::new(),
    };
    let resp = create_recipe(state, author, payload).await?;
    Ok(resp.data.expect("recipe").id)
}

#[tokio::test]
#[serial]
async fn marks_follow_the_transition_table_and_feed_the_cart() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let cook = create_user(&state, "cook").await?;
    let sugar = create_ingredient(&state, "сахар", "г").await?;
    let milk = create_ingredient(&state, "молоко", "мл").await?;
    let jam = recipe_with(&state, &cook, "Jam", vec![(sugar, 200)]).await?;
    let pudding = recipe_with(&state, &cook, "Pudding", vec![(sugar, 100), (milk, 250)]).await?;

    let outcome = toggle_favorite(&state, &cook, jam, true).await?;
    assert_eq!(outcome.mark, RecipeMark::FavoritedOnly);
    assert_eq!(outcome.recipe.id, jam);

    let again = toggle_favorite(&state, &cook, jam, true).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    assert_eq!(toggle_cart(&state, &cook, jam, true).await?.mark, RecipeMark::Both);
    assert_eq!(
        toggle_cart(&state, &cook, pudding, true).await?.mark,
        RecipeMark::InCartOnly
    );

    // Dropping the favorite keeps the cart mark.
    assert_eq!(
        toggle_favorite(&state, &cook, jam, false).await?.mark,
        RecipeMark::InCartOnly
    );
    let row = FavoriteCarts::find_by_id((cook.user_id, jam)).one(&state.orm).await?;
    assert!(row.is_some_and(|r| r.in_cart && !r.favorited));

    let list = cart_summary(&state, &cook).await?;
    assert_eq!(list.items.len(), 2);
    let sugar_line = list
        .items
        .iter()
        .find(|item| item.name == "сахар")
        .expect("sugar aggregated");
    assert_eq!(sugar_line.total, 300);
    assert_eq!(sugar_line.measurement_unit, "г");
    assert_eq!(sugar_line.line(), "Сахар 300 г");

    // Clearing the last flag deletes the row.
    assert_eq!(toggle_cart(&state, &cook, jam, false).await?.mark, RecipeMark::None);
    let row = FavoriteCarts::find_by_id((cook.user_id, jam)).one(&state.orm).await?;
    assert!(row.is_none());

    let missing = toggle_cart(&state, &cook, jam, false).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    let row = FavoriteCarts::find_by_id((cook.user_id, jam)).one(&state.orm).await?;
    assert!(row.is_none(), "rejected transition must not leave a placeholder");

    let unknown = toggle_favorite(&state, &cook, Uuid::new_v4(), true).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
#[serial]
async fn empty_cart_exports_nothing() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let guest = create_user(&state, "guest").await?;
    let export = export_shopping_list(&state, &guest).await?;
    assert!(matches!(export, ShoppingListExport::Empty));

    Ok(())
}

#[tokio::test]
#[serial]
async fn self_subscription_is_rejected() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let cook = create_user(&state, "cook").await?;
    let reader = create_user(&state, "reader").await?;

    let own = subscribe(&state, &cook, cook.user_id, None).await;
    assert!(matches!(own, Err(AppError::Conflict(_))));

    let view = subscribe(&state, &reader, cook.user_id, Some(3)).await?;
    let view = view.data.expect("subscription");
    assert!(view.user.is_subscribed);
    assert_eq!(view.recipes_count, 0);

    let twice = subscribe(&state, &reader, cook.user_id, None).await;
    assert!(matches!(twice, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
#[serial]
async fn deleting_a_user_cascades_to_recipes_and_marks() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let cook = create_user(&state, "cook").await?;
    let reader = create_user(&state, "reader").await?;
    let flour = create_ingredient(&state, "мука", "г").await?;
    let bread = recipe_with(&state, &cook, "Bread", vec![(flour, 500)]).await?;
    toggle_favorite(&state, &reader, bread, true).await?;

    Users::delete_by_id(cook.user_id).exec(&state.orm).await?;

    assert!(Recipes::find_by_id(bread).one(&state.orm).await?.is_none());
    let mark = FavoriteCarts::find_by_id((reader.user_id, bread))
        .one(&state.orm)
        .await?;
    assert!(mark.is_none());

    Ok(())
}

/// Runs favorite and cart toggles on the same pair at the same time.
async fn race(
    state: &AppState,
    user: &AuthUser,
    recipe: Uuid,
    favorite: bool,
    cart: bool,
) -> anyhow::Result<()> {
    let (s1, u1) = (state.clone(), user.clone());
    let (s2, u2) = (state.clone(), user.clone());
    let fav = tokio::spawn(async move { toggle_favorite(&s1, &u1, recipe, favorite).await });
    let cart = tokio::spawn(async move { toggle_cart(&s2, &u2, recipe, cart).await });
    fav.await??;
    cart.await??;
    Ok(())
}

async fn current_mark(state: &AppState, user: &AuthUser, recipe: Uuid) -> anyhow::Result<RecipeMark> {
    let row = FavoriteCarts::find_by_id((user.user_id, recipe))
        .one(&state.orm)
        .await?;
    Ok(row.map_or(RecipeMark::None, |r| {
        RecipeMark::from_flags(r.favorited, r.in_cart)
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_toggles_on_one_pair_compose() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&url).await?;

    let cook = create_user(&state, "cook").await?;
    let sugar = create_ingredient(&state, "сахар", "г").await?;
    let jam = recipe_with(&state, &cook, "Jam", vec![(sugar, 200)]).await?;

    for round in 0..50 {
        // favorited-only: unfavorite races add-to-cart, which may find the row deleted
        toggle_favorite(&state, &cook, jam, true).await?;
        race(&state, &cook, jam, false, true).await?;
        assert_eq!(
            current_mark(&state, &cook, jam).await?,
            RecipeMark::InCartOnly,
            "round {round}"
        );
        toggle_cart(&state, &cook, jam, false).await?;

        // none: both adds race to create the row
        race(&state, &cook, jam, true, true).await?;
        assert_eq!(
            current_mark(&state, &cook, jam).await?,
            RecipeMark::Both,
            "round {round}"
        );

        // both: both removals race to delete it
        race(&state, &cook, jam, false, false).await?;
        assert_eq!(
            current_mark(&state, &cook, jam).await?,
            RecipeMark::None,
            "round {round}"
        );
    }

    Ok(())
}
