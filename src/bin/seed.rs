use std::{env, path::PathBuf};

use anyhow::Context;
use foodgram_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    services::auth_service::hash_password,
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_CSV: &str = "data/ingredients.csv";

const DEFAULT_TAGS: [(&str, &str, &str); 3] = [
    ("Завтрак", "#E26C2D", "breakfast"),
    ("Обед", "#49B64E", "lunch"),
    ("Ужин", "#8775D2", "dinner"),
];

#[derive(Debug, Deserialize)]
struct IngredientRow {
    name: String,
    unit: String,
}

/// Usage: `seed [ingredients.csv]`. Falls back to `INGREDIENTS_CSV`, then the bundled file.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&create_orm_conn(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin", "admin12345", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "cook", "user12345", "user").await?;

    let csv_path = env::args()
        .nth(1)
        .or_else(|| env::var("INGREDIENTS_CSV").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV));
    let ingredients = seed_ingredients(&pool, &csv_path).await?;
    seed_tags(&pool).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, User ID: {user_id}, new ingredients: {ingredients}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    username: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(username)
    .bind(username)
    .bind("Foodgram")
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

/// Loads headerless `name,unit` rows. Returns how many rows were new.
async fn seed_ingredients(pool: &sqlx::PgPool, path: &PathBuf) -> anyhow::Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut inserted = 0;
    for record in reader.deserialize::<IngredientRow>() {
        let row = record.with_context(|| format!("malformed row in {}", path.display()))?;
        if row.name.is_empty() || row.unit.is_empty() {
            continue;
        }
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (id, name, measurement_unit)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.name.to_lowercase())
        .bind(row.unit)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    println!("Seeded ingredients from {}", path.display());
    Ok(inserted)
}

async fn seed_tags(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (name, color, slug) in DEFAULT_TAGS {
        sqlx::query(
            r#"
            INSERT INTO tags (id, name, color, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(color)
        .bind(slug)
        .execute(pool)
        .await?;
    }

    println!("Seeded tags");
    Ok(())
}
