use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

/// One ingredient of one cart recipe, before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShoppingListItem {
    pub name: String,
    pub total: i64,
    pub measurement_unit: String,
}

impl ShoppingListItem {
    /// `"<Name> <total> <unit>"`, the line printed on the exported list.
    pub fn line(&self) -> String {
        format!(
            "{} {} {}",
            capitalize(&self.name),
            self.total,
            self.measurement_unit
        )
    }
}

/// Cart ingredients summed per (name, unit), ordered by name then unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShoppingList {
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn aggregate<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CartIngredientRow>,
    {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for row in rows {
            *totals
                .entry((row.name, row.measurement_unit))
                .or_insert(0) += i64::from(row.amount);
        }

        let items = totals
            .into_iter()
            .map(|((name, measurement_unit), total)| ShoppingListItem {
                name,
                total,
                measurement_unit,
            })
            .collect();
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.items.iter().map(ShoppingListItem::line)
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
