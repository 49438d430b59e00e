//! Shopping list built from the recipes a user has put in their cart.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::{
    error::ServiceError,
    models::{AmountRow, UserId},
    repository::Repository,
};

/// Attachment name of the downloaded list.
pub const FILE_NAME: &str = "shopping_list.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub total: u64,
    pub unit: String,
}

impl fmt::Display for ShoppingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}",
            capitalize(&self.name),
            self.total,
            self.unit.to_lowercase()
        )
    }
}

/// Sums amounts per (name, unit) and yields the totals ordered by name,
/// then unit.
pub fn aggregate<I>(rows: I) -> impl Iterator<Item = ShoppingItem>
where
    I: IntoIterator<Item = AmountRow>,
{
    let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
    for row in rows {
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += u64::from(row.amount);
    }
    totals
        .into_iter()
        .map(|((name, unit), total)| ShoppingItem { name, total, unit })
}

/// One line per item, newline separated. No items renders as "".
pub fn render<I>(items: I) -> String
where
    I: IntoIterator<Item = ShoppingItem>,
{
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn shopping_list<R: Repository>(repo: &R, user: UserId) -> Result<String, ServiceError> {
    let recipes = repo.find_cart_recipes(user)?;
    if recipes.is_empty() {
        return Ok(String::new());
    }
    let rows = repo.ingredient_amounts(&recipes)?;
    debug!(
        "aggregating {} ingredient rows from {} recipes for user {}",
        rows.len(),
        recipes.len(),
        user
    );
    Ok(render(aggregate(rows)))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: u32) -> AmountRow {
        AmountRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn same_ingredient_is_summed_once() {
        let doc = render(aggregate(vec![row("salt", "g", 10), row("salt", "g", 15)]));
        assert_eq!(doc, "Salt: 25 g");
    }

    #[test]
    fn no_rows_render_an_empty_document() {
        assert_eq!(render(aggregate(Vec::new())), "");
    }

    #[test]
    fn output_is_ordered_by_name() {
        let doc = render(aggregate(vec![
            row("яйца", "шт", 2),
            row("мука", "г", 200),
            row("Butter", "G", 50),
            row("мука", "г", 100),
        ]));
        assert_eq!(doc, "Butter: 50 g\nМука: 300 г\nЯйца: 2 шт");
    }

    #[test]
    fn different_units_stay_separate() {
        let items: Vec<_> = aggregate(vec![
            row("milk", "ml", 200),
            row("milk", "cup", 1),
            row("milk", "ml", 300),
        ])
        .collect();
        assert_eq!(
            items,
            vec![
                ShoppingItem {
                    name: "milk".into(),
                    total: 1,
                    unit: "cup".into()
                },
                ShoppingItem {
                    name: "milk".into(),
                    total: 500,
                    unit: "ml".into()
                },
            ]
        );
    }

    #[test]
    fn totals_do_not_overflow_small_columns() {
        let rows = (0..4).map(|_| row("rice", "g", u32::MAX));
        let item = aggregate(rows).next().unwrap();
        assert_eq!(item.total, 4 * u64::from(u32::MAX));
    }

    #[test]
    fn capitalize_lowers_the_tail() {
        assert_eq!(capitalize("сОЛЬ"), "Соль");
        assert_eq!(capitalize(""), "");
    }
}
