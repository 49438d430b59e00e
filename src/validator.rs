//! Checks applied to a recipe write before anything reaches storage.

use std::collections::HashSet;

use crate::{
    dto::IngredientAmountInput,
    error::ValidationError,
    models::{IngredientAmount, TagId},
};

/// Amounts and cooking times are stored as small positive integers.
pub const MAX_SMALL_VALUE: i64 = 32767;
pub const MAX_NAME_CHARS: usize = 200;

/// Accepts a non-empty ingredient list with amounts in range and no repeated
/// ingredient, returning the rows to store in input order.
pub fn validate_ingredients(
    ingredients: Vec<IngredientAmountInput>,
) -> Result<Vec<IngredientAmount>, ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::EmptyIngredients);
    }

    let mut seen = HashSet::with_capacity(ingredients.len());
    let mut amounts = Vec::with_capacity(ingredients.len());
    for item in ingredients {
        let amount = small_value(item.amount).ok_or(ValidationError::InvalidQuantity {
            ingredient_id: item.id,
            amount: item.amount,
        })?;
        if !seen.insert(item.id) {
            return Err(ValidationError::DuplicateIngredient(item.id));
        }
        amounts.push(IngredientAmount {
            ingredient_id: item.id,
            amount,
        });
    }
    Ok(amounts)
}

pub fn validate_tags(tags: &[TagId]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(tags.len());
    match tags.iter().find(|tag| !seen.insert(**tag)) {
        Some(tag) => Err(ValidationError::DuplicateTag(*tag)),
        None => Ok(()),
    }
}

pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::InvalidName);
    }
    Ok(name.to_string())
}

pub fn validate_text(text: &str) -> Result<String, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text.to_string())
}

pub fn validate_cooking_time(minutes: i64) -> Result<u32, ValidationError> {
    small_value(minutes).ok_or(ValidationError::InvalidCookingTime(minutes))
}

fn small_value(value: i64) -> Option<u32> {
    if !(1..=MAX_SMALL_VALUE).contains(&value) {
        return None;
    }
    u32::try_from(value).ok()
}
