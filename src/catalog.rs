//! Read-only reference data: tags and the ingredient catalog, plus the bulk
//! loader that fills the catalog.

use std::io;

use log::{info, warn};

use crate::{
    error::{NotFoundError, ServiceError},
    models::{Ingredient, IngredientId, NewIngredient, Tag, TagId},
    repository::Repository,
};

pub fn list_tags<R: Repository>(repo: &R) -> Result<Vec<Tag>, ServiceError> {
    Ok(repo.list_tags()?)
}

pub fn get_tag<R: Repository>(repo: &R, id: TagId) -> Result<Tag, ServiceError> {
    Ok(repo.find_tag(id)?.ok_or(NotFoundError::UnknownTag(id))?)
}

pub fn ingredient_catalog<R: Repository>(repo: &R) -> Result<Vec<Ingredient>, ServiceError> {
    Ok(repo.list_ingredients()?)
}

pub fn get_ingredient<R: Repository>(
    repo: &R,
    id: IngredientId,
) -> Result<Ingredient, ServiceError> {
    Ok(repo
        .find_ingredient(id)?
        .ok_or(NotFoundError::UnknownIngredient(id))?)
}

/// Keeps the ingredients whose name starts with `prefix`, ignoring case.
/// The catalog order is preserved.
pub fn search(catalog: Vec<Ingredient>, prefix: Option<&str>) -> Vec<Ingredient> {
    let prefix = match prefix.map(str::trim) {
        Some(prefix) if !prefix.is_empty() => prefix.to_lowercase(),
        _ => return catalog,
    };
    catalog
        .into_iter()
        .filter(|ingredient| ingredient.name.to_lowercase().starts_with(&prefix))
        .collect()
}

/// Reads `name,measurement_unit` records (with a header row). Rows with a
/// blank name are skipped with a warning.
pub fn read_ingredient_csv<R: io::Read>(source: R) -> Result<Vec<NewIngredient>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut items = Vec::new();
    for (line, record) in reader.deserialize::<NewIngredient>().enumerate() {
        let item = record?;
        if item.name.is_empty() {
            warn!("skipping ingredient row {} without a name", line + 2);
            continue;
        }
        items.push(item);
    }
    Ok(items)
}

pub fn import_ingredients<R: Repository>(
    repo: &R,
    items: &[NewIngredient],
) -> Result<usize, ServiceError> {
    let inserted = repo.insert_ingredients(items)?;
    info!("imported {} ingredients", inserted);
    Ok(inserted)
}
