//! The add/remove lifecycle shared by favorites, shopping carts and
//! subscriptions.
//!
//! The current state of a pair is never read up front. An add is an insert
//! that the storage unique key rejects when the pair is already present; a
//! remove is a delete that reports whether anything was there. Concurrent
//! toggles of the same pair are therefore serialized by storage.

use log::info;

use crate::{
    dto::RecipeShort,
    error::{ConflictError, NotFoundError, ServiceError, StorageError},
    models::{MarkKind, RecipeId, UserId},
    repository::{RepoResult, Repository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Add,
    Remove,
}

impl ToggleState {
    pub fn apply(self, transition: Transition) -> Result<ToggleState, ServiceError> {
        match (self, transition) {
            (ToggleState::Absent, Transition::Add) => Ok(ToggleState::Present),
            (ToggleState::Present, Transition::Remove) => Ok(ToggleState::Absent),
            (ToggleState::Present, Transition::Add) => Err(ConflictError::AlreadyExists.into()),
            (ToggleState::Absent, Transition::Remove) => Err(NotFoundError::EntryNotFound.into()),
        }
    }
}

/// Storage side of one (owner, target) pair.
pub trait Toggle {
    fn insert(&self) -> RepoResult<()>;
    fn delete(&self) -> RepoResult<bool>;
    /// Reported when storage refuses the insert because the target is gone.
    fn missing_target(&self) -> NotFoundError;
}

pub fn add<T: Toggle>(toggle: &T) -> Result<ToggleState, ServiceError> {
    match toggle.insert() {
        Ok(()) => ToggleState::Absent.apply(Transition::Add),
        Err(StorageError::UniqueViolation) => ToggleState::Present.apply(Transition::Add),
        Err(StorageError::ForeignKeyViolation(_)) => Err(toggle.missing_target().into()),
        Err(err) => Err(err.into()),
    }
}

pub fn remove<T: Toggle>(toggle: &T) -> Result<ToggleState, ServiceError> {
    if toggle.delete()? {
        ToggleState::Present.apply(Transition::Remove)
    } else {
        ToggleState::Absent.apply(Transition::Remove)
    }
}

/// A favorite or cart marker of `user` on `recipe`.
pub struct MarkToggle<'a, R> {
    pub repo: &'a R,
    pub kind: MarkKind,
    pub user: UserId,
    pub recipe: RecipeId,
}

impl<R: Repository> Toggle for MarkToggle<'_, R> {
    fn insert(&self) -> RepoResult<()> {
        self.repo.add_mark(self.kind, self.user, self.recipe)
    }

    fn delete(&self) -> RepoResult<bool> {
        self.repo.remove_mark(self.kind, self.user, self.recipe)
    }

    fn missing_target(&self) -> NotFoundError {
        NotFoundError::UnknownRecipe(self.recipe)
    }
}

/// Puts `recipe` into the user's favorites or shopping cart.
pub fn add_mark<R: Repository>(
    repo: &R,
    kind: MarkKind,
    user: UserId,
    recipe: RecipeId,
) -> Result<RecipeShort, ServiceError> {
    let target = repo
        .find_recipe(recipe)?
        .ok_or(NotFoundError::UnknownRecipe(recipe))?;
    add(&MarkToggle {
        repo,
        kind,
        user,
        recipe,
    })?;
    info!("user {} added recipe {} to {}", user, recipe, kind.label());
    Ok(RecipeShort::from(&target))
}

pub fn remove_mark<R: Repository>(
    repo: &R,
    kind: MarkKind,
    user: UserId,
    recipe: RecipeId,
) -> Result<(), ServiceError> {
    if repo.find_recipe(recipe)?.is_none() {
        return Err(NotFoundError::UnknownRecipe(recipe).into());
    }
    remove(&MarkToggle {
        repo,
        kind,
        user,
        recipe,
    })?;
    info!(
        "user {} removed recipe {} from {}",
        user,
        recipe,
        kind.label()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn transitions() {
        assert_eq!(
            ToggleState::Absent.apply(Transition::Add).unwrap(),
            ToggleState::Present
        );
        assert_eq!(
            ToggleState::Present.apply(Transition::Remove).unwrap(),
            ToggleState::Absent
        );
        assert!(matches!(
            ToggleState::Present.apply(Transition::Add),
            Err(ServiceError::Conflict(ConflictError::AlreadyExists))
        ));
        assert!(matches!(
            ToggleState::Absent.apply(Transition::Remove),
            Err(ServiceError::NotFound(NotFoundError::EntryNotFound))
        ));
    }

    /// Single pair backed by a set, failing like a unique key would.
    struct Pair {
        rows: RefCell<BTreeSet<(i32, i32)>>,
        key: (i32, i32),
    }

    impl Toggle for Pair {
        fn insert(&self) -> RepoResult<()> {
            if self.rows.borrow_mut().insert(self.key) {
                Ok(())
            } else {
                Err(StorageError::UniqueViolation)
            }
        }

        fn delete(&self) -> RepoResult<bool> {
            Ok(self.rows.borrow_mut().remove(&self.key))
        }

        fn missing_target(&self) -> NotFoundError {
            NotFoundError::UnknownRecipe(self.key.1)
        }
    }

    #[test]
    fn round_trip_restores_absent() {
        let pair = Pair {
            rows: RefCell::new(BTreeSet::new()),
            key: (1, 2),
        };

        assert_eq!(add(&pair).unwrap(), ToggleState::Present);
        assert!(matches!(
            add(&pair),
            Err(ServiceError::Conflict(ConflictError::AlreadyExists))
        ));
        assert_eq!(remove(&pair).unwrap(), ToggleState::Absent);
        assert!(matches!(
            remove(&pair),
            Err(ServiceError::NotFound(NotFoundError::EntryNotFound))
        ));
        assert!(pair.rows.borrow().is_empty());
    }
}
