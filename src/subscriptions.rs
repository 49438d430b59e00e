use log::info;

use crate::{
    dto::{AuthorRead, RecipeShort, SubscriptionRead},
    error::{NotFoundError, ServiceError, ValidationError},
    models::{PageRequest, Paged, User, UserId},
    repository::{RepoResult, Repository},
    toggle::{self, Toggle},
};

/// `follower` following `author`.
pub struct SubscriptionToggle<'a, R> {
    pub repo: &'a R,
    pub follower: UserId,
    pub author: UserId,
}

impl<R: Repository> Toggle for SubscriptionToggle<'_, R> {
    fn insert(&self) -> RepoResult<()> {
        self.repo.add_subscription(self.follower, self.author)
    }

    fn delete(&self) -> RepoResult<bool> {
        self.repo.remove_subscription(self.follower, self.author)
    }

    fn missing_target(&self) -> NotFoundError {
        NotFoundError::UnknownUser(self.author)
    }
}

fn find_author<R: Repository>(repo: &R, author: UserId) -> Result<User, ServiceError> {
    Ok(repo
        .find_user(author)?
        .ok_or(NotFoundError::UnknownUser(author))?)
}

pub fn subscribe<R: Repository>(
    repo: &R,
    follower: UserId,
    author: UserId,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionRead, ServiceError> {
    if follower == author {
        return Err(ValidationError::SelfSubscription.into());
    }
    let user = find_author(repo, author)?;
    toggle::add(&SubscriptionToggle {
        repo,
        follower,
        author,
    })?;
    info!("user {} subscribed to user {}", follower, author);
    describe(repo, user, recipes_limit)
}

pub fn unsubscribe<R: Repository>(
    repo: &R,
    follower: UserId,
    author: UserId,
) -> Result<(), ServiceError> {
    find_author(repo, author)?;
    toggle::remove(&SubscriptionToggle {
        repo,
        follower,
        author,
    })?;
    info!("user {} unsubscribed from user {}", follower, author);
    Ok(())
}

pub fn list_subscriptions<R: Repository>(
    repo: &R,
    follower: UserId,
    page: PageRequest,
    recipes_limit: Option<i64>,
) -> Result<Paged<SubscriptionRead>, ServiceError> {
    let authors = repo.list_subscriptions(follower, page)?;
    let mut results = Vec::with_capacity(authors.results.len());
    for author in authors.results {
        results.push(describe(repo, author, recipes_limit)?);
    }
    Ok(Paged {
        count: authors.count,
        page: authors.page,
        results,
    })
}

// only ever called for authors the caller follows
fn describe<R: Repository>(
    repo: &R,
    author: User,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionRead, ServiceError> {
    let recipes = repo
        .recipes_by_author(author.id, recipes_limit)?
        .iter()
        .map(RecipeShort::from)
        .collect();
    let recipes_count = repo.count_recipes_by_author(author.id)?;
    Ok(SubscriptionRead {
        author: AuthorRead::new(author, true),
        recipes,
        recipes_count,
    })
}
