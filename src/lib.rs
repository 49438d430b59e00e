//! Recipe sharing backend: recipes with tags and ingredients, favorites,
//! shopping carts, author subscriptions and a downloadable shopping list.

#[macro_use]
extern crate diesel;

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod memory;
pub mod models;
pub mod query;
pub mod recipes;
pub mod repository;
pub mod schema;
pub mod shopping_list;
pub mod subscriptions;
pub mod toggle;
pub mod validator;
