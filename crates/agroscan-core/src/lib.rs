//! Core library for agroscan, a crop diagnostic assistant client.
//!
//! - `api`: request client, session guard, navigation hooks
//! - `auth`: session persistence and storage backends
//! - `models`: wire types for accounts, chats, and diagnoses
//! - `pagination`: cursor pager for chat history
//! - `validation`: client-side form checks
//! - `config`: endpoint, timeout, and session policy settings

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod pagination;
pub mod validation;

pub use api::{ApiClient, ApiError, Navigator, RedirectToLogin, Route, SessionPolicy};
pub use auth::{FileStore, KeyValueStore, KeyringStore, MemoryStore, Session, StorageKey};
pub use config::Config;
pub use pagination::{ChatHistory, CursorPager, Page, PageSource};
