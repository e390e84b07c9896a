//! REST API client module for the crop diagnostic backend.
//!
//! This module provides the `ApiClient` for authenticating, sending crop
//! photos for diagnosis, and paging through chat history, plus the
//! `SessionGuard` that signs the user out when the server rejects the
//! session.
//!
//! Requests carry the session token in a `token` header and the tenant in
//! `id-company`, both read from storage for every call.

pub mod client;
pub mod error;
pub mod guard;
pub mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use guard::{
    Navigator, RedirectToLogin, Route, SessionExpiredHandler, SessionGuard, SessionPolicy,
};
pub use request::{RequestBody, RequestDescriptor};
