//! Data models for the diagnostic backend.
//!
//! - `LoginRequest`, `LoginResponse`, `UserProfile`, `RegistrationForm`: account flows
//! - `ChatPage`, `ChatSummary`, `Pagination`: chat history listing
//! - `DiagnosisResponse`, `ImageUpload`: sending a crop photo for diagnosis

pub mod chat;
pub mod user;

pub use chat::{ChatPage, ChatSummary, DiagnosisResponse, IaResponse, ImageUpload, Pagination};
pub use user::{LoginRequest, LoginResponse, RegistrationForm, UserProfile};
