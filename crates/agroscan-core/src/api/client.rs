//! API client for the crop diagnostic backend.
//!
//! Every request goes through `ApiClient::dispatch`, which attaches the
//! session credentials read from storage and hands the outcome to the
//! `SessionGuard` before returning it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::guard::{SessionExpiredHandler, SessionGuard};
use super::request::{path_of, RequestBody, RequestDescriptor};
use super::ApiError;
use crate::auth::{KeyValueStore, Session};
use crate::config::Config;
use crate::models::{
    ChatPage, DiagnosisResponse, ImageUpload, LoginRequest, LoginResponse, RegistrationForm,
};
use crate::pagination::ChatHistory;

#[derive(Debug, Serialize)]
struct ChatQuery<'a> {
    limit: u32,
    #[serde(rename = "lastChatId", skip_serializing_if = "Option::is_none")]
    last_chat_id: Option<&'a str>,
}

/// API client for the diagnostic backend.
/// Clone is cheap - reqwest::Client and the guard are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
    guard: Arc<SessionGuard>,
}

impl ApiClient {
    /// Create the client and register the session guard on it
    pub fn new(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        on_session_expired: Arc<dyn SessionExpiredHandler>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let session = Session::new(store);
        let guard = SessionGuard::new(session.clone(), config.session_policy(), on_session_expired);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            guard: Arc::new(guard),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Verbs =====

    pub async fn get<T, P>(&self, path: &str, params: &P) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::GET, path).params(params)?;
        self.dispatch(request).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::POST, path).body(RequestBody::json(body)?);
        self.dispatch(request).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::PUT, path).body(RequestBody::json(body)?);
        self.dispatch(request).await
    }

    /// DELETE; pass `&()` to send no body
    pub async fn del<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::DELETE, path).body(RequestBody::json(body)?);
        self.dispatch(request).await
    }

    /// POST a multipart form, optionally with a per-call bearer credential
    pub async fn post_multipart<T>(
        &self,
        path: &str,
        form: Form,
        bearer: Option<String>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let request = RequestDescriptor::new(Method::POST, path)
            .body(RequestBody::Multipart(form))
            .bearer(bearer);
        self.dispatch(request).await
    }

    async fn dispatch<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T, ApiError> {
        let outcome = self.execute(request).await;
        self.guard.observe(outcome).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T, ApiError> {
        let credentials = self.session.credentials().await;
        let headers = request.headers(&credentials)?;
        let url = self.url(&request.path);

        debug!(
            method = %request.method,
            url = %url,
            has_token = credentials.token.is_some(),
            has_company = credentials.company_id.is_some(),
            "Sending request"
        );

        let mut builder = self.client.request(request.method, &url).headers(headers);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        Self::parse_body(&url, &text)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Deserialize a response body; an empty body reads as JSON `null`
    fn parse_body<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, ApiError> {
        let parsed = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_str(text)
        };
        parsed.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Account =====

    /// Log in and persist the returned session
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = LoginRequest::new(email, password);
        request.validate()?;

        let login: LoginResponse = self.post("/auth/login", &request).await?;
        self.session
            .save_login(&login)
            .await
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        info!(uid = %login.user.uid, "Login successful");
        Ok(login)
    }

    /// Create an account. The form is validated before anything is sent.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Value, ApiError> {
        form.validate()?;
        self.post("/auth/register", &form.to_request()).await
    }

    /// Explicit logout: local purge only, the backend keeps no session to end
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session
            .clear()
            .await
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
        info!("Logged out");
        Ok(())
    }

    // ===== Chats =====

    /// Fetch one page of a user's chat history
    pub async fn fetch_chats(
        &self,
        uid: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ChatPage, ApiError> {
        let query = ChatQuery {
            limit,
            last_chat_id: cursor,
        };
        self.get(&path_of(&["chats", "users", uid]), &query).await
    }

    /// Send a photo and description for diagnosis; returns the new chat id
    pub async fn send_diagnosis(
        &self,
        uid: &str,
        message: &str,
        image: ImageUpload,
    ) -> Result<String, ApiError> {
        let size = image.bytes.len();
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime_type)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid image type: {}", e)))?;
        let form = Form::new()
            .text("message", message.to_string())
            .part("image", part);

        let id_token = self.session.id_token().await;
        debug!(uid, bytes = size, has_id_token = id_token.is_some(), "Uploading image");

        let response: DiagnosisResponse = self
            .post_multipart(&path_of(&["chats", uid, "message"]), form, id_token)
            .await?;
        Ok(response.ia_response.chat_id)
    }

    pub async fn delete_chat(&self, uid: &str, chat_id: &str) -> Result<(), ApiError> {
        let _: Value = self.del(&path_of(&["chats", uid, chat_id]), &()).await?;
        Ok(())
    }

    /// Pager over a user's chat history, bound to this client
    pub fn chat_history(&self, uid: &str, page_size: u32) -> ChatHistory {
        ChatHistory::for_user(self.clone(), uid, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::guard::{RedirectToLogin, Route};
    use crate::api::Navigator;
    use crate::auth::MemoryStore;

    struct NoopNavigator;

    impl Navigator for NoopNavigator {
        fn push(&self, _route: Route) {}
        fn replace(&self, _route: Route) {}
    }

    fn client(base_url: &str) -> ApiClient {
        let config = Config {
            base_url: base_url.to_string(),
            ..Config::default()
        };
        ApiClient::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(RedirectToLogin::new(Arc::new(NoopNavigator))),
        )
        .unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://localhost:8080/api/");
        assert_eq!(api.base_url(), "http://localhost:8080/api");
        assert_eq!(api.url("/auth/login"), "http://localhost:8080/api/auth/login");
        assert_eq!(api.url("chats/u-1/c-1"), "http://localhost:8080/api/chats/u-1/c-1");
    }

    #[test]
    fn test_parse_body_empty_is_null() {
        let value: Value = ApiClient::parse_body("u", "").unwrap();
        assert_eq!(value, Value::Null);
        assert!(ApiClient::parse_body::<()>("u", "  ").is_ok());
    }

    #[test]
    fn test_parse_body_mismatch() {
        let err = ApiClient::parse_body::<ChatPage>("http://x/chats", "[1,2]").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_chat_query_omits_missing_cursor() {
        let query = ChatQuery {
            limit: 10,
            last_chat_id: None,
        };
        assert_eq!(serde_json::to_value(&query).unwrap(), serde_json::json!({"limit": 10}));
    }
}
