use serde::{Deserialize, Serialize};

use crate::validation::{
    normalize_document_number, validate_document_number, validate_email,
    validate_password_match, ValidationError,
};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(())
    }
}

/// Successful `/auth/login` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id", alias = "id")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "idCompany")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    // Backend sends additional profile fields; keep them so the stored record round-trips
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// Sign-up form as entered by the user
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub document_number: String,
    pub password: String,
    pub confirm_password: String,
    pub company_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistrationRequest {
    name: String,
    email: String,
    document_number: String,
    password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<String>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("Name"));
        }
        validate_email(&self.email)?;
        validate_document_number(&self.document_number)?;
        validate_password_match(&self.password, &self.confirm_password)?;
        Ok(())
    }

    pub(crate) fn to_request(&self) -> RegistrationRequest {
        RegistrationRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            document_number: normalize_document_number(&self.document_number),
            password: self.password.clone(),
            company_id: self.company_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> RegistrationForm {
        RegistrationForm {
            name: "Ana Ruiz".to_string(),
            email: "ana@finca.org".to_string(),
            document_number: "10.234.567".to_string(),
            password: "tomate42".to_string(),
            confirm_password: "tomate42".to_string(),
            company_id: None,
        }
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"user": {"uid": "u-1", "email": "ana@finca.org", "companyId": "c-9", "idToken": "jwt", "role": "grower"}, "token": "tok"}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert_eq!(resp.token, "tok");
        assert_eq!(resp.user.uid, "u-1");
        assert_eq!(resp.user.company_id.as_deref(), Some("c-9"));
        assert_eq!(resp.user.id_token.as_deref(), Some("jwt"));
        assert_eq!(resp.user.extra.get("role"), Some(&serde_json::json!("grower")));
        assert_eq!(resp.user.display_name(), "ana@finca.org");
    }

    #[test]
    fn test_login_request_validation() {
        assert!(LoginRequest::new(" ana@finca.org ", "pw").validate().is_ok());
        assert_eq!(
            LoginRequest::new("ana", "pw").validate(),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            LoginRequest::new("ana@finca.org", "").validate(),
            Err(ValidationError::Required("Password"))
        );
    }

    #[test]
    fn test_registration_form_validation() {
        assert!(valid_form().validate().is_ok());

        let mut form = valid_form();
        form.confirm_password = "tomate43".to_string();
        assert_eq!(form.validate(), Err(ValidationError::PasswordMismatch));

        let mut form = valid_form();
        form.name = "  ".to_string();
        assert_eq!(form.validate(), Err(ValidationError::Required("Name")));
    }

    #[test]
    fn test_registration_request_normalizes_document() {
        let request = serde_json::to_value(valid_form().to_request()).unwrap();
        assert_eq!(request["documentNumber"], "10234567");
        assert!(request.get("companyId").is_none());
    }
}
