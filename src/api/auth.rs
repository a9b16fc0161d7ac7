use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::client::ApiClient;
use super::paths;
use crate::error::{ApiError, ValidationErrors};
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    #[serde(rename = "collegeID")]
    pub college_id: String,
    pub password: String,
}

impl RegisterForm {
    /// Copies the form with surrounding whitespace removed from every field
    /// except the password.
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            college_id: self.college_id.trim().to_string(),
            password: self.password.clone(),
        }
    }

    pub fn validate(&self, allowed_domains: &[String]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        }
        let email = self.email.trim();
        if email.is_empty() {
            errors.push("email", "Email is required");
        } else if !is_college_email(email, allowed_domains) {
            let message = if allowed_domains.is_empty() {
                "Invalid email address".to_string()
            } else {
                format!("Must use {} email address", allowed_domains.join(" or "))
            };
            errors.push("email", message);
        }
        if self.college_id.trim().is_empty() {
            errors.push("collegeID", "College ID is required");
        }
        check_password(&self.password, &mut errors);
        errors.into_result()
    }
}

pub(crate) fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.is_empty() {
        errors.push("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

/// `local@domain` where the local part uses the usual mailbox characters and
/// the domain is one of `allowed_domains` (any domain when the list is empty).
pub fn is_college_email(email: &str, allowed_domains: &[String]) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    if !local_ok || domain.is_empty() {
        return false;
    }
    if allowed_domains.is_empty() {
        return domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.');
    }
    allowed_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
}

pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
    client
        .post(paths::AUTH_LOGIN, &json!({ "email": email, "password": password }))
        .await
}

pub async fn register(client: &ApiClient, form: &RegisterForm) -> Result<AuthResponse, ApiError> {
    client.post(paths::AUTH_REGISTER, form).await
}

pub async fn current_user(client: &ApiClient) -> Result<User, ApiError> {
    let envelope: UserEnvelope = client.get(paths::AUTH_ME, Vec::new()).await?;
    Ok(envelope.user)
}

pub async fn logout(client: &ApiClient) -> Result<(), ApiError> {
    let _: IgnoredAny = client.get(paths::AUTH_LOGOUT, Vec::new()).await?;
    Ok(())
}

pub async fn forgot_password(client: &ApiClient, email: &str) -> Result<(), ApiError> {
    let _: IgnoredAny = client
        .post(paths::AUTH_FORGOT_PASSWORD, &json!({ "email": email }))
        .await?;
    Ok(())
}

pub async fn reset_password(
    client: &ApiClient,
    reset_token: &str,
    password: &str,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    check_password(password, &mut errors);
    errors.into_result()?;

    let _: IgnoredAny = client
        .put(
            &paths::reset_password(reset_token)?,
            Some(&json!({ "password": password })),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn domains() -> Vec<String> {
        vec!["geu.ac.in".to_string(), "gehu.ac.in".to_string()]
    }

    fn form() -> RegisterForm {
        RegisterForm {
            name: "Asha Rawat".to_string(),
            email: "asha.rawat@geu.ac.in".to_string(),
            college_id: "GEU2021-114".to_string(),
            password: "secret1".to_string(),
        }
    }

    #[rstest]
    #[case("asha@geu.ac.in", true)]
    #[case("ASHA+rides@GEHU.AC.IN", true)]
    #[case("asha@gmail.com", false)]
    #[case("asha geu@geu.ac.in", false)]
    #[case("@geu.ac.in", false)]
    #[case("asha", false)]
    fn college_email_rules(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(is_college_email(email, &domains()), ok);
    }

    #[test]
    fn open_domain_list_still_needs_a_dotted_domain() {
        assert!(is_college_email("asha@example.edu", &[]));
        assert!(!is_college_email("asha@localhost", &[]));
    }

    #[test]
    fn valid_form_passes() {
        assert!(form().validate(&domains()).is_ok());
    }

    #[test]
    fn each_problem_is_reported_against_its_field() {
        let bad = RegisterForm {
            name: "  ".to_string(),
            email: "asha@gmail.com".to_string(),
            college_id: String::new(),
            password: "123".to_string(),
        };
        let errors = bad.validate(&domains()).unwrap_err();
        assert_eq!(errors.for_field("name"), Some("Name is required"));
        assert_eq!(
            errors.for_field("email"),
            Some("Must use geu.ac.in or gehu.ac.in email address")
        );
        assert_eq!(errors.for_field("collegeID"), Some("College ID is required"));
        assert_eq!(
            errors.for_field("password"),
            Some("Password must be at least 6 characters")
        );
    }

    #[test]
    fn register_form_uses_backend_field_names() {
        let value = serde_json::to_value(form()).unwrap();
        assert_eq!(value["collegeID"], "GEU2021-114");
        assert!(value.get("college_id").is_none());
    }
}
