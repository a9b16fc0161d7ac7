//! The signed-in session.
//!
//! `Session` is the only writer of [`SessionState`]. Everything else reads
//! it through [`Session::subscribe`]; mutating methods take `&mut self`, so
//! a second writer cannot exist.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::auth::{self, RegisterForm};
use crate::api::users::{self, ProfileUpdate};
use crate::api::ApiClient;
use crate::error::{ApiError, ValidationErrors};
use crate::models::User;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub loading: bool,
}

impl Default for SessionState {
    /// Nothing is known until the bootstrap call returns.
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }
}

/// What a failed auth operation hands back to the screen that called it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
    /// Set when the backend believes an account already exists.
    pub suggest_login: bool,
    pub duplicate_type: Option<String>,
    pub field_errors: ValidationErrors,
}

impl AuthFailure {
    fn from_validation(errors: ValidationErrors) -> Self {
        Self {
            message: errors
                .first_message()
                .unwrap_or("Invalid input")
                .to_string(),
            field_errors: errors,
            ..Self::default()
        }
    }

    fn from_api(error: &ApiError, default: &str) -> Self {
        let field_errors = match error {
            ApiError::Validation(errors) => errors.clone(),
            other => other
                .payload()
                .and_then(|p| p.field_errors())
                .unwrap_or_default(),
        };
        let message = field_errors
            .first_message()
            .map(str::to_string)
            .unwrap_or_else(|| error.user_message(default));
        let (suggest_login, duplicate_type) = error
            .payload()
            .map(|p| (p.suggest_login, p.duplicate_type.clone()))
            .unwrap_or((false, None));
        Self {
            message,
            suggest_login,
            duplicate_type,
            field_errors,
        }
    }
}

pub struct Session {
    client: Arc<ApiClient>,
    state: watch::Sender<SessionState>,
    allowed_email_domains: Vec<String>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>, allowed_email_domains: Vec<String>) -> Self {
        Self {
            client,
            state: watch::Sender::new(SessionState::default()),
            allowed_email_domains,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    /// Asks the backend who we are, using whatever cookie or token survived.
    pub async fn bootstrap(&mut self) {
        self.set_loading(true);
        match auth::current_user(&self.client).await {
            Ok(user) => {
                info!("Session restored for {}", user.email);
                self.sign_in(user);
            }
            Err(e) if e.is_unauthorized() => {
                // Being logged out is a normal state, not an application error.
                debug!("No active session");
                self.clear_local();
            }
            Err(ApiError::Rejected { status, .. }) if (200..300).contains(&status) => {
                debug!("Backend reported no current user");
                self.clear_local();
            }
            Err(e) => {
                error!("Error loading user: {}", e);
                self.clear_local();
            }
        }
        self.set_loading(false);
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthFailure> {
        self.set_loading(true);
        let outcome = match auth::login(&self.client, email.trim(), password).await {
            Ok(response) => {
                if let Some(token) = &response.token {
                    self.client.tokens().set(token);
                }
                self.client.reset_login_required();
                info!("Logged in as {}", response.user.email);
                self.sign_in(response.user.clone());
                Ok(response.user)
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                let default = match &e {
                    ApiError::Rejected { status, .. } if (200..300).contains(status) => {
                        "Login failed"
                    }
                    _ => "An error occurred during login",
                };
                Err(AuthFailure::from_api(&e, default))
            }
        };
        self.set_loading(false);
        outcome
    }

    pub async fn register(&mut self, form: &RegisterForm) -> Result<User, AuthFailure> {
        let form = form.trimmed();
        form.validate(&self.allowed_email_domains)
            .map_err(AuthFailure::from_validation)?;

        match auth::register(&self.client, &form).await {
            Ok(response) => {
                match &response.token {
                    Some(token) => self.client.tokens().set(token),
                    None => warn!("Registration succeeded without a session token"),
                }
                self.client.reset_login_required();
                info!("Registered {}", response.user.email);
                self.sign_in(response.user.clone());
                Ok(response.user)
            }
            Err(e) => {
                warn!("Registration failed: {}", e);
                Err(AuthFailure::from_api(&e, "Registration failed"))
            }
        }
    }

    /// Always ends signed out, whatever the backend says.
    pub async fn logout(&mut self) {
        if let Err(e) = auth::logout(&self.client).await {
            warn!("Logout request failed: {}", e);
        }
        self.clear_local();
        self.client.reset_login_required();
        info!("Logged out");
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User, AuthFailure> {
        let cleaned = update.normalized().map_err(AuthFailure::from_validation)?;
        debug!("Updating profile fields: {:?}", cleaned);

        match users::update_profile(&self.client, &cleaned).await {
            Ok(user) => {
                self.state.send_modify(|s| s.user = Some(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!("Profile update failed: {}", e);
                self.absorb(&e);
                Err(AuthFailure::from_api(
                    &e,
                    "An error occurred while updating profile",
                ))
            }
        }
    }

    /// Re-reads the profile, e.g. after points changed server-side.
    pub async fn refresh_user(&mut self) -> Result<User, ApiError> {
        match users::get_profile(&self.client).await {
            Ok(user) => {
                self.state.send_modify(|s| s.user = Some(user.clone()));
                Ok(user)
            }
            Err(e) => {
                self.absorb(&e);
                Err(e)
            }
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthFailure> {
        auth::forgot_password(&self.client, email.trim())
            .await
            .map_err(|e| AuthFailure::from_api(&e, "Failed to send reset email"))
    }

    /// Resets the password, then picks up the session the backend opens.
    pub async fn reset_password(
        &mut self,
        reset_token: &str,
        password: &str,
    ) -> Result<(), AuthFailure> {
        auth::reset_password(&self.client, reset_token, password)
            .await
            .map_err(|e| AuthFailure::from_api(&e, "Failed to reset password"))?;
        self.bootstrap().await;
        Ok(())
    }

    /// Drops the local session after the backend refused it elsewhere.
    pub fn expire(&mut self) {
        if self.is_authenticated() {
            info!("Session expired; login required");
        }
        self.clear_local();
    }

    /// Applies a login-required signal raised by any call since the last
    /// check. Returns true when the session was expired because of it.
    pub fn sync_login_required(&mut self) -> bool {
        if self.client.is_login_required() && self.is_authenticated() {
            self.expire();
            return true;
        }
        false
    }

    fn absorb(&mut self, error: &ApiError) {
        if matches!(error, ApiError::Unauthorized) {
            self.expire();
        }
    }

    fn sign_in(&mut self, user: User) {
        self.state.send_modify(|s| {
            s.user = Some(user);
            s.is_authenticated = true;
        });
    }

    fn clear_local(&mut self) {
        self.client.tokens().clear();
        self.state.send_modify(|s| {
            s.user = None;
            s.is_authenticated = false;
        });
    }

    fn set_loading(&mut self, loading: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }
}
