use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::paths;
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
use crate::config::AppConfig;
use crate::error::{ApiError, ErrorPayload};
use crate::token::TokenStore;

const UNAUTHORIZED: u16 = 401;
/// Cookie the backend uses for the login session.
pub const SESSION_COOKIE: &str = "token";

/// Shared entry point for every backend call.
///
/// Attaches the stored bearer token, unwraps the `{ success, ... }`
/// envelope, and reacts to 401 outside the auth endpoints by dropping the
/// token and raising the login-required signal.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: TokenStore,
    login_required: watch::Sender<bool>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: TokenStore) -> Self {
        Self {
            transport,
            tokens,
            login_required: watch::Sender::new(false),
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.api_url.clone(), config.request_timeout)?;
        let tokens = match &config.token_path {
            Some(path) => TokenStore::persistent(path.clone()),
            None => TokenStore::in_memory(),
        };
        Ok(Self::new(Arc::new(transport), tokens))
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Flips to `true` whenever the backend answers 401.
    pub fn login_required(&self) -> watch::Receiver<bool> {
        self.login_required.subscribe()
    }

    pub fn is_login_required(&self) -> bool {
        *self.login_required.borrow()
    }

    pub(crate) fn reset_login_required(&self) {
        self.login_required.send_replace(false);
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.execute(Method::Get, path, query, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        self.execute(Method::Post, path, Vec::new(), Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let body = body.map(encode).transpose()?;
        self.execute(Method::Put, path, Vec::new(), body).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            query,
            body,
            bearer: self.tokens.get(),
        };

        let response = self.transport.send(request).await?;
        debug!("{} {} -> {}", method, path, response.status);

        // The cookie jar dies with the process; the token store does not.
        if let Some(token) = session_cookie(&response.set_cookies) {
            debug!("Captured session cookie from {} {}", method, path);
            self.tokens.set(&token);
        }

        // Auth endpoints answer 401 for bad credentials or no session; their
        // callers decide what that means.
        if response.status == UNAUTHORIZED && !path.starts_with(paths::AUTH_PREFIX) {
            self.tokens.clear();
            if !self.login_required.send_replace(true) {
                warn!("Backend rejected the session on {} {}; login required", method, path);
            }
            return Err(ApiError::Unauthorized);
        }

        decode_envelope(response)
    }
}

/// Value of the session cookie among `Set-Cookie` headers, if one was set.
/// An emptied cookie (the backend's way of clearing it) yields nothing.
fn session_cookie(set_cookies: &[String]) -> Option<String> {
    set_cookies.iter().find_map(|header| {
        let pair = header.split(';').next()?;
        let (name, value) = pair.split_once('=')?;
        let value = value.trim().trim_matches('"');
        (name.trim() == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Documents serialized with virtuals carry `id` next to `_id`; keep `_id`
/// so every document has a single identifier.
fn drop_virtual_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.contains_key("_id") {
                map.remove("id");
            }
            map.values_mut().for_each(drop_virtual_ids);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_virtual_ids),
        _ => {}
    }
}

fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode {
        message: format!("could not encode request body: {}", e),
    })
}

fn decode_envelope<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
    let ApiResponse { status, body, .. } = response;
    if !(200..300).contains(&status) {
        return Err(ApiError::Rejected {
            status,
            payload: ErrorPayload::from_body(&body),
        });
    }

    let mut value: Value = serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
        message: format!("invalid JSON: {}", e),
    })?;
    drop_virtual_ids(&mut value);
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Rejected {
            status,
            payload: ErrorPayload::from_body(&body),
        });
    }

    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: u32,
    }

    fn client_with(fake: &Arc<FakeTransport>) -> ApiClient {
        ApiClient::new(fake.clone(), TokenStore::in_memory())
    }

    #[tokio::test]
    async fn attaches_stored_token_as_bearer() {
        let fake = FakeTransport::new();
        fake.respond(Method::Get, "/api/echo", 200, json!({"success": true, "value": 7}));
        let client = client_with(&fake);
        client.tokens().set("jwt-abc");

        let echo: Echo = client.get("/api/echo", Vec::new()).await.unwrap();

        assert_eq!(echo.value, 7);
        assert_eq!(fake.requests()[0].bearer.as_deref(), Some("jwt-abc"));
    }

    #[tokio::test]
    async fn unauthorized_clears_token_and_raises_login_required() {
        let fake = FakeTransport::new();
        fake.respond(Method::Get, "/api/rides", 401, json!({"success": false, "message": "Not authorized"}));
        let client = client_with(&fake);
        client.tokens().set("stale");
        let mut signal = client.login_required();

        let result: Result<Echo, _> = client.get("/api/rides", Vec::new()).await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(client.tokens().get(), None);
        assert!(signal.has_changed().unwrap());
        assert!(*signal.borrow_and_update());
        assert!(client.is_login_required());
    }

    #[tokio::test]
    async fn unauthorized_on_auth_endpoint_leaves_session_alone() {
        let fake = FakeTransport::new();
        fake.respond(Method::Post, "/api/auth/login", 401, json!({"success": false, "message": "Invalid credentials"}));
        let client = client_with(&fake);
        client.tokens().set("still-valid");

        let result: Result<Echo, _> = client
            .post("/api/auth/login", &json!({"email": "a@geu.ac.in", "password": "wrong!"}))
            .await;

        assert!(matches!(result, Err(ApiError::Rejected { status: 401, .. })));
        assert_eq!(client.tokens().get().as_deref(), Some("still-valid"));
        assert!(!client.is_login_required());
    }

    #[tokio::test]
    async fn error_payload_is_propagated_unchanged() {
        let fake = FakeTransport::new();
        let body = json!({"success": false, "message": "No seats available", "code": "RIDE_FULL"});
        fake.respond(Method::Post, "/api/rides/r1/join", 400, body.clone());
        let client = client_with(&fake);

        let result: Result<Echo, _> = client
            .post("/api/rides/r1/join", &json!({"pickupLocation": "Gate"}))
            .await;

        match result {
            Err(ApiError::Rejected { status, payload }) => {
                assert_eq!(status, 400);
                assert_eq!(payload.raw, body);
                assert_eq!(payload.message.as_deref(), Some("No seats available"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(!client.is_login_required());
    }

    #[tokio::test]
    async fn success_false_in_2xx_is_a_rejection() {
        let fake = FakeTransport::new();
        fake.respond(Method::Get, "/api/echo", 200, json!({"success": false, "message": "Failed"}));
        let client = client_with(&fake);

        let result: Result<Echo, _> = client.get("/api/echo", Vec::new()).await;
        assert!(matches!(result, Err(ApiError::Rejected { status: 200, .. })));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let fake = FakeTransport::new();
        fake.respond(Method::Get, "/api/echo", 200, json!({"success": true}));
        let client = client_with(&fake);

        let result: Result<Echo, _> = client.get("/api/echo", Vec::new()).await;
        assert!(matches!(result, Err(ApiError::Decode { .. })));
    }

    #[tokio::test]
    async fn network_failure_passes_through_without_retry() {
        let fake = FakeTransport::new();
        fake.fail(Method::Get, "/api/echo", "connection refused");
        let client = client_with(&fake);

        let result: Result<Echo, _> = client.get("/api/echo", Vec::new()).await;
        assert!(matches!(result, Err(ApiError::Network { .. })));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn session_cookie_is_kept_in_the_token_store() {
        let fake = FakeTransport::new();
        fake.respond_with_cookie(
            Method::Post,
            "/api/auth/login",
            200,
            json!({"success": true, "value": 1}),
            "token=jwt-cookie; Path=/; HttpOnly; SameSite=None; Secure",
        );
        let client = client_with(&fake);

        let _: Echo = client
            .post("/api/auth/login", &json!({"email": "a@geu.ac.in", "password": "secret1"}))
            .await
            .unwrap();

        assert_eq!(client.tokens().get().as_deref(), Some("jwt-cookie"));
    }

    #[test]
    fn only_a_non_empty_session_cookie_counts() {
        let headers = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        assert_eq!(
            session_cookie(&headers(&["theme=dark", "token=abc; Path=/"])).as_deref(),
            Some("abc")
        );
        assert_eq!(
            session_cookie(&headers(&["token=; expires=Thu, 01 Jan 1970 00:00:00 GMT"])),
            None
        );
        assert_eq!(session_cookie(&headers(&["tokenized=abc"])), None);
    }

    #[tokio::test]
    async fn documents_with_both_id_keys_still_decode() {
        #[derive(Debug, Deserialize)]
        struct Rides {
            rides: Vec<crate::models::Ride>,
        }

        let fake = FakeTransport::new();
        let mut ride = crate::test_support::fixtures::ride_json("r1", "d1", "scheduled", 2, 4);
        ride["id"] = json!("r1");
        ride["driver"]["id"] = json!("d1");
        fake.respond(Method::Get, "/api/rides", 200, json!({"success": true, "rides": [ride]}));
        let client = client_with(&fake);

        let decoded: Rides = client.get("/api/rides", Vec::new()).await.unwrap();

        assert_eq!(decoded.rides[0].id, "r1");
        assert_eq!(decoded.rides[0].driver.id(), "d1");
    }
}
