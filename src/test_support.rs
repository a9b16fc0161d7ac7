//! Scripted in-memory backend for unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::api::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::ApiError;

#[derive(Clone)]
enum Scripted {
    Respond(ApiResponse),
    Fail(String),
}

/// Answers requests from per-route queues. The last queued answer for a
/// route repeats; unscripted routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.push(method, path, Scripted::Respond(response(status, &body, Vec::new())));
    }

    /// Like `respond`, with one `Set-Cookie` header on the answer.
    pub fn respond_with_cookie(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: Value,
        set_cookie: &str,
    ) {
        let answer = response(status, &body, vec![set_cookie.to_string()]);
        self.push(method, path, Scripted::Respond(answer));
    }

    /// Holds every answer back for `delay` of (tokio) time.
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = Some(delay);
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Scripted::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn push(&self, method: Method, path: &str, answer: Scripted) {
        self.routes
            .lock()
            .expect("routes lock")
            .entry((method, path.to_string()))
            .or_default()
            .push_back(answer);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let key = (request.method, request.path.clone());
        self.requests.lock().expect("requests lock").push(request);

        let delay = *self.delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let answer = {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match answer {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(ApiError::Network { message }),
            None => Ok(response(
                404,
                &json!({"success": false, "message": "Route not found"}),
                Vec::new(),
            )),
        }
    }
}

fn response(status: u16, body: &Value, set_cookies: Vec<String>) -> ApiResponse {
    ApiResponse {
        status,
        body: serde_json::to_vec(body).expect("test body serializes"),
        set_cookies,
    }
}

/// Records every tracing event emitted on the current thread while installed.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor::default();
        event.record(&mut message);
        self.events
            .lock()
            .expect("events lock")
            .push((*event.metadata().level(), message.0));
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

pub mod fixtures {
    use serde_json::{json, Value};

    use crate::models::{Ride, User};

    pub fn user_json(id: &str, name: &str) -> Value {
        json!({
            "_id": id,
            "name": name,
            "email": format!("{}@geu.ac.in", name.to_lowercase()),
            "collegeID": format!("GEU-{}", id),
            "role": "user",
            "points": 10,
            "joinedDate": "2024-08-01T09:30:00.000Z"
        })
    }

    pub fn user(id: &str, name: &str) -> User {
        serde_json::from_value(user_json(id, name)).expect("fixture user parses")
    }

    pub fn ride_json(id: &str, driver_id: &str, status: &str, available: u32, total: u32) -> Value {
        assert!(available <= total, "fixtures keep available seats within total");
        json!({
            "_id": id,
            "startLocation": "GEU Main Gate",
            "endLocation": "ISBT Dehradun",
            "route": "via Clement Town",
            "departureTime": "2026-11-02T08:15:00.000Z",
            "totalSeats": total,
            "availableSeats": available,
            "price": 50,
            "additionalNotes": "Small bags only",
            "status": status,
            "driver": {"_id": driver_id, "name": "Driver", "email": "driver@geu.ac.in"},
            "passengers": []
        })
    }

    pub fn ride(id: &str, driver_id: &str, status: &str, available: u32, total: u32) -> Ride {
        serde_json::from_value(ride_json(id, driver_id, status, available, total))
            .expect("fixture ride parses")
    }

    pub fn with_passenger(mut ride: Value, user_id: &str, status: &str, has_rated: bool) -> Value {
        let entry = json!({
            "user": {"_id": user_id, "name": "Passenger"},
            "pickupLocation": "Hostel B",
            "status": status,
            "requestedAt": "2026-11-01T10:00:00.000Z",
            "hasRated": has_rated
        });
        if let Some(passengers) = ride["passengers"].as_array_mut() {
            passengers.push(entry);
        }
        ride
    }
}
