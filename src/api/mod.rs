//! Typed accessors for the CampusCruz REST backend.
//!
//! Each function maps one endpoint. Errors come back as the backend sent
//! them; nothing here retries or deduplicates.

pub mod admin;
pub mod auth;
pub mod client;
pub mod paths;
pub mod rides;
pub mod transport;
pub mod users;

pub use client::ApiClient;
pub use transport::{HttpTransport, Method, Transport};
