pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod session;
pub mod token;
pub mod view;

#[cfg(test)]
pub mod test_support;
