//! Pure derivations from backend records to what a screen may show or offer.

pub mod dashboard;
pub mod ride;

pub use dashboard::{Dashboard, DashboardEntry, Involvement};
pub use ride::{RideAction, RideView, Unavailable};
