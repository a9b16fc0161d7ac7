pub mod notification;
pub mod ride;
pub mod stats;
pub mod user;

pub use notification::{EntityRef, Notification};
pub use ride::{PassengerEntry, PassengerStatus, Ride, RideStatus};
pub use stats::{AdminStats, RideStats};
pub use user::{User, UserRef, UserRole, UserSummary};
