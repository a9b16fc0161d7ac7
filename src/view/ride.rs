use std::fmt;

use crate::models::{PassengerEntry, PassengerStatus, Ride, RideStatus, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideAction {
    Complete,
    Review { passenger_id: String },
    Join,
    Rate,
}

/// Why the current user cannot act on a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    SignInRequired,
    ReadOnly,
    NotAcceptingPassengers,
    NoSeatsLeft,
    AlreadyRequested,
    AlreadyRated,
}

impl Unavailable {
    pub fn reason(self) -> &'static str {
        match self {
            Unavailable::SignInRequired => "Please log in to join this ride.",
            Unavailable::ReadOnly => "This ride can no longer be changed.",
            Unavailable::NotAcceptingPassengers => "This ride is no longer accepting passengers.",
            Unavailable::NoSeatsLeft => "No seats available on this ride.",
            Unavailable::AlreadyRequested => "You have already requested to join this ride.",
            Unavailable::AlreadyRated => "You have already rated this ride.",
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Everything a screen needs to decide what to offer for one ride.
///
/// Derived on demand from the ride and the signed-in user; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RideView<'a> {
    pub is_driver: bool,
    pub passenger: Option<&'a PassengerEntry>,
    pub pending_count: usize,
    pub actions: Vec<RideAction>,
    pub blocked: Option<Unavailable>,
}

impl<'a> RideView<'a> {
    pub fn derive(ride: &'a Ride, user: Option<&User>) -> Self {
        let pending_count = ride.pending_count();
        let Some(user) = user else {
            return Self {
                is_driver: false,
                passenger: None,
                pending_count,
                actions: Vec::new(),
                blocked: Some(Unavailable::SignInRequired),
            };
        };

        let is_driver = ride.driver.is(user);
        let passenger = if is_driver {
            None
        } else {
            ride.passenger_for(&user.id)
        };
        let scheduled = ride.status == RideStatus::Scheduled;

        let mut actions = Vec::new();
        let mut blocked = None;
        if is_driver {
            if scheduled {
                actions.push(RideAction::Complete);
                actions.extend(
                    ride.passengers
                        .iter()
                        .filter(|p| p.status == PassengerStatus::Pending)
                        .map(|p| RideAction::Review {
                            passenger_id: p.user.id().to_string(),
                        }),
                );
            } else {
                blocked = Some(Unavailable::ReadOnly);
            }
        } else {
            match passenger {
                None if !scheduled => blocked = Some(Unavailable::NotAcceptingPassengers),
                None if ride.available_seats == 0 => blocked = Some(Unavailable::NoSeatsLeft),
                None => actions.push(RideAction::Join),
                Some(entry) if entry.status == PassengerStatus::Completed => {
                    if entry.has_rated {
                        blocked = Some(Unavailable::AlreadyRated);
                    } else {
                        actions.push(RideAction::Rate);
                    }
                }
                Some(_) => blocked = Some(Unavailable::AlreadyRequested),
            }
        }

        Self {
            is_driver,
            passenger,
            pending_count,
            actions,
            blocked,
        }
    }

    /// "Request Status: Pending" and friends, for a user with an entry.
    pub fn request_status(&self) -> Option<String> {
        self.passenger
            .map(|entry| format!("Request Status: {}", entry.status.label()))
    }

    pub fn can_join(&self) -> bool {
        self.actions.contains(&RideAction::Join)
    }

    pub fn can_rate(&self) -> bool {
        self.actions.contains(&RideAction::Rate)
    }

    pub fn can_complete(&self) -> bool {
        self.actions.contains(&RideAction::Complete)
    }

    pub fn can_review(&self, passenger_id: &str) -> bool {
        self.actions.iter().any(|action| {
            matches!(action, RideAction::Review { passenger_id: id } if id == passenger_id)
        })
    }
}
