use crate::models::{PassengerStatus, Ride, User};

/// Points a driver earns for each passenger who completed the ride.
pub const POINTS_PER_PASSENGER: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Involvement {
    Driver,
    Passenger { has_rated: bool },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardEntry<'a> {
    pub ride: &'a Ride,
    pub involvement: Involvement,
}

impl DashboardEntry<'_> {
    /// One-line footer shown under a past ride.
    pub fn footer(&self) -> Option<String> {
        match self.involvement {
            Involvement::Driver => Some(format!("Points earned: {}", driver_points(self.ride))),
            Involvement::Passenger { has_rated: true } => Some("You rated this ride".to_string()),
            Involvement::Passenger { has_rated: false } => Some("Rate this ride".to_string()),
            Involvement::Other => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard<'a> {
    pub upcoming: Vec<DashboardEntry<'a>>,
    pub past: Vec<DashboardEntry<'a>>,
}

impl<'a> Dashboard<'a> {
    /// Keeps the rides `user` drives or joined. Completed and cancelled rides
    /// are past; everything else is upcoming.
    pub fn build(rides: &'a [Ride], user: &User) -> Self {
        let mut dashboard = Self::default();
        for ride in rides {
            let involvement = involvement(ride, user);
            if involvement == Involvement::Other {
                continue;
            }
            let entry = DashboardEntry { ride, involvement };
            if ride.status.is_past() {
                dashboard.past.push(entry);
            } else {
                dashboard.upcoming.push(entry);
            }
        }
        dashboard
    }
}

pub fn involvement(ride: &Ride, user: &User) -> Involvement {
    if ride.driver.is(user) {
        return Involvement::Driver;
    }
    match ride.passenger_for(&user.id) {
        Some(entry) => Involvement::Passenger {
            has_rated: entry.has_rated,
        },
        None => Involvement::Other,
    }
}

pub fn driver_points(ride: &Ride) -> u32 {
    let completed = ride
        .passengers
        .iter()
        .filter(|p| p.status == PassengerStatus::Completed)
        .count() as u32;
    completed * POINTS_PER_PASSENGER
}
