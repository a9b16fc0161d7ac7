use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{debug, info};

use campuscruz_client::api::auth::RegisterForm;
use campuscruz_client::api::rides::{
    self, JoinRequest, NewRide, PassengerDecision, RatingRequest, RideFilters,
};
use campuscruz_client::api::users::{self, ProfileUpdate};
use campuscruz_client::api::admin;
use campuscruz_client::config::AppConfig;
use campuscruz_client::error::{ApiError, ValidationErrors};
use campuscruz_client::models::{Notification, Ride, User};
use campuscruz_client::notifications::{unread_count, NotificationPoller};
use campuscruz_client::session::{AuthFailure, Session};
use campuscruz_client::view::{Dashboard, RideView};

const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Parser)]
#[command(name = "campuscruz", about = "Share rides to and from campus", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show who is signed in.
    Whoami,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long = "college-id")]
        college_id: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        token: String,
        #[arg(long)]
        password: String,
    },
    /// Show the profile, or update it when any field is given.
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Pass an empty string to clear the number.
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        picture: Option<String>,
    },
    /// Find rides.
    Rides {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Earliest departure, RFC 3339 or `YYYY-MM-DD HH:MM` local time.
        #[arg(long, value_parser = parse_departure)]
        after: Option<DateTime<Utc>>,
    },
    /// Show one ride and what you can do with it.
    Ride { id: String },
    Offer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        route: String,
        /// RFC 3339 or `YYYY-MM-DD HH:MM` local time.
        #[arg(long, value_parser = parse_departure)]
        departure: DateTime<Utc>,
        #[arg(long)]
        seats: u32,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Join {
        id: String,
        #[arg(long)]
        pickup: String,
    },
    Accept { ride_id: String, passenger_id: String },
    Reject { ride_id: String, passenger_id: String },
    Complete { id: String },
    Rate {
        id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    Dashboard,
    Notifications {
        /// Keep polling until Ctrl-C.
        #[arg(long, conflicts_with = "read")]
        watch: bool,
        /// Mark one notification as read.
        #[arg(long, value_name = "ID")]
        read: Option<String>,
    },
    /// Site-wide statistics for administrators.
    Admin,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{default}: {source}")]
    Api {
        source: ApiError,
        default: &'static str,
    },
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error("not signed in")]
    SignedOut,
    #[error("{0}")]
    Refused(String),
}

impl CommandError {
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Api { source, default } => source.user_message(default),
            CommandError::Auth(failure) => failure.message.clone(),
            CommandError::Invalid(errors) => errors
                .first_message()
                .unwrap_or(FALLBACK_MESSAGE)
                .to_string(),
            CommandError::SignedOut => "Please log in first.".to_string(),
            CommandError::Refused(reason) => reason.clone(),
        }
    }
}

/// Wraps an `ApiError` with the message shown when the backend gave none.
fn api(default: &'static str) -> impl FnOnce(ApiError) -> CommandError {
    move |source| match source {
        ApiError::Validation(errors) => CommandError::Invalid(errors),
        source => CommandError::Api { source, default },
    }
}

fn signed_in(session: &Session) -> Result<User, CommandError> {
    session.user().ok_or(CommandError::SignedOut)
}

pub async fn run(
    command: Command,
    session: &mut Session,
    config: &AppConfig,
) -> Result<(), CommandError> {
    let client = session.client().clone();
    match command {
        Command::Whoami => match session.user() {
            Some(user) => println!("{}", render_user(&user)),
            None => println!("Not logged in."),
        },
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Welcome back, {}!", user.name);
        }
        Command::Register {
            name,
            email,
            college_id,
            password,
        } => {
            let form = RegisterForm {
                name,
                email,
                college_id,
                password,
            };
            match session.register(&form).await {
                Ok(user) => println!("Welcome to CampusCruz, {}!", user.name),
                Err(failure) if failure.suggest_login => {
                    return Err(CommandError::Refused(format!(
                        "{} Try `campuscruz login` instead.",
                        failure.message
                    )));
                }
                Err(failure) => return Err(failure.into()),
            }
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out.");
        }
        Command::ForgotPassword { email } => {
            session.forgot_password(&email).await?;
            println!("If that address is registered, a reset link is on its way.");
        }
        Command::ResetPassword { token, password } => {
            session.reset_password(&token, &password).await?;
            println!("Password updated.");
        }
        Command::Profile {
            name,
            phone,
            picture,
        } => {
            signed_in(session)?;
            if name.is_none() && phone.is_none() && picture.is_none() {
                let user = session
                    .refresh_user()
                    .await
                    .map_err(api("Error loading profile"))?;
                let stats = users::ride_stats(&client)
                    .await
                    .map_err(api("Error loading ride statistics"))?;
                println!("{}", render_user(&user));
                println!(
                    "Rides: {} total, {} offered, {} joined",
                    stats.total_rides, stats.offered_rides, stats.joined_rides
                );
            } else {
                let update = ProfileUpdate {
                    name,
                    phone_number: phone,
                    profile_picture: picture,
                };
                let user = session.update_profile(&update).await?;
                println!("Profile updated successfully!");
                println!("{}", render_user(&user));
            }
        }
        Command::Rides { from, to, after } => {
            let filters = RideFilters {
                start_location: from,
                end_location: to,
                departure_time: after,
            };
            let found = rides::list_rides(&client, &filters)
                .await
                .map_err(api("Error fetching rides"))?;
            if found.is_empty() {
                println!("No rides found.");
            }
            for ride in &found {
                println!("{}", render_ride_line(ride));
            }
        }
        Command::Ride { id } => {
            let ride = rides::get_ride(&client, &id)
                .await
                .map_err(api("Error loading ride details"))?;
            let user = session.user();
            let view = RideView::derive(&ride, user.as_ref());
            println!("{}", render_ride_detail(&ride, &view));
        }
        Command::Offer {
            from,
            to,
            route,
            departure,
            seats,
            price,
            notes,
        } => {
            signed_in(session)?;
            let offer = NewRide {
                start_location: from,
                end_location: to,
                route,
                departure_time: departure,
                total_seats: seats,
                price,
                additional_notes: notes,
            };
            let ride = rides::create_ride(&client, &offer)
                .await
                .map_err(api("Failed to offer ride"))?;
            println!("Ride offered successfully! ({})", ride.id);
        }
        Command::Join { id, pickup } => {
            let user = signed_in(session)?;
            let request = JoinRequest::new(&pickup)?;
            let ride = load_for_action(&client, &id).await?;
            let view = RideView::derive(&ride, Some(&user));
            if !view.can_join() {
                return Err(refusal(&view));
            }
            let ride = rides::join_ride(&client, &id, &request)
                .await
                .map_err(api("An error occurred while requesting to join"))?;
            println!("Request to join ride sent successfully!");
            if let Some(status) = RideView::derive(&ride, Some(&user)).request_status() {
                println!("{}", status);
            }
        }
        Command::Accept {
            ride_id,
            passenger_id,
        } => review(session, &ride_id, &passenger_id, PassengerDecision::Accepted).await?,
        Command::Reject {
            ride_id,
            passenger_id,
        } => review(session, &ride_id, &passenger_id, PassengerDecision::Rejected).await?,
        Command::Complete { id } => {
            let user = signed_in(session)?;
            let ride = load_for_action(&client, &id).await?;
            let view = RideView::derive(&ride, Some(&user));
            if !view.can_complete() {
                return Err(refusal(&view));
            }
            let completed = rides::complete_ride(&client, &id)
                .await
                .map_err(api("An error occurred while completing the ride"))?;
            println!(
                "Ride completed! You earned {} points.",
                completed.points_earned
            );
            if let Err(e) = session.refresh_user().await {
                debug!("Could not refresh points after completing ride: {}", e);
            }
        }
        Command::Rate {
            id,
            rating,
            comment,
        } => {
            let user = signed_in(session)?;
            let request = RatingRequest::new(rating, comment.as_deref())?;
            let mut ride = load_for_action(&client, &id).await?;
            let view = RideView::derive(&ride, Some(&user));
            if !view.can_rate() {
                return Err(refusal(&view));
            }
            rides::rate_ride(&client, &id, &request)
                .await
                .map_err(api("An error occurred while submitting rating"))?;
            ride.mark_rated(&user.id);
            println!("Rating submitted successfully!");
            if let Some(reason) = RideView::derive(&ride, Some(&user)).blocked {
                println!("{}", reason.reason());
            }
        }
        Command::Dashboard => {
            let user = signed_in(session)?;
            let all = rides::list_rides(&client, &RideFilters::default())
                .await
                .map_err(api("Error loading your rides. Please try again."))?;
            let dashboard = Dashboard::build(&all, &user);
            println!("{} | Points: {}", user.name, user.points);
            println!("\nUpcoming rides");
            if dashboard.upcoming.is_empty() {
                println!("  No upcoming rides found.");
            }
            for entry in &dashboard.upcoming {
                println!("  {}", render_ride_line(entry.ride));
            }
            println!("\nPast rides");
            if dashboard.past.is_empty() {
                println!("  No past rides found.");
            }
            for entry in &dashboard.past {
                println!("  {}", render_ride_line(entry.ride));
                if let Some(footer) = entry.footer() {
                    println!("    {}", footer);
                }
            }
        }
        Command::Notifications { watch, read } => {
            signed_in(session)?;
            if let Some(id) = read {
                if !users::mark_notification_read(&client, &id).await {
                    return Err(CommandError::Refused(
                        "Could not mark the notification as read.".to_string(),
                    ));
                }
                println!("Marked {} as read.", id);
            } else if watch {
                watch_notifications(session, config).await;
            } else {
                let list = users::notifications(&client)
                    .await
                    .map_err(api("Error loading notifications"))?;
                print!("{}", render_notifications(&list));
            }
        }
        Command::Admin => {
            let user = signed_in(session)?;
            if !user.is_admin() {
                return Err(CommandError::Refused(
                    "Admin access required.".to_string(),
                ));
            }
            let stats = admin::admin_stats(&client)
                .await
                .map_err(api("Error loading admin statistics"))?;
            println!(
                "Users: {} | Rides: {} ({} completed, {} scheduled)",
                stats.total_users, stats.total_rides, stats.completed_rides, stats.scheduled_rides
            );
            println!("\nRecent users");
            for recent in &stats.recent_users {
                println!("  {}", render_user(recent));
            }
            println!("\nRecent rides");
            for ride in &stats.recent_rides {
                println!("  {}", render_ride_line(ride));
            }
        }
    }
    Ok(())
}

async fn load_for_action(
    client: &campuscruz_client::api::ApiClient,
    ride_id: &str,
) -> Result<Ride, CommandError> {
    rides::get_ride(client, ride_id)
        .await
        .map_err(api("Error loading ride details"))
}

fn refusal(view: &RideView<'_>) -> CommandError {
    let reason = view
        .blocked
        .map(|blocked| blocked.reason())
        .unwrap_or("That action is not available for this ride.");
    CommandError::Refused(reason.to_string())
}

async fn review(
    session: &Session,
    ride_id: &str,
    passenger_id: &str,
    decision: PassengerDecision,
) -> Result<(), CommandError> {
    let user = signed_in(session)?;
    let client = session.client();
    let ride = load_for_action(client, ride_id).await?;
    let view = RideView::derive(&ride, Some(&user));
    if !view.can_review(passenger_id) {
        let reason = if view.is_driver {
            "That passenger has no pending request on this ride.".to_string()
        } else {
            "Only the driver can review join requests.".to_string()
        };
        return Err(CommandError::Refused(reason));
    }
    let (verb, default) = match decision {
        PassengerDecision::Accepted => ("accepted", "Failed to accept passenger"),
        PassengerDecision::Rejected => ("rejected", "Failed to reject passenger"),
    };
    rides::update_passenger_status(client, ride_id, passenger_id, decision)
        .await
        .map_err(api(default))?;
    println!("Passenger {}", verb);
    Ok(())
}

async fn watch_notifications(session: &Session, config: &AppConfig) {
    let poller = NotificationPoller::spawn(
        session.client().clone(),
        session.subscribe(),
        config.notification_poll_interval,
    );
    let mut feed = poller.feed();
    info!("Watching notifications; press Ctrl-C to stop");
    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let list = feed.borrow_and_update().clone();
                print!("{}", render_notifications(&list));
            }
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                break;
            }
        }
    }
}

/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM` in local time.
pub fn parse_departure(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map_err(|_| format!("expected RFC 3339 or YYYY-MM-DD HH:MM, got `{}`", raw))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("`{}` does not exist in the local time zone", raw))
}

fn render_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%a %d %b %Y, %H:%M")
        .to_string()
}

pub fn render_user(user: &User) -> String {
    let mut line = format!("{} <{}> | {} points", user.name, user.email, user.points);
    if user.is_admin() {
        line.push_str(" | admin");
    }
    line
}

pub fn render_ride_line(ride: &Ride) -> String {
    format!(
        "[{}] {} -> {} | {} | {}/{} seats | Rs {:.0} | {}",
        ride.id,
        ride.start_location,
        ride.end_location,
        render_time(&ride.departure_time),
        ride.available_seats,
        ride.total_seats,
        ride.price,
        ride.status
    )
}

pub fn render_ride_detail(ride: &Ride, view: &RideView<'_>) -> String {
    let mut lines = vec![render_ride_line(ride)];
    if !ride.route.is_empty() {
        lines.push(format!("Route: {}", ride.route));
    }
    if let Some(notes) = ride.additional_notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Notes: {}", notes));
    }
    lines.push(format!(
        "Driver: {}",
        ride.driver.name().unwrap_or_else(|| ride.driver.id())
    ));

    if view.is_driver {
        lines.push("You are the driver of this ride.".to_string());
        if !ride.passengers.is_empty() {
            lines.push(format!(
                "Passengers ({}, {} pending):",
                ride.passengers.len(),
                view.pending_count
            ));
            for entry in &ride.passengers {
                lines.push(format!(
                    "  {} [{}] pickup: {} ({})",
                    entry.user.name().unwrap_or("Unknown"),
                    entry.user.id(),
                    entry.pickup_location,
                    entry.status
                ));
            }
        }
    }
    if let Some(status) = view.request_status() {
        lines.push(status);
    }
    if view.can_join() {
        lines.push("You can request to join: campuscruz join <id> --pickup <place>".to_string());
    }
    if view.can_rate() {
        lines.push("Rate this ride: campuscruz rate <id> --rating <1-5>".to_string());
    }
    if view.can_complete() {
        lines.push("Mark it done: campuscruz complete <id>".to_string());
    }
    if let Some(blocked) = view.blocked {
        lines.push(blocked.reason().to_string());
    }
    lines.join("\n")
}

pub fn render_notifications(list: &[Notification]) -> String {
    let mut out = format!("{} unread\n", unread_count(list));
    for notification in list {
        let marker = if notification.read { ' ' } else { '*' };
        out.push_str(&format!(
            "{} [{}] {}: {}",
            marker, notification.id, notification.title, notification.message
        ));
        if let Some(link) = notification.link() {
            out.push_str(&format!(" ({})", link));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use serde_json::json;

    fn ride(value: serde_json::Value) -> Ride {
        serde_json::from_value(value).unwrap()
    }

    fn ride_json(status: &str, available: u32) -> serde_json::Value {
        json!({
            "_id": "r1",
            "startLocation": "GEU Main Gate",
            "endLocation": "ISBT Dehradun",
            "route": "via Clement Town",
            "departureTime": "2026-11-02T08:15:00.000Z",
            "totalSeats": 4,
            "availableSeats": available,
            "price": 50,
            "status": status,
            "driver": {"_id": "d1", "name": "Dev", "email": "dev@geu.ac.in"},
            "passengers": [
                {"user": {"_id": "u1", "name": "Asha"}, "pickupLocation": "Hostel B", "status": "pending"}
            ]
        })
    }

    fn user(id: &str) -> User {
        serde_json::from_value(json!({"_id": id, "name": "Name", "email": "name@geu.ac.in"})).unwrap()
    }

    #[test]
    fn command_line_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_offer_arguments() {
        let cli = Cli::try_parse_from([
            "campuscruz",
            "offer",
            "--from",
            "GEU Main Gate",
            "--to",
            "ISBT",
            "--route",
            "via Clement Town",
            "--departure",
            "2026-11-02T08:15:00Z",
            "--seats",
            "3",
        ])
        .unwrap();
        match cli.command {
            Command::Offer {
                seats, price, notes, ..
            } => {
                assert_eq!(seats, 3);
                assert_eq!(price, 0.0);
                assert!(notes.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn watch_and_read_are_exclusive() {
        let result =
            Cli::try_parse_from(["campuscruz", "notifications", "--watch", "--read", "n1"]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case("2026-11-02T08:15:00Z")]
    #[case("2026-11-02T13:45:00+05:30")]
    fn rfc3339_departures_are_normalized_to_utc(#[case] raw: &str) {
        let parsed = parse_departure(raw).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-11-02T08:15:00+00:00");
    }

    #[test]
    fn local_departures_parse_and_garbage_does_not() {
        assert!(parse_departure("2026-11-02 08:15").is_ok());
        assert!(parse_departure("tomorrow morning").is_err());
    }

    #[test]
    fn driver_detail_lists_passengers_and_actions() {
        let ride = ride(ride_json("scheduled", 3));
        let driver = user("d1");
        let view = RideView::derive(&ride, Some(&driver));

        let text = render_ride_detail(&ride, &view);

        assert!(text.contains("You are the driver of this ride."));
        assert!(text.contains("Passengers (1, 1 pending):"));
        assert!(text.contains("Asha [u1] pickup: Hostel B (Pending)"));
        assert!(text.contains("campuscruz complete"));
        assert!(!text.contains("campuscruz join"));
    }

    #[test]
    fn outsider_detail_explains_why_join_is_missing() {
        let ride = ride(ride_json("cancelled", 3));
        let outsider = user("u9");
        let view = RideView::derive(&ride, Some(&outsider));

        let text = render_ride_detail(&ride, &view);

        assert!(text.contains("This ride is no longer accepting passengers."));
        assert!(!text.contains("campuscruz join"));
    }

    #[test]
    fn notification_listing_marks_unread() {
        let list: Vec<Notification> = serde_json::from_value(json!([
            {"_id": "n1", "ride": "r1", "title": "Request accepted", "message": "You're in", "read": false},
            {"_id": "n2", "title": "Welcome", "message": "Hi", "read": true}
        ]))
        .unwrap();

        let text = render_notifications(&list);

        assert!(text.starts_with("1 unread\n"));
        assert!(text.contains("* [n1] Request accepted: You're in (/rides/r1)"));
        assert!(text.contains("  [n2] Welcome: Hi\n"));
    }

    #[test]
    fn api_errors_fall_back_to_the_command_message() {
        let error = api("Failed to offer ride")(ApiError::Decode {
            message: "missing field".to_string(),
        });
        assert_eq!(error.user_message(), "Failed to offer ride");

        let invalid = api("Failed to offer ride")(ApiError::Validation({
            let mut errors = ValidationErrors::new();
            errors.push("totalSeats", "Seats must be between 1 and 10");
            errors
        }));
        assert_eq!(invalid.user_message(), "Seats must be between 1 and 10");
    }
}
