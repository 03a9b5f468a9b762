//! Urgency and complaint copy.

use chrono::Duration;
use scenario_core::{
    surge_label, GuestComplaint, MonetizationStatus, PropertyRecord, SeedValue,
    COMPLAINT_AGE_MAX, COMPLAINT_AGE_MIN,
};
use scenario_seed::{next_in_range, ChannelRng, Channel};

// Every template carries at least one placeholder so the prose always quotes
// a number shown elsewhere on the same screen.
const LOSS_TEMPLATES: [&str; 5] = [
    "{requests} guests are requesting rides right now",
    "Surge is at {surge}x and {requests} ride requests are going to competitors",
    "{requests} ride requests in the last hour went unserved",
    "Guests are paying {surge}x surge pricing for rides you could be booking",
    "Right now {requests} guests need rides and your desk is earning nothing",
];

const EARNED_TEMPLATES: [&str; 4] = [
    "{requests} guests booked rides through your desk this hour",
    "Surge at {surge}x is boosting your ride revenue",
    "{requests} active requests are earning at {surge}x",
    "Your drivers are covering {requests} open requests",
];

/// Used when a property has no complaint templates of its own.
pub const GENERIC_COMPLAINTS: [&str; 6] = [
    "Waited over 30 minutes for a ride to the airport",
    "Concierge could not find a car for our dinner reservation",
    "Rideshare pickup spot was confusing and the driver cancelled",
    "Taxi quoted double the usual fare during the conference",
    "No transportation options listed at the front desk",
    "Late-night ride back from downtown never showed up",
];

/// Headline urgency copy, filled from the already-computed requests and surge.
pub fn urgency_message(
    status: MonetizationStatus,
    seed: SeedValue,
    requests: u32,
    surge: f64,
) -> String {
    let templates: &[&str] = match status {
        MonetizationStatus::NotEarning => &LOSS_TEMPLATES,
        MonetizationStatus::AlreadyEarning => &EARNED_TEMPLATES,
    };
    let template = ChannelRng::new(seed, Channel::UrgencyTemplate)
        .pick(templates)
        .copied()
        .unwrap_or(templates[0]);
    template
        .replace("{requests}", &requests.to_string())
        .replace("{surge}", &surge_label(surge))
}

/// "N minutes ago" below an hour, "N hours ago" above.
pub fn complaint_label(minutes_ago: u32) -> String {
    let age = Duration::minutes(i64::from(minutes_ago));
    if age.num_minutes() < 60 {
        format!("{} minutes ago", age.num_minutes())
    } else if age.num_hours() == 1 {
        "1 hour ago".to_string()
    } else {
        format!("{} hours ago", age.num_hours())
    }
}

/// Most recent guest complaint with a relative age in [2, 180] minutes.
pub fn guest_complaint(record: &PropertyRecord, seed: SeedValue) -> GuestComplaint {
    let mut rng = ChannelRng::new(seed, Channel::Complaint);
    let text = match rng.pick(&record.seed_complaints) {
        Some(t) => t.clone(),
        None => rng
            .pick(&GENERIC_COMPLAINTS)
            .copied()
            .unwrap_or(GENERIC_COMPLAINTS[0])
            .to_string(),
    };
    let minutes_ago = next_in_range(seed, Channel::ComplaintAge, COMPLAINT_AGE_MIN, COMPLAINT_AGE_MAX)
        .clamp(COMPLAINT_AGE_MIN, COMPLAINT_AGE_MAX);
    GuestComplaint {
        text,
        minutes_ago,
        label: complaint_label(minutes_ago),
    }
}
