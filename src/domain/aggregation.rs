use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::domain::models::{ChargingSession, UserAggregate};

const OBJEKT_ID_PREFIX: &str = "G50";
const OBJEKT_ID_DIGITS: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("device name {0:?} is not of the form \"Plats <number>\"")]
    MalformedDeviceName(String),
    #[error("session {session_id} has a user but no user email")]
    MissingUserEmail { session_id: String },
    #[error("user {0} has no device names")]
    NoDevice(String),
}

/// Maps a charging spot name such as `"Plats 5"` to its billing object id
/// (`"G5005"`).
pub fn format_objekt_id(device_name: &str) -> Result<String, FormatError> {
    let malformed = || FormatError::MalformedDeviceName(device_name.to_string());

    let number = device_name.split_whitespace().nth(1).ok_or_else(malformed)?;
    if !number.chars().all(|char| char.is_ascii_digit()) {
        return Err(malformed());
    }

    Ok(format!(
        "{OBJEKT_ID_PREFIX}{number:0>width$}",
        width = OBJEKT_ID_DIGITS
    ))
}

/// Groups sessions by user email. Guest sessions are skipped. The first
/// session seen for a user decides its display name and user id.
pub fn aggregate(sessions: &[ChargingSession]) -> Result<Vec<UserAggregate>, FormatError> {
    let mut aggregates: Vec<UserAggregate> = Vec::new();
    let mut index_by_email: HashMap<&str, usize> = HashMap::new();
    let mut skipped_guests = 0_usize;

    for session in sessions {
        if session.is_guest() {
            skipped_guests += 1;
            continue;
        }

        let email = session
            .user_email
            .as_deref()
            .ok_or_else(|| FormatError::MissingUserEmail {
                session_id: session.id.clone(),
            })?;

        let index = *index_by_email.entry(email).or_insert_with(|| {
            aggregates.push(UserAggregate {
                email: email.to_string(),
                display_name: session.user_full_name.clone().unwrap_or_default(),
                user_id: session.user_id.clone().unwrap_or_default(),
                device_names: BTreeSet::new(),
                energy_kwh: 0.0,
                duration_hours: 0.0,
                session_count: 0,
            });
            aggregates.len() - 1
        });

        let user = &mut aggregates[index];
        user.device_names.insert(session.device_name.clone());
        user.energy_kwh += session.energy_kwh;
        user.duration_hours += session.duration_hours();
        user.session_count += 1;
    }

    if skipped_guests > 0 {
        tracing::debug!(skipped_guests, "guest sessions left out of aggregation");
    }

    Ok(aggregates)
}

/// Picks the device that decides a user's object id. Users charging at
/// several spots get the lexicographically smallest device name.
pub fn representative_device(aggregate: &UserAggregate) -> Result<&str, FormatError> {
    let first = aggregate
        .device_names
        .first()
        .ok_or_else(|| FormatError::NoDevice(aggregate.email.clone()))?;

    if aggregate.device_names.len() > 1 {
        tracing::warn!(
            email = %aggregate.email,
            devices = ?aggregate.device_names,
            chosen = %first,
            "user charged at several devices; using the smallest device name for the object id"
        );
    }

    Ok(first)
}
