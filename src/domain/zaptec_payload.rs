use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::models::{
    ChargingSession, FirmwareVersion, InstallationReportRow, SessionPage, UserDetails, is_blank,
};

/// Large signed meter payload attached to every session record.
pub const SIGNED_SESSION_KEY: &str = "SignedSession";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object")]
    InvalidPayloadType,
    #[error("payload does not match the expected schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePage {
    pages: u32,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireFirmware {
    #[serde(default)]
    major: i64,
    #[serde(default)]
    minor: i64,
    #[serde(default)]
    build: i64,
    #[serde(default)]
    revision: i64,
    #[serde(default)]
    major_revision: i64,
    #[serde(default)]
    minor_revision: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireSession {
    id: String,
    device_id: String,
    device_name: String,
    charger_id: Option<String>,
    user_id: Option<String>,
    user_full_name: Option<String>,
    user_email: Option<String>,
    user_user_name: Option<String>,
    token_name: Option<String>,
    energy: f64,
    start_date_time: String,
    end_date_time: String,
    commit_end_date_time: Option<String>,
    charger_firmware_version: Option<WireFirmware>,
    #[serde(default)]
    externally_ended: bool,
}

#[derive(Debug, Deserialize)]
struct WireInstallationReport {
    #[serde(rename = "totalUserChargerReportModel", default)]
    rows: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireReportRow {
    group_as_string: Option<String>,
    user_details: Option<WireUserDetails>,
    #[serde(default)]
    total_charge_session_count: u32,
    #[serde(default)]
    total_charge_session_energy: f64,
    #[serde(default)]
    total_charge_session_duration: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireUserDetails {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    full_name: String,
}

pub fn parse_token_grant(payload: &Value) -> Result<TokenGrant, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::InvalidPayloadType);
    }
    let wire: WireToken = serde_json::from_value(payload.clone())?;

    let access_token = wire
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or(PayloadError::MissingField("access_token"))?;
    let expires_in_seconds = wire
        .expires_in
        .ok_or(PayloadError::MissingField("expires_in"))?;

    Ok(TokenGrant {
        access_token,
        expires_in_seconds,
    })
}

/// Parses one charge history page. The signed session blob is removed from
/// every record before the record is validated.
pub fn parse_session_page(mut payload: Value) -> Result<SessionPage, PayloadError> {
    let object = payload
        .as_object_mut()
        .ok_or(PayloadError::InvalidPayloadType)?;
    if let Some(Value::Array(records)) = object.get_mut("Data") {
        for record in records.iter_mut() {
            strip_signed_session(record);
        }
    }

    let wire: WirePage = serde_json::from_value(payload)?;
    let sessions = wire
        .data
        .into_iter()
        .map(parse_session)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SessionPage {
        pages: wire.pages,
        sessions,
    })
}

pub fn strip_signed_session(record: &mut Value) {
    if let Some(object) = record.as_object_mut() {
        object.remove(SIGNED_SESSION_KEY);
    }
}

fn parse_session(record: Value) -> Result<ChargingSession, PayloadError> {
    let wire: WireSession = serde_json::from_value(record)?;

    if !wire.energy.is_finite() || wire.energy < 0.0 {
        return Err(PayloadError::InvalidField {
            field: "Energy",
            reason: format!("session {} reports {} kWh", wire.id, wire.energy),
        });
    }

    let started_at = parse_timestamp("StartDateTime", &wire.start_date_time)?;
    let ended_at = parse_timestamp("EndDateTime", &wire.end_date_time)?;
    if ended_at < started_at {
        return Err(PayloadError::InvalidField {
            field: "EndDateTime",
            reason: format!("session {} ends before it starts", wire.id),
        });
    }

    let commit_ended_at = wire
        .commit_end_date_time
        .as_deref()
        .map(|raw| parse_timestamp("CommitEndDateTime", raw))
        .transpose()?;

    Ok(ChargingSession {
        id: wire.id,
        device_id: wire.device_id,
        device_name: wire.device_name,
        charger_id: wire.charger_id,
        user_id: non_blank(wire.user_id),
        user_full_name: wire.user_full_name,
        user_email: non_blank(wire.user_email),
        user_login_name: non_blank(wire.user_user_name),
        token_name: wire.token_name,
        energy_kwh: wire.energy,
        started_at,
        ended_at,
        commit_ended_at,
        firmware: wire.charger_firmware_version.map(|firmware| FirmwareVersion {
            major: firmware.major,
            minor: firmware.minor,
            build: firmware.build,
            revision: firmware.revision,
            major_revision: firmware.major_revision,
            minor_revision: firmware.minor_revision,
        }),
        externally_ended: wire.externally_ended,
    })
}

pub fn parse_installation_report(
    payload: &Value,
) -> Result<Vec<(InstallationReportRow, Value)>, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::InvalidPayloadType);
    }
    let wire: WireInstallationReport = serde_json::from_value(payload.clone())?;

    wire.rows
        .into_iter()
        .map(|raw| {
            let row: WireReportRow = serde_json::from_value(raw.clone())?;
            Ok((
                InstallationReportRow {
                    group_label: row.group_as_string.map(|label| label.trim().to_string()),
                    user_details: row.user_details.map(|details| UserDetails {
                        id: details.id,
                        email: details.email,
                        full_name: details.full_name,
                    }),
                    session_count: row.total_charge_session_count,
                    total_energy_kwh: row.total_charge_session_energy,
                    total_duration_hours: row.total_charge_session_duration,
                },
                raw,
            ))
        })
        .collect()
}

/// Zaptec returns timestamps both with and without an offset. Values without
/// one are UTC.
fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, PayloadError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|error| PayloadError::InvalidField {
            field,
            reason: format!("{trimmed:?}: {error}"),
        })
}

fn non_blank(value: Option<String>) -> Option<String> {
    if is_blank(value.as_deref()) {
        None
    } else {
        value
    }
}
