use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    pub major: i64,
    pub minor: i64,
    pub build: i64,
    pub revision: i64,
    pub major_revision: i64,
    pub minor_revision: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSession {
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub charger_id: Option<String>,
    pub user_id: Option<String>,
    pub user_full_name: Option<String>,
    pub user_email: Option<String>,
    pub user_login_name: Option<String>,
    pub token_name: Option<String>,
    pub energy_kwh: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub commit_ended_at: Option<DateTime<Utc>>,
    pub firmware: Option<FirmwareVersion>,
    pub externally_ended: bool,
}

impl ChargingSession {
    /// A session started without an authenticated user (no user id and no
    /// login name). These never take part in invoicing.
    pub fn is_guest(&self) -> bool {
        is_blank(self.user_id.as_deref()) && is_blank(self.user_login_name.as_deref())
    }

    pub fn duration_hours(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 3_600_000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionPage {
    pub pages: u32,
    pub sessions: Vec<ChargingSession>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
    pub id: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallationReportRow {
    pub group_label: Option<String>,
    pub user_details: Option<UserDetails>,
    pub session_count: u32,
    pub total_energy_kwh: f64,
    pub total_duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserAggregate {
    pub email: String,
    pub display_name: String,
    pub user_id: String,
    pub device_names: BTreeSet<String>,
    pub energy_kwh: f64,
    pub duration_hours: f64,
    pub session_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingRow {
    pub objekt_id: String,
    pub period_start: String,
    pub period_end: String,
    pub kind: &'static str,
    pub opening_value: f64,
    pub closing_value: f64,
    pub consumption: f64,
    pub cost: f64,
    pub tariff: f64,
    pub unit: &'static str,
    pub comment: String,
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map(|text| text.trim().is_empty()).unwrap_or(true)
}
