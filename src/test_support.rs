use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};

use crate::adapters::zaptec_http::{
    ChargeHistoryQuery, InstallationReportRequest, TransportError, ZaptecTransport,
};
use crate::domain::clock::{Clock, TimestampMs};
use crate::domain::models::ChargingSession;

/// 2024-01-01T00:00:00Z
pub const TOKEN_ISSUED_AT: i64 = 1_704_067_200_000;

/// Shared settable clock. Its local zone is a fixed offset, UTC unless set.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Rc<RefCell<i64>>,
    utc_offset: FixedOffset,
}

impl FakeClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Rc::new(RefCell::new(start)),
            utc_offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
        }
    }

    pub fn with_utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset = FixedOffset::east_opt(hours * 3600).unwrap_or(self.utc_offset);
        self
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.now.borrow_mut() += seconds * 1000;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(*self.now.borrow())
    }

    fn today(&self) -> NaiveDate {
        self.now()
            .to_datetime()
            .with_timezone(&self.utc_offset)
            .date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub bearer: String,
    pub installation_id: String,
    pub from: String,
    pub to: String,
    pub detail_level: u8,
    pub page_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReport {
    pub bearer: String,
    pub from_date: String,
    pub end_date: String,
    pub installation_id: String,
    pub group_by: u8,
}

type Scripted = VecDeque<Result<Value, u16>>;

/// In-memory transport that replays queued responses in order and records
/// every call it receives.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    tokens: RefCell<Scripted>,
    pages: RefCell<Scripted>,
    reports: RefCell<Scripted>,
    token_requests: RefCell<Vec<(String, String)>>,
    history_queries: RefCell<Vec<RecordedQuery>>,
    report_requests: RefCell<Vec<RecordedReport>>,
    clock_step: RefCell<Option<(FakeClock, u32, i64)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, access_token: &str, expires_in: i64) -> Self {
        self.with_token_payload(json!({
            "access_token": access_token,
            "expires_in": expires_in,
            "token_type": "Bearer"
        }))
    }

    pub fn with_token_payload(self, payload: Value) -> Self {
        self.tokens.borrow_mut().push_back(Ok(payload));
        self
    }

    pub fn with_token_status(self, status: u16) -> Self {
        self.tokens.borrow_mut().push_back(Err(status));
        self
    }

    pub fn with_page(self, payload: Value) -> Self {
        self.pages.borrow_mut().push_back(Ok(payload));
        self
    }

    pub fn with_page_status(self, status: u16) -> Self {
        self.pages.borrow_mut().push_back(Err(status));
        self
    }

    pub fn with_report(self, payload: Value) -> Self {
        self.reports.borrow_mut().push_back(Ok(payload));
        self
    }

    pub fn with_report_status(self, status: u16) -> Self {
        self.reports.borrow_mut().push_back(Err(status));
        self
    }

    /// Moves `clock` forward once the given charge history page is served,
    /// as if that request had been slow.
    pub fn advancing_clock_after_page(self, clock: &FakeClock, page_index: u32, seconds: i64) -> Self {
        *self.clock_step.borrow_mut() = Some((clock.clone(), page_index, seconds));
        self
    }

    pub fn token_requests(&self) -> Vec<(String, String)> {
        self.token_requests.borrow().clone()
    }

    pub fn history_queries(&self) -> Vec<RecordedQuery> {
        self.history_queries.borrow().clone()
    }

    pub fn report_requests(&self) -> Vec<RecordedReport> {
        self.report_requests.borrow().clone()
    }

    fn next(queue: &RefCell<Scripted>, what: &str) -> Result<Value, TransportError> {
        match queue.borrow_mut().pop_front() {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(status)) => Err(TransportError::Status {
                status,
                body: format!("scripted {what} failure"),
            }),
            None => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted {what} response left"),
            ))),
        }
    }
}

impl ZaptecTransport for ScriptedTransport {
    fn request_token(&self, username: &str, password: &str) -> Result<Value, TransportError> {
        self.token_requests
            .borrow_mut()
            .push((username.to_string(), password.to_string()));
        Self::next(&self.tokens, "token")
    }

    fn get_charge_history(
        &self,
        bearer: &str,
        query: &ChargeHistoryQuery<'_>,
    ) -> Result<Value, TransportError> {
        self.history_queries.borrow_mut().push(RecordedQuery {
            bearer: bearer.to_string(),
            installation_id: query.installation_id.to_string(),
            from: query.from.to_string(),
            to: query.to.to_string(),
            detail_level: query.detail_level,
            page_index: query.page_index,
        });
        if let Some((clock, page_index, seconds)) = &*self.clock_step.borrow()
            && *page_index == query.page_index
        {
            clock.advance_seconds(*seconds);
        }
        Self::next(&self.pages, "charge history")
    }

    fn post_installation_report(
        &self,
        bearer: &str,
        request: &InstallationReportRequest<'_>,
    ) -> Result<Value, TransportError> {
        self.report_requests.borrow_mut().push(RecordedReport {
            bearer: bearer.to_string(),
            from_date: request.from_date.to_string(),
            end_date: request.end_date.to_string(),
            installation_id: request.installation_id.to_string(),
            group_by: request.group_by,
        });
        Self::next(&self.reports, "installation report")
    }
}

pub fn history_page(pages: u32, data: Vec<Value>) -> Value {
    json!({ "Pages": pages, "Data": data })
}

pub fn wire_session(id: &str, device_name: &str, email: &str, energy: f64) -> Value {
    json!({
        "Id": id,
        "DeviceId": format!("ZAP-{device_name}"),
        "DeviceName": device_name,
        "ChargerId": "charger-1",
        "UserId": format!("id-{email}"),
        "UserFullName": format!("Name {email}"),
        "UserEmail": email,
        "UserUserName": email,
        "Energy": energy,
        "StartDateTime": "2024-01-01T10:00:00",
        "EndDateTime": "2024-01-01T11:00:00",
        "CommitMetadata": 1,
        "CommitEndDateTime": "2024-01-01T11:00:00",
        "ExternallyEnded": false,
        "ChargerFirmwareVersion": {
            "Major": 3, "Minor": 2, "Build": 0, "Revision": 0,
            "MajorRevision": 0, "MinorRevision": 0
        },
        "SignedSession": "OCMF|{\"FV\":\"1.0\"}|{\"SA\":\"ECDSA-secp384r1-SHA256\"}"
    })
}

pub fn guest_wire_session(id: &str, device_name: &str) -> Value {
    let mut record = wire_session(id, device_name, "", 4.0);
    record["UserId"] = Value::Null;
    record["UserUserName"] = Value::Null;
    record["UserFullName"] = Value::Null;
    record["UserEmail"] = Value::Null;
    record
}

pub fn report_row(label: &str, email: &str, sessions: u32, energy: f64, hours: f64) -> Value {
    json!({
        "GroupAsString": label,
        "UserDetails": {"Id": format!("id-{email}"), "Email": email, "FullName": label},
        "TotalChargeSessionCount": sessions,
        "TotalChargeSessionEnergy": energy,
        "TotalChargeSessionDuration": hours
    })
}

pub struct SessionBuilder {
    session: ChargingSession,
    start_offset_hours: i64,
    minutes: i64,
}

impl SessionBuilder {
    pub fn new(device_name: &str) -> Self {
        let started_at = base_time();
        Self {
            session: ChargingSession {
                id: format!("session-{device_name}"),
                device_id: format!("ZAP-{device_name}"),
                device_name: device_name.to_string(),
                charger_id: Some("charger-1".to_string()),
                user_id: Some("id-user@example.com".to_string()),
                user_full_name: Some("Example User".to_string()),
                user_email: Some("user@example.com".to_string()),
                user_login_name: Some("user@example.com".to_string()),
                token_name: None,
                energy_kwh: 1.0,
                started_at,
                ended_at: started_at,
                commit_ended_at: None,
                firmware: None,
                externally_ended: false,
            },
            start_offset_hours: 0,
            minutes: 60,
        }
    }

    pub fn email(mut self, email: &str) -> Self {
        self.session.user_email = Some(email.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.session.user_full_name = Some(name.to_string());
        self
    }

    pub fn user_id(mut self, user_id: &str) -> Self {
        self.session.user_id = Some(user_id.to_string());
        self
    }

    pub fn guest(mut self) -> Self {
        self.session.user_id = None;
        self.session.user_login_name = None;
        self
    }

    pub fn energy(mut self, energy_kwh: f64) -> Self {
        self.session.energy_kwh = energy_kwh;
        self
    }

    pub fn minutes(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn start_offset_hours(mut self, hours: i64) -> Self {
        self.start_offset_hours = hours;
        self
    }

    pub fn build(mut self) -> ChargingSession {
        self.session.started_at = base_time() + Duration::hours(self.start_offset_hours);
        self.session.ended_at = self.session.started_at + Duration::minutes(self.minutes);
        self.session
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
}
