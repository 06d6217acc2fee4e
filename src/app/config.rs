use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::email::SmtpSettings;
use crate::adapters::zaptec_client::DEFAULT_MAX_PAGES;
use crate::adapters::zaptec_http::DEFAULT_BASE_URL;
use crate::app::AppError;
use crate::domain::billing::Tariff;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub zaptec_username: String,
    pub zaptec_password: String,
    pub installation_id: String,
    pub zaptec_base_url: String,
    pub max_pages: u32,
    pub http_timeout_secs: u64,
    pub verify_tls: bool,
    pub tariff: Tariff,
    pub report_dir: PathBuf,
    pub report_file: String,
    pub secondary_report_file: String,
    pub data_dir: PathBuf,
    pub environment: String,
    /// `None` when mail sending is switched off.
    pub smtp: Option<SmtpSettings>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tariff = required(&lookup, "CHARGING_TARIFF")?
            .parse::<Tariff>()
            .map_err(|error| AppError::config(format!("CHARGING_TARIFF: {error}")))?;

        let environment = environment(&lookup);
        let smtp = mail_settings(&lookup)?;

        Ok(Self {
            zaptec_username: required(&lookup, "ZAPTEC_USERNAME")?,
            zaptec_password: required(&lookup, "ZAPTEC_PASSWORD")?,
            installation_id: required(&lookup, "ZAPTEC_INSTALLATION_ID")?,
            zaptec_base_url: optional(&lookup, "ZAPTEC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_pages: parse_or_default(&lookup, "ZAPTEC_MAX_PAGES", DEFAULT_MAX_PAGES)?,
            http_timeout_secs: parse_or_default(&lookup, "HTTP_TIMEOUT_SECS", 30_u64)?,
            verify_tls: parse_bool_or_default(&lookup, "SSL_VERIFY", true)?,
            tariff,
            report_dir: optional(&lookup, "REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/reports")),
            report_file: optional(&lookup, "REPORT_FILE")
                .unwrap_or_else(|| "charge_report".to_string()),
            secondary_report_file: optional(&lookup, "SECONDARY_REPORT_FILE")
                .unwrap_or_else(|| "laddstolpar_backen".to_string()),
            data_dir: optional(&lookup, "DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            environment,
            smtp,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Reads only the mail settings, so a run whose full configuration is broken
/// can still report that.
pub fn mail_settings_from_env() -> Result<Option<SmtpSettings>, AppError> {
    mail_settings(&|key: &str| std::env::var(key).ok())
}

fn environment<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, "ENV")
        .map(|env| env.to_ascii_uppercase())
        .unwrap_or_else(|| "DEV".to_string())
}

/// `None` when sending is off. Sending defaults on only for `ENV=PROD`.
pub(crate) fn mail_settings<F>(lookup: &F) -> Result<Option<SmtpSettings>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let environment = environment(lookup);
    if parse_bool_or_default(lookup, "SEND_EMAILS", environment == "PROD")? {
        smtp_settings(lookup, &environment).map(Some)
    } else {
        Ok(None)
    }
}

/// Mail settings prefer the environment-specific name (`PROD_SMTP_SERVER`)
/// over the generic one (`SMTP_SERVER`).
fn smtp_settings<F>(lookup: &F, environment: &str) -> Result<SmtpSettings, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let scoped = |name: &str| {
        optional(lookup, &format!("{environment}_SMTP_{name}"))
            .or_else(|| optional(lookup, &format!("SMTP_{name}")))
    };
    let require = |name: &str| {
        scoped(name).ok_or_else(|| {
            AppError::config(format!(
                "{environment}_SMTP_{name} or SMTP_{name} is required when SEND_EMAILS is enabled"
            ))
        })
    };

    let port = match scoped("PORT") {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| AppError::config("SMTP_PORT must be a valid number"))?,
        None => 587,
    };

    let recipients: Vec<String> = optional(lookup, "REPORT_RECIPIENTS")
        .map(|raw| {
            raw.split(',')
                .map(|recipient| recipient.trim().to_string())
                .filter(|recipient| !recipient.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if recipients.is_empty() {
        return Err(AppError::config(
            "REPORT_RECIPIENTS is required when SEND_EMAILS is enabled",
        ));
    }

    Ok(SmtpSettings {
        server: require("SERVER")?,
        port,
        username: require("USERNAME")?,
        password: require("PASSWORD")?,
        from: require("FROM_EMAIL")?,
        recipients,
        timeout: Duration::from_secs(parse_or_default(lookup, "SMTP_TIMEOUT", 15_u64)?),
    })
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_bool_or_default<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(AppError::config(format!("{key} must be true or false"))),
    }
}
