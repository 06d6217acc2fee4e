use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::app::services::{ReportContent, ReportDelivery};
use crate::domain::period::ReportPeriod;

const ERROR_SUBJECT: &str = "ERROR: Laddningsrapport generation failed";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("invalid content type: {0}")]
    ContentType(#[from] ContentTypeErr),
    #[error("failed to build email: {0}")]
    Compose(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipients: Vec<String>,
    pub timeout: Duration,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends finished reports and failure notices by mail. With sending disabled
/// every delivery is logged and skipped.
#[derive(Debug, Clone)]
pub struct SmtpDelivery {
    settings: Option<SmtpSettings>,
}

impl SmtpDelivery {
    pub fn new(settings: SmtpSettings) -> Self {
        Self {
            settings: Some(settings),
        }
    }

    pub fn disabled() -> Self {
        Self { settings: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    fn send(&self, settings: &SmtpSettings, message: Message) -> Result<(), DeliveryError> {
        let mailer = SmtpTransport::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(settings.timeout))
            .build();

        mailer.send(&message)?;

        tracing::info!(
            recipients = %settings.recipients.join(", "),
            "email sent"
        );
        Ok(())
    }
}

impl ReportDelivery for SmtpDelivery {
    fn deliver(&self, content: &ReportContent, period: &ReportPeriod) -> Result<(), DeliveryError> {
        let Some(settings) = &self.settings else {
            tracing::info!(
                content = content.kind(),
                "email sending disabled; skipping report delivery"
            );
            return Ok(());
        };

        let message = build_report_message(settings, content, period)?;
        self.send(settings, message)
    }

    fn report_error(&self, message: &str) {
        let Some(settings) = &self.settings else {
            tracing::info!("email sending disabled; error notice not sent");
            return;
        };

        let result = build_error_message(settings, message)
            .and_then(|notice| self.send(settings, notice));
        if let Err(error) = result {
            tracing::error!(error = %error, "failed to send error email");
        }
    }
}

fn message_builder(
    settings: &SmtpSettings,
    subject: String,
) -> Result<lettre::message::MessageBuilder, DeliveryError> {
    let mut builder = Message::builder()
        .from(settings.from.parse::<Mailbox>()?)
        .subject(subject);
    for recipient in &settings.recipients {
        builder = builder.to(recipient.trim().parse::<Mailbox>()?);
    }
    Ok(builder)
}

pub fn build_report_message(
    settings: &SmtpSettings,
    content: &ReportContent,
    period: &ReportPeriod,
) -> Result<Message, DeliveryError> {
    match content {
        ReportContent::CsvAttachments(files) => {
            let (from, to) = (period.start_date(), period.end_date());
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(format!(
                "Här kommer laddningsrapporten för perioden {from} - {to}"
            )));
            for file in files {
                parts = parts.singlepart(csv_attachment(file)?);
            }

            Ok(message_builder(settings, format!("Laddningsrapport {from} - {to}"))?
                .multipart(parts)?)
        }
        ReportContent::HtmlSummary { month_name, html } => Ok(message_builder(
            settings,
            format!("Summering av laddel för {month_name}"),
        )?
        .header(ContentType::TEXT_HTML)
        .body(html.clone())?),
    }
}

pub fn build_error_message(settings: &SmtpSettings, error: &str) -> Result<Message, DeliveryError> {
    Ok(message_builder(settings, ERROR_SUBJECT.to_string())?
        .header(ContentType::TEXT_PLAIN)
        .body(error.to_string())?)
}

fn csv_attachment(path: &Path) -> Result<SinglePart, DeliveryError> {
    let bytes = fs::read(path).map_err(|source| DeliveryError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "report.csv".to_string());

    Ok(Attachment::new(filename).body(bytes, ContentType::parse("text/csv; charset=utf-8")?))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{DeliveryError, SmtpDelivery, SmtpSettings, build_error_message, build_report_message};
    use crate::app::services::{ReportContent, ReportDelivery};
    use crate::domain::period::ReportPeriod;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            server: "smtp.example.com".to_string(),
            port: 587,
            username: "reports@example.com".to_string(),
            password: "hunter2".to_string(),
            from: "reports@example.com".to_string(),
            recipients: vec!["board@example.com".to_string(), " treasurer@example.com".to_string()],
            timeout: Duration::from_secs(15),
        }
    }

    fn january() -> ReportPeriod {
        ReportPeriod::for_month(2024, 1).expect("valid month")
    }

    fn rendered(message: &lettre::Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    #[test]
    fn builds_report_mail_with_csv_attachments() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("charge_report_20240201.csv");
        fs::write(&path, "Objekt-ID;Kostnad\nG5001;2.50\n").expect("fixture written");

        let message = build_report_message(
            &settings(),
            &ReportContent::CsvAttachments(vec![path]),
            &january(),
        )
        .expect("message should build");

        let text = rendered(&message);
        assert!(text.contains("Subject: Laddningsrapport 2024-01-01 - 2024-01-31"));
        assert!(text.contains("charge_report_20240201.csv"));
        assert!(text.contains("board@example.com"));
        assert!(text.contains("treasurer@example.com"));
    }

    #[test]
    fn missing_attachment_is_reported() {
        let result = build_report_message(
            &settings(),
            &ReportContent::CsvAttachments(vec![PathBuf::from("/nonexistent/report.csv")]),
            &january(),
        );

        assert!(matches!(result, Err(DeliveryError::Attachment { .. })));
    }

    #[test]
    fn builds_html_summary_mail() {
        let message = build_report_message(
            &settings(),
            &ReportContent::HtmlSummary {
                month_name: "January".to_string(),
                html: "<h3>Summary</h3>".to_string(),
            },
            &january(),
        )
        .expect("message should build");

        let text = rendered(&message);
        assert!(text.contains("text/html"));
        assert!(text.contains("<h3>Summary</h3>"));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let mut broken = settings();
        broken.recipients = vec!["not an address".to_string()];

        let result = build_error_message(&broken, "boom");

        assert!(matches!(result, Err(DeliveryError::Address(_))));
    }

    #[test]
    fn error_mail_uses_fixed_subject() {
        let message = build_error_message(&settings(), "Error details:\nboom").expect("message");

        assert!(rendered(&message).contains("Subject: ERROR: Laddningsrapport generation failed"));
    }

    #[test]
    fn disabled_delivery_skips_without_touching_files() {
        let delivery = SmtpDelivery::disabled();

        let result = delivery.deliver(
            &ReportContent::CsvAttachments(vec![PathBuf::from("/nonexistent/report.csv")]),
            &january(),
        );
        delivery.report_error("ignored");

        assert!(result.is_ok());
        assert!(!delivery.is_enabled());
    }

    #[test]
    fn settings_debug_hides_password() {
        assert!(!format!("{:?}", settings()).contains("hunter2"));
    }
}
