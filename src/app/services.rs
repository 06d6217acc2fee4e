use std::path::PathBuf;

use crate::adapters::email::DeliveryError;
use crate::domain::period::ReportPeriod;

/// A finished report, ready to hand over for transmission.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportContent {
    CsvAttachments(Vec<PathBuf>),
    HtmlSummary { month_name: String, html: String },
}

impl ReportContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CsvAttachments(_) => "csv_attachments",
            Self::HtmlSummary { .. } => "html_summary",
        }
    }
}

pub trait ReportDelivery {
    fn deliver(&self, content: &ReportContent, period: &ReportPeriod) -> Result<(), DeliveryError>;

    /// Best effort; failures are logged and swallowed.
    fn report_error(&self, message: &str);
}

impl<D: ReportDelivery + ?Sized> ReportDelivery for &D {
    fn deliver(&self, content: &ReportContent, period: &ReportPeriod) -> Result<(), DeliveryError> {
        (**self).deliver(content, period)
    }

    fn report_error(&self, message: &str) {
        (**self).report_error(message)
    }
}

/// Logs a failed report run and forwards it to the error channel.
pub fn notify_failure<D, E>(delivery: &D, report: &str, error: &E)
where
    D: ReportDelivery + ?Sized,
    E: std::fmt::Display,
{
    tracing::error!(report, error = %error, "report generation failed");
    delivery.report_error(&format!("{report} report failed.\n\nError details:\n{error}"));
}
