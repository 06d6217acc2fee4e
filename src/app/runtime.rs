use chrono::NaiveDate;

use crate::adapters::csv_export::{CsvReportWriter, WrittenReport};
use crate::adapters::email::{SmtpDelivery, SmtpSettings};
use crate::adapters::token::{Credentials, TokenManager};
use crate::adapters::zaptec_client::ZaptecClient;
use crate::adapters::zaptec_http::{ZaptecHttpClient, ZaptecTransport};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::{ReportContent, ReportDelivery, notify_failure};
use crate::domain::aggregation::aggregate;
use crate::domain::billing::{Tariff, build_billing_rows, partition, round_for_output};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::period::ReportPeriod;
use crate::domain::summary::{SummaryLine, build_summary, render_html};

pub type AppClient = ZaptecClient<ZaptecHttpClient, SystemClock>;

pub fn build_client(config: &AppConfig) -> Result<AppClient, AppError> {
    let transport = ZaptecHttpClient::new(
        &config.zaptec_base_url,
        config.http_timeout(),
        config.verify_tls,
    )
    .map_err(AppError::runtime)?;

    let tokens = TokenManager::new(
        Credentials {
            username: config.zaptec_username.clone(),
            password: config.zaptec_password.clone(),
        },
        SystemClock,
    );

    Ok(ZaptecClient::new(transport, tokens).with_max_pages(config.max_pages))
}

pub fn build_delivery(config: &AppConfig) -> SmtpDelivery {
    match &config.smtp {
        Some(settings) => SmtpDelivery::new(settings.clone()),
        None => SmtpDelivery::disabled(),
    }
}

/// Delivery for failures that happen before the full configuration loads.
/// Mail settings that fail to parse leave it disabled.
pub fn fallback_delivery(settings: Result<Option<SmtpSettings>, AppError>) -> SmtpDelivery {
    match settings {
        Ok(Some(settings)) => SmtpDelivery::new(settings),
        Ok(None) => SmtpDelivery::disabled(),
        Err(error) => {
            tracing::warn!(error = %error, "mail settings unusable; error notice not sent");
            SmtpDelivery::disabled()
        }
    }
}

/// Loads the configuration; a failure is reported through whatever mail
/// settings `mail` still yields.
pub fn load_config<L, M>(report: &str, load: L, mail: M) -> Result<AppConfig, AppError>
where
    L: FnOnce() -> Result<AppConfig, AppError>,
    M: FnOnce() -> Result<Option<SmtpSettings>, AppError>,
{
    load().inspect_err(|error| notify_failure(&fallback_delivery(mail()), report, error))
}

/// One scheduled run: the installation and the month it reports on.
#[derive(Debug, Clone)]
pub struct ReportRun {
    pub installation_id: String,
    pub period: ReportPeriod,
    pub run_date: NaiveDate,
}

impl ReportRun {
    /// Reports on the calendar month before `clock`'s local date.
    pub fn previous_month<C: Clock>(installation_id: &str, clock: &C) -> Result<Self, AppError> {
        let run_date = clock.today();
        let period = ReportPeriod::previous_month(run_date)
            .ok_or_else(|| AppError::runtime(format!("no previous month for {run_date}")))?;

        Ok(Self {
            installation_id: installation_id.to_string(),
            period,
            run_date,
        })
    }

    pub fn date_stamp(&self) -> String {
        self.run_date.format("%Y%m%d").to_string()
    }
}

pub fn generate_invoicing_report<T, C, D>(
    client: &mut ZaptecClient<T, C>,
    run: &ReportRun,
    tariff: Tariff,
    writer: &CsvReportWriter,
    delivery: &D,
) -> Result<WrittenReport, AppError>
where
    T: ZaptecTransport,
    C: Clock,
    D: ReportDelivery + ?Sized,
{
    tracing::info!(
        installation_id = %run.installation_id,
        from = %run.period.start_date(),
        to = %run.period.end_date(),
        "generating invoicing report"
    );

    let fetch = client.fetch_sessions(
        &run.installation_id,
        &run.period.from_utc(),
        &run.period.to_utc(),
    )?;
    let users = aggregate(&fetch.sessions)?;
    let rows = build_billing_rows(&users, &run.period, tariff)?
        .into_iter()
        .map(round_for_output)
        .collect();
    let (primary, secondary) = partition(rows);

    tracing::info!(
        sessions = fetch.sessions.len(),
        users = users.len(),
        primary_rows = primary.len(),
        secondary_rows = secondary.len(),
        "billing rows computed"
    );

    let written = writer.write_partitions(&primary, &secondary, &run.date_stamp())?;
    delivery.deliver(&ReportContent::CsvAttachments(written.files()), &run.period)?;

    tracing::info!("invoicing report completed");
    Ok(written)
}

pub fn generate_summary_report<T, C, D>(
    client: &mut ZaptecClient<T, C>,
    run: &ReportRun,
    delivery: &D,
) -> Result<Vec<SummaryLine>, AppError>
where
    T: ZaptecTransport,
    C: Clock,
    D: ReportDelivery + ?Sized,
{
    tracing::info!(
        installation_id = %run.installation_id,
        month = %run.period.month_name(),
        "generating summary report"
    );

    let rows = client.fetch_installation_summary(
        &run.installation_id,
        &run.period.from_local(),
        &run.period.to_local(),
    )?;
    let lines = build_summary(&rows);
    let month_name = run.period.month_name();
    let html = render_html(&month_name, &lines);

    delivery.deliver(&ReportContent::HtmlSummary { month_name, html }, &run.period)?;

    tracing::info!(users = lines.len().saturating_sub(1), "summary report completed");
    Ok(lines)
}

/// Runs one report; a failure is logged, sent to the error channel and
/// returned.
pub fn with_failure_notice<D, R, F>(delivery: &D, report: &str, job: F) -> Result<R, AppError>
where
    D: ReportDelivery + ?Sized,
    F: FnOnce() -> Result<R, AppError>,
{
    job().inspect_err(|error| notify_failure(delivery, report, error))
}
