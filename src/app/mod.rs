pub mod config;
mod error;
mod logging;
pub mod runtime;
pub mod services;

pub use error::AppError;

pub use logging::LogGuard;

use crate::adapters::csv_export::CsvReportWriter;
use crate::adapters::email::SmtpDelivery;
use crate::domain::clock::SystemClock;
use config::AppConfig;
use runtime::{
    ReportRun, build_client, build_delivery, generate_invoicing_report, generate_summary_report,
    load_config, with_failure_notice,
};

/// Loads `.env`, reads the configuration and starts logging. Runs before any
/// network call so a bad tariff or missing credential fails fast. A failure
/// here is mailed out when the mail settings themselves parsed.
pub fn start(report: &str) -> Result<(AppConfig, SmtpDelivery, LogGuard), AppError> {
    dotenvy::dotenv().ok();

    let config = load_config(report, AppConfig::from_env, config::mail_settings_from_env)?;
    let delivery = build_delivery(&config);
    let guard = with_failure_notice(&delivery, report, || logging::init(&config.log_dir()))?;

    tracing::info!(
        installation_id = %config.installation_id,
        base_url = %config.zaptec_base_url,
        tariff = %config.tariff,
        report_dir = %config.report_dir.display(),
        log_file = %guard.path().display(),
        environment = %config.environment,
        send_emails = delivery.is_enabled(),
        "application bootstrap initialized"
    );

    Ok((config, delivery, guard))
}

fn report_writer(config: &AppConfig) -> CsvReportWriter {
    CsvReportWriter::new(
        &config.report_dir,
        &config.report_file,
        &config.secondary_report_file,
    )
}

/// Invoicing report, then summary report, sharing one authenticated client.
pub fn run() -> Result<(), AppError> {
    let (config, delivery, _guard) = start("charge")?;

    with_failure_notice(&delivery, "charge", || {
        let mut client = build_client(&config)?;
        let run = ReportRun::previous_month(&config.installation_id, &SystemClock)?;

        generate_invoicing_report(
            &mut client,
            &run,
            config.tariff,
            &report_writer(&config),
            &delivery,
        )?;
        generate_summary_report(&mut client, &run, &delivery)?;
        Ok(())
    })
}

pub fn run_invoicing() -> Result<(), AppError> {
    let (config, delivery, _guard) = start("invoicing")?;

    with_failure_notice(&delivery, "invoicing", || {
        let mut client = build_client(&config)?;
        let run = ReportRun::previous_month(&config.installation_id, &SystemClock)?;

        generate_invoicing_report(
            &mut client,
            &run,
            config.tariff,
            &report_writer(&config),
            &delivery,
        )
        .map(|_| ())
    })
}

pub fn run_summary() -> Result<(), AppError> {
    let (config, delivery, _guard) = start("summary")?;

    with_failure_notice(&delivery, "summary", || {
        let mut client = build_client(&config)?;
        let run = ReportRun::previous_month(&config.installation_id, &SystemClock)?;

        generate_summary_report(&mut client, &run, &delivery).map(|_| ())
    })
}
