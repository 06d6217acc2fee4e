//! Checks the live Zaptec contract for the previous month without writing or
//! sending any report.

use zaptec_charge_report::adapters::zaptec_client::ZaptecClient;
use zaptec_charge_report::adapters::zaptec_http::ZaptecTransport;
use zaptec_charge_report::app::runtime::{ReportRun, build_client};
use zaptec_charge_report::app::{AppError, start};
use zaptec_charge_report::domain::aggregation::{aggregate, format_objekt_id, representative_device};
use zaptec_charge_report::domain::clock::{Clock, SystemClock};

fn main() {
    if let Err(err) = run() {
        eprintln!("[{}] FAILED: {err}", SystemClock.now().to_datetime().to_rfc3339());
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let (config, _delivery, _guard) = start("smoke check")?;
    let mut client = build_client(&config)?;
    let run = ReportRun::previous_month(&config.installation_id, &SystemClock)?;

    println!(
        "Checking installation {} for {} - {}",
        run.installation_id,
        run.period.start_date(),
        run.period.end_date()
    );

    check_charge_history(&mut client, &run)?;
    check_installation_report(&mut client, &run)?;

    if let Some(token) = client.tokens().token() {
        println!("  token valid until {}", token.expires_at().to_datetime().to_rfc3339());
    }
    Ok(())
}

fn check_charge_history<T, C>(client: &mut ZaptecClient<T, C>, run: &ReportRun) -> Result<(), AppError>
where
    T: ZaptecTransport,
    C: Clock,
{
    let fetch = client.fetch_sessions(
        &run.installation_id,
        &run.period.from_utc(),
        &run.period.to_utc(),
    )?;

    println!("Charge history");
    println!("  pages: {}", fetch.page_count);
    println!("  records: {}", fetch.fetched);
    println!("  guest sessions dropped: {}", fetch.dropped_guests);

    let users = aggregate(&fetch.sessions)?;
    println!("  users: {}", users.len());
    for user in &users {
        let objekt_id = representative_device(user).and_then(format_objekt_id);
        match objekt_id {
            Ok(objekt_id) => println!(
                "    {objekt_id} {} sessions={} energy={:.2} kWh",
                user.email, user.session_count, user.energy_kwh
            ),
            Err(err) => println!("    {} UNMAPPED: {err}", user.email),
        }
    }
    Ok(())
}

fn check_installation_report<T, C>(
    client: &mut ZaptecClient<T, C>,
    run: &ReportRun,
) -> Result<(), AppError>
where
    T: ZaptecTransport,
    C: Clock,
{
    let rows = client.fetch_installation_summary(
        &run.installation_id,
        &run.period.from_local(),
        &run.period.to_local(),
    )?;

    println!("Installation report");
    println!("  rows: {}", rows.len());
    for row in &rows {
        println!(
            "    {} sessions={} energy={:.2} kWh duration={:.2} h",
            row.group_label.as_deref().unwrap_or("<no label>"),
            row.session_count,
            row.total_energy_kwh,
            row.total_duration_hours
        );
    }
    Ok(())
}
