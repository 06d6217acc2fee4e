use crate::domain::billing::round2;
use crate::domain::models::InstallationReportRow;

pub const TOTAL_LABEL: &str = "TOTAL";
pub const TOTAL_EMAIL_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub user_name: String,
    pub email: Option<String>,
    pub energy_kwh: f64,
    pub duration_hours: f64,
    pub sessions: u64,
}

/// Per-user lines followed by a TOTAL line. Energy and duration are rounded
/// to two decimals per line before summing.
pub fn build_summary(rows: &[InstallationReportRow]) -> Vec<SummaryLine> {
    let mut lines: Vec<SummaryLine> = rows
        .iter()
        .map(|row| SummaryLine {
            user_name: row
                .group_label
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            email: row.user_details.as_ref().map(|details| details.email.clone()),
            energy_kwh: round2(row.total_energy_kwh),
            duration_hours: round2(row.total_duration_hours),
            sessions: u64::from(row.session_count),
        })
        .collect();

    let total = SummaryLine {
        user_name: TOTAL_LABEL.to_string(),
        email: Some(TOTAL_EMAIL_PLACEHOLDER.to_string()),
        energy_kwh: round2(lines.iter().map(|line| line.energy_kwh).sum()),
        duration_hours: round2(lines.iter().map(|line| line.duration_hours).sum()),
        sessions: lines.iter().map(|line| line.sessions).sum(),
    };
    lines.push(total);
    lines
}

pub fn render_html(month_name: &str, lines: &[SummaryLine]) -> String {
    let mut body = format!(
        "<h3>Summering av laddel för {}</h3><br/>",
        escape_html(month_name)
    );
    body.push_str("<table border=\"1\">");
    body.push_str(
        "<thead><tr><th>user_name</th><th>email</th><th>energy</th><th>duration</th><th>sessions</th></tr></thead>",
    );
    body.push_str("<tbody>");
    for line in lines {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td></tr>",
            escape_html(&line.user_name),
            escape_html(line.email.as_deref().unwrap_or("")),
            line.energy_kwh,
            line.duration_hours,
            line.sessions
        ));
    }
    body.push_str("</tbody></table>");
    body
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
