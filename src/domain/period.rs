use chrono::{Datelike, Months, NaiveDate};

/// A calendar month billing window, from `00:00:00.001` on the first day to
/// `23:59:59.999` on the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    first_day: NaiveDate,
    last_day: NaiveDate,
}

impl ReportPeriod {
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last_day = first_day.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self {
            first_day,
            last_day,
        })
    }

    pub fn previous_month(today: NaiveDate) -> Option<Self> {
        let last_of_previous = today.with_day(1)?.pred_opt()?;
        Self::for_month(last_of_previous.year(), last_of_previous.month())
    }

    /// Start instant with a `Z` suffix, as the charge history endpoint wants.
    pub fn from_utc(&self) -> String {
        format!("{}Z", self.from_local())
    }

    pub fn to_utc(&self) -> String {
        format!("{}Z", self.to_local())
    }

    /// Start instant without a zone suffix, as the installation report wants.
    pub fn from_local(&self) -> String {
        format!("{}T00:00:00.001", self.start_date())
    }

    pub fn to_local(&self) -> String {
        format!("{}T23:59:59.999", self.end_date())
    }

    pub fn start_date(&self) -> String {
        self.first_day.format("%Y-%m-%d").to_string()
    }

    pub fn end_date(&self) -> String {
        self.last_day.format("%Y-%m-%d").to_string()
    }

    pub fn month_name(&self) -> String {
        self.first_day.format("%B").to_string()
    }
}
