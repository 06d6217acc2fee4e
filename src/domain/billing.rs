use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::aggregation::{FormatError, format_objekt_id, representative_device};
use crate::domain::models::{BillingRow, UserAggregate};
use crate::domain::period::ReportPeriod;

pub const BILLING_ROW_KIND: &str = "LADDPLATS";
pub const BILLING_UNIT: &str = "kWh";

/// Object ids billed to the secondary association, inclusive on both ends.
pub const SECONDARY_RANGE: (&str, &str) = ("G5048", "G5062");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TariffError {
    #[error("tariff must be a number, got {0:?}")]
    NotNumeric(String),
    #[error("tariff must be a finite non-negative number, got {0}")]
    OutOfRange(String),
}

/// Price per kWh for one billing period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff(f64);

impl Tariff {
    pub fn new(value: f64) -> Result<Self, TariffError> {
        if !value.is_finite() || value < 0.0 {
            return Err(TariffError::OutOfRange(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn per_kwh(self) -> f64 {
        self.0
    }
}

impl FromStr for Tariff {
    type Err = TariffError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| TariffError::NotNumeric(raw.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds one billing row per user, sorted by object id (email breaks ties).
/// Numeric columns are not rounded here; see [`round_for_output`].
pub fn build_billing_rows(
    aggregates: &[UserAggregate],
    period: &ReportPeriod,
    tariff: Tariff,
) -> Result<Vec<BillingRow>, FormatError> {
    let mut keyed = aggregates
        .iter()
        .map(|user| {
            let objekt_id = format_objekt_id(representative_device(user)?)?;
            Ok((
                user.email.as_str(),
                BillingRow {
                    objekt_id,
                    period_start: period.start_date(),
                    period_end: period.end_date(),
                    kind: BILLING_ROW_KIND,
                    opening_value: 0.0,
                    closing_value: user.energy_kwh,
                    consumption: user.energy_kwh,
                    cost: user.energy_kwh * tariff.per_kwh(),
                    tariff: tariff.per_kwh(),
                    unit: BILLING_UNIT,
                    comment: format!(
                        "{}({}), Total laddtid: {:?}",
                        user.display_name, user.email, user.duration_hours
                    ),
                },
            ))
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    keyed.sort_by(|(left_email, left), (right_email, right)| {
        left.objekt_id
            .cmp(&right.objekt_id)
            .then_with(|| left_email.cmp(right_email))
    });

    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

pub fn is_secondary(objekt_id: &str) -> bool {
    let (low, high) = SECONDARY_RANGE;
    low <= objekt_id && objekt_id <= high
}

/// Splits rows into (primary, secondary) keeping the input order.
pub fn partition(rows: Vec<BillingRow>) -> (Vec<BillingRow>, Vec<BillingRow>) {
    let (secondary, primary): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|row| is_secondary(&row.objekt_id));
    (primary, secondary)
}

pub fn round_for_output(mut row: BillingRow) -> BillingRow {
    row.closing_value = round2(row.closing_value);
    row.consumption = round2(row.consumption);
    row.cost = round2(row.cost);
    row.tariff = round2(row.tariff);
    row
}

/// Two decimals, exact halves to the even cent.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
