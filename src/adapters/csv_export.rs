use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::models::BillingRow;

pub const BILLING_HEADER: [&str; 11] = [
    "Objekt-ID",
    "Fr.o.m. datum",
    "T.o.m. datum",
    "Typ",
    "Startvärde",
    "Slutvärde",
    "Förbrukning",
    "Kostnad",
    "Tariff",
    "Enhet",
    "Kommentar",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode csv for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub primary: PathBuf,
    pub secondary: PathBuf,
}

impl WrittenReport {
    pub fn files(&self) -> Vec<PathBuf> {
        vec![self.primary.clone(), self.secondary.clone()]
    }
}

#[derive(Debug, Clone)]
pub struct CsvReportWriter {
    report_dir: PathBuf,
    primary_stem: String,
    secondary_stem: String,
}

impl CsvReportWriter {
    pub fn new(report_dir: impl Into<PathBuf>, primary_stem: &str, secondary_stem: &str) -> Self {
        Self {
            report_dir: report_dir.into(),
            primary_stem: primary_stem.to_string(),
            secondary_stem: secondary_stem.to_string(),
        }
    }

    pub fn primary_path(&self, date_stamp: &str) -> PathBuf {
        self.report_dir
            .join(format!("{}_{date_stamp}.csv", self.primary_stem))
    }

    pub fn secondary_path(&self, date_stamp: &str) -> PathBuf {
        self.report_dir
            .join(format!("{}_{date_stamp}.csv", self.secondary_stem))
    }

    /// Writes both partitions. Rows are expected to be rounded already.
    pub fn write_partitions(
        &self,
        primary: &[BillingRow],
        secondary: &[BillingRow],
        date_stamp: &str,
    ) -> Result<WrittenReport, ExportError> {
        fs::create_dir_all(&self.report_dir).map_err(|source| ExportError::Io {
            path: self.report_dir.clone(),
            source,
        })?;

        let report = WrittenReport {
            primary: self.primary_path(date_stamp),
            secondary: self.secondary_path(date_stamp),
        };
        write_billing_csv(&report.primary, primary)?;
        write_billing_csv(&report.secondary, secondary)?;

        Ok(report)
    }
}

/// Writes to a sibling temp file first and renames it into place, so a
/// failed export never leaves a half-written report behind.
pub fn write_billing_csv(path: &Path, rows: &[BillingRow]) -> Result<(), ExportError> {
    let temp_path = path.with_extension("csv.tmp");
    let csv_error = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let result = (|| -> Result<(), ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&temp_path)
            .map_err(csv_error)?;

        writer.write_record(BILLING_HEADER).map_err(csv_error)?;
        for row in rows {
            writer.write_record(billing_record(row)).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: temp_path.clone(),
            source,
        })?;
        drop(writer);

        fs::rename(&temp_path, path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    } else {
        tracing::info!(path = %path.display(), rows = rows.len(), "exported csv report");
    }
    result
}

fn billing_record(row: &BillingRow) -> [String; 11] {
    [
        row.objekt_id.clone(),
        row.period_start.clone(),
        row.period_end.clone(),
        row.kind.to_string(),
        format_number(row.opening_value),
        format_number(row.closing_value),
        format_number(row.consumption),
        format_number(row.cost),
        format_number(row.tariff),
        row.unit.to_string(),
        row.comment.clone(),
    ]
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value:.2}")
    }
}
