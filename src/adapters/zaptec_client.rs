use serde_json::Value;
use thiserror::Error;

use crate::adapters::token::{AuthError, TokenManager};
use crate::adapters::zaptec_http::{
    ChargeHistoryQuery, InstallationReportRequest, TransportError, ZaptecTransport,
};
use crate::domain::clock::Clock;
use crate::domain::models::{ChargingSession, InstallationReportRow};
use crate::domain::zaptec_payload::{PayloadError, parse_installation_report, parse_session_page};

pub const DEFAULT_MAX_PAGES: u32 = 500;
/// Summary detail level; the full level adds the signed meter payload.
const CHARGE_HISTORY_DETAIL_LEVEL: u8 = 0;
const GROUP_BY_USER: u8 = 0;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to fetch charge history page {page_index}: {source}")]
    Page {
        page_index: u32,
        #[source]
        source: TransportError,
    },
    #[error("charge history page {page_index} is malformed: {source}")]
    InvalidPage {
        page_index: u32,
        #[source]
        source: PayloadError,
    },
    #[error("charge history declares {declared} pages; refusing more than {max}")]
    PageLimitExceeded { declared: u32, max: u32 },
    #[error("failed to fetch installation report: {0}")]
    Summary(#[source] TransportError),
    #[error("installation report is malformed: {0}")]
    InvalidSummary(#[source] PayloadError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFetch {
    pub sessions: Vec<ChargingSession>,
    pub page_count: u32,
    pub fetched: usize,
    pub dropped_guests: usize,
}

/// Authenticated Zaptec client. One instance is meant to be passed down a
/// single call chain; token state is not synchronized.
#[derive(Debug)]
pub struct ZaptecClient<T, C> {
    transport: T,
    tokens: TokenManager<C>,
    max_pages: u32,
    exclude_guests: bool,
}

impl<T, C> ZaptecClient<T, C>
where
    T: ZaptecTransport,
    C: Clock,
{
    pub fn new(transport: T, tokens: TokenManager<C>) -> Self {
        Self {
            transport,
            tokens,
            max_pages: DEFAULT_MAX_PAGES,
            exclude_guests: true,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_guest_filter(mut self, exclude_guests: bool) -> Self {
        self.exclude_guests = exclude_guests;
        self
    }

    pub fn tokens(&self) -> &TokenManager<C> {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn bearer(&mut self) -> Result<String, AuthError> {
        let token = self.tokens.ensure_valid_token(&self.transport)?;
        Ok(token.bearer().to_string())
    }

    /// Fetches every charge history page for the range. `from` and `to` are
    /// UTC timestamps with a `Z` suffix.
    pub fn fetch_sessions(
        &mut self,
        installation_id: &str,
        from: &str,
        to: &str,
    ) -> Result<SessionFetch, RetrievalError> {
        let mut page_index = 0_u32;
        let mut page_count = 1_u32;
        let mut sessions = Vec::new();

        while page_index < page_count {
            let bearer = self.bearer()?;
            let query = ChargeHistoryQuery {
                installation_id,
                from,
                to,
                detail_level: CHARGE_HISTORY_DETAIL_LEVEL,
                page_index,
            };

            let payload = self
                .transport
                .get_charge_history(&bearer, &query)
                .map_err(|source| RetrievalError::Page { page_index, source })?;
            let page = parse_session_page(payload)
                .map_err(|source| RetrievalError::InvalidPage { page_index, source })?;

            if page.pages > self.max_pages {
                return Err(RetrievalError::PageLimitExceeded {
                    declared: page.pages,
                    max: self.max_pages,
                });
            }
            if page_index > 0 && page.pages != page_count {
                tracing::warn!(
                    page_index,
                    previous = page_count,
                    declared = page.pages,
                    "charge history page count changed during retrieval"
                );
            }

            tracing::debug!(
                page_index,
                page_count = page.pages,
                records = page.sessions.len(),
                "charge history page fetched"
            );

            sessions.extend(page.sessions);
            page_count = page.pages;
            page_index += 1;
        }

        let fetched = sessions.len();
        if self.exclude_guests {
            sessions.retain(|session| !session.is_guest());
        }
        let dropped_guests = fetched - sessions.len();

        tracing::info!(
            installation_id,
            page_count,
            fetched,
            dropped_guests,
            "charge history retrieved"
        );

        Ok(SessionFetch {
            sessions,
            page_count,
            fetched,
            dropped_guests,
        })
    }

    /// Fetches the per-user installation report. `from` and `to` carry no
    /// zone suffix.
    pub fn fetch_installation_summary(
        &mut self,
        installation_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<InstallationReportRow>, RetrievalError> {
        let bearer = self.bearer()?;
        let request = InstallationReportRequest {
            from_date: from,
            end_date: to,
            installation_id,
            group_by: GROUP_BY_USER,
        };

        let payload = self
            .transport
            .post_installation_report(&bearer, &request)
            .map_err(RetrievalError::Summary)?;
        let rows = parse_installation_report(&payload).map_err(RetrievalError::InvalidSummary)?;

        let rows = drop_unknown_leading_row(rows);
        tracing::info!(installation_id, rows = rows.len(), "installation report retrieved");
        Ok(rows)
    }
}

/// The upstream aggregator sometimes puts an "unknown session" row first,
/// with neither a group label nor user details. Only that first row is
/// dropped.
fn drop_unknown_leading_row(rows: Vec<(InstallationReportRow, Value)>) -> Vec<InstallationReportRow> {
    let mut rows = rows.into_iter();
    let mut kept = Vec::with_capacity(rows.len());

    if let Some((first, raw)) = rows.next() {
        let unlabeled = first
            .group_label
            .as_deref()
            .map(|label| label.trim().is_empty())
            .unwrap_or(true);

        if unlabeled && first.user_details.is_none() {
            tracing::warn!(payload = %raw, "dropping unknown leading installation report row");
        } else {
            kept.push(first);
        }
    }

    kept.extend(rows.map(|(row, _)| row));
    kept
}
