//! Async reader and sink contracts.
//!
//! The orchestrator is generic over these traits; the Odoo and Supabase
//! connectors implement them, and tests substitute in-memory fakes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::ConnectorError;
use crate::record::{SourceOrder, SourceOrderLine, SourcePartner, SourcePayment, SourceProduct};
use crate::transaction::CanonicalTransaction;

/// Opaque credential returned by [`SourceReader::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of the order extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders modified strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

/// Partner selection for [`SourceReader::fetch_partners`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerFilter {
    /// Restrict to these ids. `None` selects every partner.
    pub ids: Option<Vec<i64>>,
    pub partner_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl PartnerFilter {
    /// Select exactly the given partner ids.
    #[must_use]
    pub fn by_ids(ids: Vec<i64>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }
}

/// A source row that could not be decoded. The rest of its page is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// Source model the row came from.
    pub model: String,
    pub id: Option<i64>,
    /// Parent order, for rows that reference one.
    pub order_id: Option<i64>,
    /// Modification time, when it could still be read.
    pub write_date: Option<DateTime<Utc>>,
    pub error: ConnectorError,
}

/// Records decoded by one fetch, plus the rows that were rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched<T> {
    pub records: T,
    pub rejected: Vec<RejectedRow>,
}

impl<T> Fetched<T> {
    /// A fetch with no rejected rows.
    #[must_use]
    pub fn new(records: T) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }

    /// Convert the records, keeping the rejections.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            records: f(self.records),
            rejected: self.rejected,
        }
    }
}

/// Read side: the transactional source system.
///
/// Authentication is cached for the lifetime of one reader; repeat calls
/// must not re-authenticate. No method retries internally. A row that
/// fails to decode is returned in [`Fetched::rejected`] instead of failing
/// the whole call.
#[allow(async_fn_in_trait)]
pub trait SourceReader {
    /// Authenticate the session.
    ///
    /// # Errors
    ///
    /// Returns an `auth` [`ConnectorError`] when the credentials are
    /// rejected, or a transport error when the call fails.
    async fn authenticate(&self) -> Result<SessionToken, ConnectorError>;

    /// Fetch one page of terminal-state orders ordered by ascending
    /// modification time.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport failure.
    async fn fetch_orders(
        &self,
        query: &OrderQuery,
    ) -> Result<Fetched<Vec<SourceOrder>>, ConnectorError>;

    /// Fetch the lines of the given orders. Empty input performs no call.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport failure.
    async fn fetch_lines(
        &self,
        order_ids: &[i64],
    ) -> Result<Fetched<Vec<SourceOrderLine>>, ConnectorError>;

    /// Fetch products keyed by id. `None` selects every product.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport failure.
    async fn fetch_products(
        &self,
        ids: Option<&[i64]>,
    ) -> Result<Fetched<HashMap<i64, SourceProduct>>, ConnectorError>;

    /// Fetch partners keyed by id.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport failure.
    async fn fetch_partners(
        &self,
        filter: &PartnerFilter,
    ) -> Result<Fetched<HashMap<i64, SourcePartner>>, ConnectorError>;

    /// Fetch payments keyed by id. Empty input performs no call.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport failure.
    async fn fetch_payments(
        &self,
        ids: &[i64],
    ) -> Result<Fetched<HashMap<i64, SourcePayment>>, ConnectorError>;
}

/// Write side: the layered analytical store.
#[allow(async_fn_in_trait)]
pub trait Sink {
    /// Insert-or-update one batch on the natural key. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] when the batch was not accepted.
    async fn upsert_batch(&self, batch: &[CanonicalTransaction]) -> Result<u64, ConnectorError>;

    /// Derived layers to refresh after a load, in dependency order.
    fn derived_layers(&self) -> Vec<String>;

    /// Trigger the refresh of one derived layer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] when the refresh call fails.
    async fn refresh_layer(&self, layer: &str) -> Result<(), ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_rejected_rows() {
        let fetched = Fetched {
            records: vec![3_i64, 1],
            rejected: vec![RejectedRow {
                model: "pos.order".into(),
                id: Some(2),
                order_id: None,
                write_date: None,
                error: ConnectorError::data("DECODE_FAILED", "bad row"),
            }],
        };
        let mapped = fetched.map(|ids| {
            ids.into_iter()
                .map(|id| (id, ()))
                .collect::<HashMap<_, _>>()
        });
        assert_eq!(mapped.records.len(), 2);
        assert_eq!(mapped.rejected[0].id, Some(2));
        assert!(Fetched::new(Vec::<i64>::new()).rejected.is_empty());
    }
}
