//! [`SourceReader`] implementation over Odoo's point-of-sale models.

use std::collections::HashMap;

use scout_types::connector::{Fetched, OrderQuery, PartnerFilter, SessionToken, SourceReader};
use scout_types::error::ConnectorError;
use scout_types::record::{
    SourceOrder, SourceOrderLine, SourcePartner, SourcePayment, SourceProduct,
};
use serde_json::Value;

use crate::client::OdooClient;
use crate::config::Config;
use crate::decode;
use crate::query::{
    Domain, SearchRead, LINE_FIELDS, LINE_MODEL, ORDER_FIELDS, ORDER_MODEL, PARTNER_FIELDS,
    PARTNER_MODEL, PAYMENT_FIELDS, PAYMENT_MODEL, PRODUCT_FIELDS, PRODUCT_MODEL,
};

/// Ascending modification time, id as tiebreaker so offset paging is stable.
const ORDER_SORT: &str = "write_date asc, id asc";

pub struct OdooSource {
    client: OdooClient,
    order_states: Vec<String>,
    page_size: usize,
    brand_field: Option<String>,
}

impl OdooSource {
    /// Build a reader from config.
    ///
    /// # Errors
    ///
    /// Returns a `config` error when the config is invalid.
    pub fn new(config: &Config) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: OdooClient::new(config)?,
            order_states: config.order_states.clone(),
            page_size: config.dimension_page_size,
            brand_field: config.brand_field.clone(),
        })
    }

    fn order_request(&self, query: &OrderQuery) -> SearchRead {
        let mut domain = Domain::new().one_of("state", self.order_states.iter().cloned());
        if let Some(since) = query.since {
            domain = domain.modified_after("write_date", since);
        }
        SearchRead::new(ORDER_MODEL, domain, ORDER_FIELDS)
            .page(query.limit, query.offset)
            .ordered_by(ORDER_SORT)
    }

    fn product_request(&self, domain: Domain) -> SearchRead {
        let request = SearchRead::new(PRODUCT_MODEL, domain, PRODUCT_FIELDS);
        match &self.brand_field {
            Some(field) => request.with_field(field),
            None => request,
        }
    }

    /// Look up records by id in chunks of `page_size`.
    async fn read_by_ids<F>(&self, ids: &[i64], build: F) -> Result<Vec<Value>, ConnectorError>
    where
        F: Fn(&[i64]) -> SearchRead,
    {
        let ids = unique_ids(ids);
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.page_size) {
            rows.extend(self.client.search_read(&build(chunk)).await?);
        }
        Ok(rows)
    }
}

fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Archived records are still resolvable when looked up by id.
fn including_archived(domain: Domain) -> Domain {
    domain.one_of("active", [true, false])
}

impl SourceReader for OdooSource {
    async fn authenticate(&self) -> Result<SessionToken, ConnectorError> {
        let uid = self.client.uid().await?;
        Ok(SessionToken::new(uid.to_string()))
    }

    async fn fetch_orders(
        &self,
        query: &OrderQuery,
    ) -> Result<Fetched<Vec<SourceOrder>>, ConnectorError> {
        let rows = self.client.search_read(&self.order_request(query)).await?;
        Ok(decode::orders(rows))
    }

    async fn fetch_lines(
        &self,
        order_ids: &[i64],
    ) -> Result<Fetched<Vec<SourceOrderLine>>, ConnectorError> {
        if order_ids.is_empty() {
            return Ok(Fetched::default());
        }
        let rows = self
            .read_by_ids(order_ids, |chunk| {
                SearchRead::new(
                    LINE_MODEL,
                    Domain::new().one_of("order_id", chunk.iter().copied()),
                    LINE_FIELDS,
                )
            })
            .await?;
        Ok(decode::lines(rows))
    }

    async fn fetch_products(
        &self,
        ids: Option<&[i64]>,
    ) -> Result<Fetched<HashMap<i64, SourceProduct>>, ConnectorError> {
        let rows = match ids {
            None => self.client.search_read(&self.product_request(Domain::new())).await?,
            Some([]) => return Ok(Fetched::default()),
            Some(ids) => {
                self.read_by_ids(ids, |chunk| {
                    self.product_request(including_archived(
                        Domain::new().one_of("id", chunk.iter().copied()),
                    ))
                })
                .await?
            }
        };
        let products = decode::products(rows, self.brand_field.as_deref());
        Ok(products.map(|records| records.into_iter().map(|p| (p.id, p)).collect()))
    }

    async fn fetch_partners(
        &self,
        filter: &PartnerFilter,
    ) -> Result<Fetched<HashMap<i64, SourcePartner>>, ConnectorError> {
        let mut base = Domain::new();
        if let Some(partner_type) = &filter.partner_type {
            base = base.equals("type", partner_type.as_str());
        }
        if let Some(since) = filter.since {
            base = base.modified_after("write_date", since);
        }
        let rows = match filter.ids.as_deref() {
            None => {
                self.client
                    .search_read(&SearchRead::new(PARTNER_MODEL, base, PARTNER_FIELDS))
                    .await?
            }
            Some([]) => return Ok(Fetched::default()),
            Some(ids) => {
                self.read_by_ids(ids, |chunk| {
                    SearchRead::new(
                        PARTNER_MODEL,
                        including_archived(base.clone().one_of("id", chunk.iter().copied())),
                        PARTNER_FIELDS,
                    )
                })
                .await?
            }
        };
        let partners = decode::partners(rows);
        Ok(partners.map(|records| records.into_iter().map(|p| (p.id, p)).collect()))
    }

    async fn fetch_payments(
        &self,
        ids: &[i64],
    ) -> Result<Fetched<HashMap<i64, SourcePayment>>, ConnectorError> {
        if ids.is_empty() {
            return Ok(Fetched::default());
        }
        let rows = self
            .read_by_ids(ids, |chunk| {
                SearchRead::new(
                    PAYMENT_MODEL,
                    Domain::new().one_of("id", chunk.iter().copied()),
                    PAYMENT_FIELDS,
                )
            })
            .await?;
        let payments = decode::payments(rows);
        Ok(payments.map(|records| records.into_iter().map(|p| (p.id, p)).collect()))
    }
}
