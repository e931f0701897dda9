//! Sync orchestrator: one run of extract → transform → load → refresh →
//! checkpoint for a single stream.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use scout_state::CheckpointStore;
use scout_types::connector::{
    Fetched, OrderQuery, PartnerFilter, RejectedRow, Sink, SourceReader,
};
use scout_types::record::{SourceOrder, SourceOrderLine};
use scout_types::state::{RunStatus, StreamId};
use scout_types::transaction::CanonicalTransaction;

use crate::checkpoint::{advance_watermark, persist_checkpoint, settled_watermark};
use crate::config::types::{SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_STREAM};
use crate::config::validator::validate_config;
use crate::errors::PipelineError;
use crate::execution::{ExecutionOptions, SyncPhase};
use crate::loader::{load_batches, refresh_derived};
use crate::resolve::build_orchestrator;
use crate::result::{RecordedError, SyncOutcome};
use crate::retry::with_retry;
use crate::transform::{transform_order, Dimensions, TransformPolicy};

/// Per-stream run settings derived from [`SyncConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub stream: StreamId,
    pub batch_size: usize,
    pub max_retries: u32,
    pub policy: TransformPolicy,
}

impl SyncSettings {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            stream: StreamId::new(config.stream.clone()),
            batch_size: config.resources.batch_size,
            max_retries: config.resources.max_retries,
            policy: TransformPolicy::from_config(&config.transform),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            stream: StreamId::new(DEFAULT_STREAM),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 3,
            policy: TransformPolicy::default(),
        }
    }
}

/// Drives one stream through the sync state machine.
pub struct Orchestrator<R, S, C> {
    source: R,
    sink: S,
    store: C,
    settings: SyncSettings,
}

impl<R, S, C> Orchestrator<R, S, C>
where
    R: SourceReader,
    S: Sink,
    C: CheckpointStore,
{
    pub fn new(source: R, sink: S, store: C, settings: SyncSettings) -> Self {
        Self {
            source,
            sink,
            store,
            settings,
        }
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Execute one run. Fatal errors end in [`RunStatus::Failed`] rather than
    /// an `Err`; the run is logged either way.
    pub async fn run(&self, options: &ExecutionOptions) -> SyncOutcome {
        let stream = self.settings.stream.clone();
        let mut outcome = SyncOutcome::new(stream.clone(), Utc::now());
        tracing::info!(
            stream = %stream,
            full_resync = options.full_resync,
            dry_run = options.dry_run,
            "Starting sync run"
        );

        if let Err(err) = self.execute(options, &mut outcome).await {
            let failed_in = outcome.phase;
            self.log_failure(&err, failed_in);
            outcome.record_error(RecordedError {
                phase: failed_in,
                order_id: None,
                message: err.to_string(),
            });
            outcome.status = RunStatus::Failed;
            outcome.watermark_after = outcome.watermark_before;
            self.enter(&mut outcome, SyncPhase::Failed);
        }
        outcome.completed_at = Utc::now();

        if let Err(e) = self.store.append_run_log(&outcome.to_run_log()).await {
            tracing::error!(stream = %stream, error = %e, "Failed to record run log");
            outcome.record_error(RecordedError {
                phase: outcome.phase,
                order_id: None,
                message: format!("run log not recorded: {e}"),
            });
        }

        tracing::info!(
            stream = %stream,
            status = %outcome.status,
            fetched = outcome.counts.fetched,
            transformed = outcome.counts.transformed,
            loaded = outcome.counts.loaded,
            errors = outcome.error_count,
            "Sync run finished"
        );
        outcome
    }

    async fn execute(
        &self,
        options: &ExecutionOptions,
        outcome: &mut SyncOutcome,
    ) -> Result<(), PipelineError> {
        let stream = &self.settings.stream;
        let max_retries = self.settings.max_retries;
        let batch_size = options.batch_size.unwrap_or(self.settings.batch_size);
        if batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be at least 1".into()));
        }
        let finished = if options.dry_run {
            RunStatus::DryRun
        } else {
            RunStatus::Success
        };

        self.enter(outcome, SyncPhase::Authenticating);
        with_retry("authenticate", max_retries, || self.source.authenticate()).await?;
        tracing::info!(stream = %stream, "Source authentication successful");

        self.enter(outcome, SyncPhase::ExtractingOrders);
        let stored = self
            .store
            .get_checkpoint(stream)
            .await?
            .and_then(|c| c.watermark);
        outcome.watermark_before = stored;
        let since = if options.full_resync { None } else { stored };
        match since {
            Some(since) => tracing::info!(stream = %stream, since = %since, "Incremental sync"),
            None => {
                tracing::info!(stream = %stream, "No watermark in use, syncing from the beginning");
            }
        }
        let (fetched, open_group) = self.fetch_orders(since, batch_size).await?;
        let orders = fetched.records;
        self.record_rejected(outcome, SyncPhase::ExtractingOrders, &fetched.rejected, |r| r.id);
        outcome.counts.fetched = (orders.len() + fetched.rejected.len()) as u64;
        tracing::info!(
            stream = %stream,
            orders = orders.len(),
            rejected = fetched.rejected.len(),
            "Fetched orders"
        );
        if let Some(open_group) = open_group {
            tracing::info!(
                stream = %stream,
                write_date = %open_group,
                "Page filled up; orders at its last write_date are settled next run"
            );
        }

        if orders.is_empty() {
            tracing::info!(stream = %stream, "No new orders to sync");
            outcome.status = finished;
            outcome.watermark_after = stored;
            self.enter(outcome, SyncPhase::Done);
            return Ok(());
        }

        self.enter(outcome, SyncPhase::ExtractingDimensions);
        let (lines, dims, broken) = self.extract_dimensions(&orders, outcome).await?;

        self.enter(outcome, SyncPhase::Transforming);
        let synced_at = Utc::now();
        let (records, succeeded) =
            self.transform(&orders, &broken, lines, &dims, synced_at, outcome);
        let computed = settled_watermark(succeeded, open_group);
        outcome.counts.transformed = records.len() as u64;
        tracing::info!(
            stream = %stream,
            transactions = records.len(),
            failed_orders = outcome.error_count,
            "Transformed orders"
        );

        if options.dry_run {
            tracing::info!(stream = %stream, "Dry run: skipping writes and checkpoint");
            outcome.status = RunStatus::DryRun;
            outcome.watermark_after = stored;
            self.enter(outcome, SyncPhase::Done);
            return Ok(());
        }

        self.enter(outcome, SyncPhase::Loading);
        match load_batches(&self.sink, &records, batch_size, max_retries).await {
            Ok(loaded) => outcome.counts.loaded = loaded,
            Err(failure) => {
                outcome.counts.loaded = failure.loaded;
                tracing::error!(
                    stream = %stream,
                    batch = failure.batch_index,
                    loaded = failure.loaded,
                    "Sink batch failed"
                );
                return Err(failure.source.into());
            }
        }
        tracing::info!(stream = %stream, loaded = outcome.counts.loaded, "Loaded transactions");

        self.enter(outcome, SyncPhase::RefreshingDerived);
        outcome.refresh = refresh_derived(&self.sink).await;

        self.enter(outcome, SyncPhase::CheckpointAdvance);
        let advance = advance_watermark(stored, computed);
        outcome.watermark_after =
            persist_checkpoint(&self.store, stream, advance, outcome.counts.loaded).await?;

        outcome.status = RunStatus::Success;
        self.enter(outcome, SyncPhase::Done);
        Ok(())
    }

    /// Page through orders modified after `since`. Pages continue while
    /// everything fetched so far shares one `write_date`; otherwise one page
    /// is taken. Also returns that page's last `write_date` when the page was
    /// full, since more orders at that instant may follow it.
    async fn fetch_orders(
        &self,
        since: Option<DateTime<Utc>>,
        batch_size: usize,
    ) -> Result<(Fetched<Vec<SourceOrder>>, Option<DateTime<Utc>>), PipelineError> {
        let max_retries = self.settings.max_retries;
        let mut fetched = Fetched::<Vec<SourceOrder>>::default();
        let mut offset = 0;
        loop {
            let query = OrderQuery {
                since,
                limit: batch_size,
                offset,
            };
            let page =
                with_retry("fetch_orders", max_retries, || self.source.fetch_orders(&query))
                    .await?;
            let full = page.records.len() + page.rejected.len() >= batch_size;
            fetched.records.extend(page.records);
            fetched.rejected.extend(page.rejected);
            if !full {
                return Ok((fetched, None));
            }

            let write_dates: BTreeSet<DateTime<Utc>> = fetched
                .records
                .iter()
                .filter_map(|o| o.write_date)
                .chain(fetched.rejected.iter().filter_map(|r| r.write_date))
                .collect();
            if write_dates.len() > 1 {
                let last = write_dates.last().copied();
                return Ok((fetched, last));
            }
            offset += batch_size;
            tracing::debug!(offset, "Page shares a single write_date, fetching the next one");
        }
    }

    /// Fetch lines, then products, partners, and payments concurrently.
    /// Also returns the orders with an undecodable line; those are recorded
    /// as errors and must not be transformed from their remaining lines.
    async fn extract_dimensions(
        &self,
        orders: &[SourceOrder],
        outcome: &mut SyncOutcome,
    ) -> Result<(Vec<SourceOrderLine>, Dimensions, BTreeSet<i64>), PipelineError> {
        let max_retries = self.settings.max_retries;
        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let fetched =
            with_retry("fetch_lines", max_retries, || self.source.fetch_lines(&order_ids)).await?;
        let broken: BTreeSet<i64> = fetched.rejected.iter().filter_map(|r| r.order_id).collect();
        let lines: Vec<SourceOrderLine> = fetched
            .records
            .into_iter()
            .filter(|l| !broken.contains(&l.order_id))
            .collect();
        self.record_rejected(outcome, SyncPhase::ExtractingDimensions, &fetched.rejected, |r| {
            r.order_id
        });

        let product_ids: Vec<i64> = lines
            .iter()
            .filter_map(|l| l.product.as_ref().map(|p| p.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let partner_ids: Vec<i64> = orders
            .iter()
            .filter_map(|o| o.partner.as_ref().map(|p| p.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let payment_ids: Vec<i64> = orders
            .iter()
            .flat_map(|o| o.payment_ids.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let partner_filter = PartnerFilter::by_ids(partner_ids);

        let (products, partners, payments) = tokio::try_join!(
            with_retry("fetch_products", max_retries, || {
                self.source.fetch_products(Some(&product_ids))
            }),
            with_retry("fetch_partners", max_retries, || {
                self.source.fetch_partners(&partner_filter)
            }),
            with_retry("fetch_payments", max_retries, || {
                self.source.fetch_payments(&payment_ids)
            }),
        )?;
        for rejected in [&products.rejected, &partners.rejected, &payments.rejected] {
            self.record_rejected(outcome, SyncPhase::ExtractingDimensions, rejected, |_| None);
        }
        let (products, partners, payments) = (products.records, partners.records, payments.records);
        tracing::info!(
            lines = lines.len(),
            products = products.len(),
            partners = partners.len(),
            payments = payments.len(),
            "Fetched dimensions"
        );
        let dims = Dimensions {
            products,
            partners,
            payments,
        };
        Ok((lines, dims, broken))
    }

    /// Transform every order, isolating failures per order. Returns the
    /// records and the `write_date`s of the orders that succeeded. Orders in
    /// `skip` already failed extraction.
    fn transform(
        &self,
        orders: &[SourceOrder],
        skip: &BTreeSet<i64>,
        lines: Vec<SourceOrderLine>,
        dims: &Dimensions,
        synced_at: DateTime<Utc>,
        outcome: &mut SyncOutcome,
    ) -> (Vec<CanonicalTransaction>, Vec<Option<DateTime<Utc>>>) {
        let mut lines_by_order: HashMap<i64, Vec<SourceOrderLine>> = HashMap::new();
        for line in lines {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        let mut records = Vec::new();
        let mut succeeded = Vec::with_capacity(orders.len());
        for order in orders.iter().filter(|o| !skip.contains(&o.id)) {
            let order_lines = lines_by_order.get(&order.id).map_or(&[][..], Vec::as_slice);
            match transform_order(order, order_lines, dims, &self.settings.policy, synced_at) {
                Ok(txs) => {
                    records.extend(txs);
                    succeeded.push(order.write_date);
                }
                Err(e) => {
                    tracing::warn!(order_id = order.id, error = %e, "Skipping order");
                    outcome.record_error(RecordedError {
                        phase: SyncPhase::Transforming,
                        order_id: Some(order.id),
                        message: e.to_string(),
                    });
                }
            }
        }
        (records, succeeded)
    }

    fn record_rejected(
        &self,
        outcome: &mut SyncOutcome,
        phase: SyncPhase,
        rejected: &[RejectedRow],
        order_of: impl Fn(&RejectedRow) -> Option<i64>,
    ) {
        for row in rejected {
            let id = row.id.map_or_else(|| "?".to_owned(), |id| id.to_string());
            outcome.record_error(RecordedError {
                phase,
                order_id: order_of(row),
                message: format!("{} {id} rejected: {}", row.model, row.error),
            });
        }
    }

    fn enter(&self, outcome: &mut SyncOutcome, phase: SyncPhase) {
        tracing::debug!(
            stream = %self.settings.stream,
            from = %outcome.phase,
            to = %phase,
            "Phase transition"
        );
        outcome.phase = phase;
    }

    fn log_failure(&self, err: &PipelineError, phase: SyncPhase) {
        let stream = &self.settings.stream;
        match err.as_connector_error() {
            Some(e) => tracing::error!(
                stream = %stream,
                phase = %phase,
                category = %e.category,
                code = %e.code,
                retryable = e.retryable,
                "Sync failed: {}",
                e.message
            ),
            None => tracing::error!(stream = %stream, phase = %phase, "Sync failed: {err}"),
        }
    }
}

/// Validate `config`, build the production connectors, and run once.
/// Configuration and construction failures produce a failed outcome.
pub async fn run_sync(config: &SyncConfig, options: &ExecutionOptions) -> SyncOutcome {
    let prepared = validate_config(config)
        .map_err(|e| PipelineError::Config(format!("{e:#}")))
        .and_then(|()| build_orchestrator(config));
    match prepared {
        Ok(orchestrator) => orchestrator.run(options).await,
        Err(err) => {
            tracing::error!(error = %err, "Sync could not start");
            let mut outcome = SyncOutcome::new(StreamId::new(config.stream.clone()), Utc::now());
            outcome.record_error(RecordedError {
                phase: SyncPhase::Idle,
                order_id: None,
                message: err.to_string(),
            });
            outcome.phase = SyncPhase::Failed;
            outcome
        }
    }
}
