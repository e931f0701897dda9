//! [`CheckpointStore`] backed by the checkpoint and log tables.

use chrono::{DateTime, Utc};
use scout_state::error::Result;
use scout_state::{CheckpointStore, StateError};
use scout_types::error::ConnectorError;
use scout_types::state::{Checkpoint, RunLog, RunStatus, StreamId};
use serde::{Deserialize, Serialize};

use crate::client::PostgrestClient;
use crate::config::Config;

/// Row of the checkpoint table, keyed by stream id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub id: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub records_synced: u64,
    pub status: String,
    pub error_message: Option<String>,
}

impl From<&Checkpoint> for CheckpointRow {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            id: checkpoint.stream.as_str().to_owned(),
            last_sync_at: checkpoint.watermark,
            records_synced: checkpoint.records_synced,
            status: checkpoint.status.as_str().to_owned(),
            error_message: checkpoint.error_message.clone(),
        }
    }
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = StateError;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        let status: RunStatus = row
            .status
            .parse()
            .map_err(|e| StateError::Corrupt(format!("checkpoint '{}': {e}", row.id)))?;
        Ok(Self {
            stream: StreamId::new(row.id),
            watermark: row.last_sync_at,
            records_synced: row.records_synced,
            status,
            error_message: row.error_message,
        })
    }
}

/// Row of the append-only run log table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogRow {
    pub checkpoint_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub records_processed: u64,
    pub status: String,
    pub error_count: u64,
    pub error_details: Option<String>,
}

impl From<&RunLog> for RunLogRow {
    fn from(log: &RunLog) -> Self {
        Self {
            checkpoint_id: log.stream.as_str().to_owned(),
            started_at: log.started_at,
            completed_at: log.completed_at,
            records_processed: log.records_processed,
            status: log.status.as_str().to_owned(),
            error_count: log.error_count,
            error_details: log.error_details.clone(),
        }
    }
}

pub struct SupabaseStateStore {
    client: PostgrestClient,
    checkpoint_table: String,
    log_table: String,
}

impl SupabaseStateStore {
    /// Build a store from config.
    ///
    /// # Errors
    ///
    /// Returns a `config` error when the config is invalid.
    pub fn new(config: &Config) -> std::result::Result<Self, ConnectorError> {
        Ok(Self {
            client: PostgrestClient::new(config)?,
            checkpoint_table: config.checkpoint_table.clone(),
            log_table: config.log_table.clone(),
        })
    }
}

impl CheckpointStore for SupabaseStateStore {
    async fn get_checkpoint(&self, stream: &StreamId) -> Result<Option<Checkpoint>> {
        let rows: Vec<CheckpointRow> = self
            .client
            .select(
                &self.checkpoint_table,
                &[("id", format!("eq.{}", stream.as_str()))],
                Some(1),
            )
            .await?;
        rows.into_iter().next().map(Checkpoint::try_from).transpose()
    }

    async fn set_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let row = CheckpointRow::from(checkpoint);
        self.client
            .upsert(&self.checkpoint_table, "id", std::slice::from_ref(&row))
            .await?;
        Ok(())
    }

    async fn append_run_log(&self, log: &RunLog) -> Result<()> {
        let row = RunLogRow::from(log);
        self.client
            .insert(&self.log_table, std::slice::from_ref(&row))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn checkpoint_row_wire_shape() {
        let checkpoint = Checkpoint {
            stream: StreamId::new("odoo_pos_sync"),
            watermark: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 31, 0).unwrap()),
            records_synced: 12,
            status: RunStatus::Success,
            error_message: None,
        };
        let value = serde_json::to_value(CheckpointRow::from(&checkpoint)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "odoo_pos_sync",
                "last_sync_at": "2025-03-01T09:31:00Z",
                "records_synced": 12,
                "status": "success",
                "error_message": null,
            })
        );
    }

    #[test]
    fn checkpoint_row_from_postgrest_timestamptz() {
        let row: CheckpointRow = serde_json::from_value(json!({
            "id": "odoo_pos_sync",
            "last_sync_at": "2025-03-01T09:31:00.123456+00:00",
            "records_synced": 3,
            "status": "failed",
            "error_message": "boom",
        }))
        .unwrap();
        let checkpoint = Checkpoint::try_from(row).unwrap();
        assert_eq!(checkpoint.status, RunStatus::Failed);
        assert_eq!(
            checkpoint.watermark.unwrap().timestamp(),
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 31, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let row = CheckpointRow {
            id: "s".into(),
            last_sync_at: None,
            records_synced: 0,
            status: "exploded".into(),
            error_message: None,
        };
        assert!(matches!(Checkpoint::try_from(row), Err(StateError::Corrupt(_))));
    }

    #[test]
    fn run_log_row_wire_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let log = RunLog {
            stream: StreamId::new("odoo_pos_sync"),
            started_at: at,
            completed_at: at,
            records_processed: 20,
            status: RunStatus::DryRun,
            error_count: 1,
            error_details: Some("order 9: bad".into()),
        };
        let value = serde_json::to_value(RunLogRow::from(&log)).unwrap();
        assert_eq!(value["checkpoint_id"], "odoo_pos_sync");
        assert_eq!(value["status"], "dry_run");
        assert_eq!(value["error_count"], 1);
        assert_eq!(value["error_details"], "order 9: bad");
    }
}
