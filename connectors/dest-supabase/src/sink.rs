//! [`Sink`] implementation writing to the bronze table.

use scout_types::connector::Sink;
use scout_types::error::{ConnectorError, ErrorScope};
use scout_types::transaction::CanonicalTransaction;
use serde_json::json;

use crate::client::PostgrestClient;
use crate::config::Config;

pub struct SupabaseSink {
    client: PostgrestClient,
    table: String,
    conflict_column: String,
    refresh_functions: Vec<String>,
}

impl SupabaseSink {
    /// Build a sink from config.
    ///
    /// # Errors
    ///
    /// Returns a `config` error when the config is invalid.
    pub fn new(config: &Config) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: PostgrestClient::new(config)?,
            table: config.table.clone(),
            conflict_column: config.conflict_column.clone(),
            refresh_functions: config.refresh_functions.clone(),
        })
    }
}

impl Sink for SupabaseSink {
    async fn upsert_batch(&self, batch: &[CanonicalTransaction]) -> Result<u64, ConnectorError> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.client
            .upsert(&self.table, &self.conflict_column, batch)
            .await
            .map_err(|e| e.with_scope(ErrorScope::Batch))?;
        tracing::debug!(table = %self.table, rows = batch.len(), "Upserted batch");
        Ok(batch.len() as u64)
    }

    fn derived_layers(&self) -> Vec<String> {
        self.refresh_functions.clone()
    }

    async fn refresh_layer(&self, layer: &str) -> Result<(), ConnectorError> {
        self.client.rpc(layer, &json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_layers_follow_configured_order() {
        let mut config = Config::new("https://abc.supabase.co", "key");
        config.refresh_functions = vec!["silver".into(), "gold".into()];
        let sink = SupabaseSink::new(&config).unwrap();
        assert_eq!(sink.derived_layers(), vec!["silver", "gold"]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let sink = SupabaseSink::new(&Config::new("https://abc.supabase.co", "key")).unwrap();
        assert_eq!(sink.upsert_batch(&[]).await.unwrap(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = SupabaseSink::new(&Config::new("", "key")).err().unwrap();
        assert_eq!(err.code, "INVALID_CONFIG");
    }
}
