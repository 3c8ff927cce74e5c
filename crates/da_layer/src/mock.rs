//! Local mock DA, used by `mock` environments.

use async_trait::async_trait;
use roller_config::{DaBackend, NodeType};
use std::path::PathBuf;

use crate::{DaStatus, DataLayer, KeyInfo, NotFundedAddress, Result};

pub const KEY_NAME: &str = "mock";
pub const MOCK_ADDRESS: &str = "mockDA";

/// A DA layer with no identity that is always funded and always up.
#[derive(Debug, Default, Clone)]
pub struct MockDa;

#[async_trait]
impl DataLayer for MockDa {
    fn backend(&self) -> DaBackend {
        DaBackend::Mock
    }

    fn key_name(&self) -> &str {
        KEY_NAME
    }

    async fn da_account_address(&self) -> Result<KeyInfo> {
        Ok(KeyInfo {
            name: KEY_NAME.to_string(),
            address: MOCK_ADDRESS.to_string(),
        })
    }

    async fn initialize_light_node_config(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn check_da_balance(&self) -> Result<Vec<NotFundedAddress>> {
        Ok(Vec::new())
    }

    async fn sequencer_da_config(&mut self, _node_type: NodeType) -> Result<String> {
        Ok(String::new())
    }

    fn namespace_id(&self) -> String {
        String::new()
    }

    fn app_id(&self) -> u32 {
        0
    }

    async fn status(&self) -> DaStatus {
        DaStatus::Active
    }

    fn light_node_endpoint(&self) -> Result<String> {
        Ok(String::new())
    }

    fn light_client_config_path(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_always_ready() {
        let mut da = MockDa;
        assert_eq!(da.initialize_light_node_config().await.unwrap(), None);
        assert!(da.check_da_balance().await.unwrap().is_empty());
        assert_eq!(da.status().await, DaStatus::Active);
        assert_eq!(da.da_account_address().await.unwrap().address, MOCK_ADDRESS);
        assert!(da
            .sequencer_da_config(NodeType::Sequencer)
            .await
            .unwrap()
            .is_empty());
    }
}
