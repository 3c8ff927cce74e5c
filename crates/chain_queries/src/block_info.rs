//! DA chain block lookups.

use chain_client::{ChainClient, ChainRequest};
use roller_config::DaData;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::{QueryError, Result};

/// Height and block ID hash of a DA chain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
}

/// Resolves DA blocks through the consensus app's `q block` query.
pub struct BlockInfoResolver {
    client: Arc<dyn ChainClient>,
    celestia_app: PathBuf,
}

impl BlockInfoResolver {
    pub fn new(client: Arc<dyn ChainClient>, celestia_app: impl Into<PathBuf>) -> Self {
        Self {
            client,
            celestia_app: celestia_app.into(),
        }
    }

    /// The chain head.
    pub async fn latest_block(&self, da: &DaData) -> Result<BlockInfo> {
        self.query(None, da).await
    }

    /// The block at `height`.
    pub async fn block_by_height(&self, height: u64, da: &DaData) -> Result<BlockInfo> {
        self.query(Some(height), da).await
    }

    async fn query(&self, height: Option<u64>, da: &DaData) -> Result<BlockInfo> {
        let mut args = vec!["q".to_string(), "block".to_string()];
        if let Some(h) = height {
            args.push(h.to_string());
        }
        args.extend([
            "--node".to_string(),
            da.rpc_url.clone(),
            "--chain-id".to_string(),
            da.id.clone(),
        ]);

        let request = ChainRequest::exec(&self.celestia_app, args);
        let out = self.client.request(&request).await?;
        let block = parse_block_response(&out)?;

        debug!("DA block {} has hash {}", block.height, block.hash);
        Ok(block)
    }
}

/// Extract `block.header.height` and `block_id.hash` from a `q block` response.
pub fn parse_block_response(raw: &str) -> Result<BlockInfo> {
    let json: Value = serde_json::from_str(raw)?;

    let height = match json.pointer("/block/header/height") {
        Some(Value::String(s)) => s.parse::<u64>().map_err(|e| QueryError::Malformed {
            field: "block.header.height",
            reason: format!("{s:?}: {e}"),
        })?,
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| QueryError::Malformed {
            field: "block.header.height",
            reason: format!("{n} is not an unsigned integer"),
        })?,
        Some(_) | None => return Err(QueryError::MissingField("block.header.height")),
    };

    let hash = json
        .pointer("/block_id/hash")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .ok_or(QueryError::MissingField("block_id.hash"))?
        .to_string();

    Ok(BlockInfo { height, hash })
}
