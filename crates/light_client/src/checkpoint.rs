//! Trust anchor persistence.
//!
//! The light-client config is rewritten as a whole TOML tree; only
//! `DASer.SampleFrom` and `Header.TrustedHash` change. The new file replaces
//! the old one atomically, so a crash leaves either the old or the new
//! contents.

use chain_queries::BlockInfo;
use roller_config::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};
use tracing::info;

/// The DA block a light client starts verifying from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustCheckpoint {
    pub height: u64,
    pub hash: String,
}

impl From<BlockInfo> for TrustCheckpoint {
    fn from(block: BlockInfo) -> Self {
        Self {
            height: block.height,
            hash: block.hash,
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode light client config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("`{0}` in light client config is not a table")]
    NotATable(&'static str),
    #[error("height {0} does not fit in a TOML integer")]
    HeightOutOfRange(u64),
}

/// Write `checkpoint` into the light-client config at `path`.
pub fn update_trust_anchor(path: &Path, checkpoint: &TrustCheckpoint) -> Result<(), CheckpointError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Table = toml::from_str(&contents).map_err(|source| CheckpointError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let height = i64::try_from(checkpoint.height)
        .map_err(|_| CheckpointError::HeightOutOfRange(checkpoint.height))?;
    table_mut(&mut config, "DASer")?.insert("SampleFrom".to_string(), Value::Integer(height));
    table_mut(&mut config, "Header")?.insert(
        "TrustedHash".to_string(),
        Value::String(checkpoint.hash.clone()),
    );

    let encoded = toml::to_string_pretty(&config)?;
    fs::write_atomic(path, encoded.as_bytes()).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Light client trust anchor set to height {} hash {} in {}",
        checkpoint.height,
        checkpoint.hash,
        path.display()
    );
    Ok(())
}

fn table_mut<'a>(config: &'a mut Table, name: &'static str) -> Result<&'a mut Table, CheckpointError> {
    config
        .entry(name)
        .or_insert_with(|| Value::Table(Table::new()))
        .as_table_mut()
        .ok_or(CheckpointError::NotATable(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(height: u64, hash: &str) -> TrustCheckpoint {
        TrustCheckpoint {
            height,
            hash: hash.to_string(),
        }
    }

    fn read(path: &Path) -> Table {
        toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_update_preserves_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[SomeOtherSection]
Foo = "bar"

[DASer]
SampleFrom = 1
SamplingRange = 100

[Header]
TrustedHash = ""
TrustedPeers = ["/dns4/peer/tcp/2121"]
"#,
        )
        .unwrap();

        update_trust_anchor(&path, &checkpoint(1000, "HASHA")).unwrap();

        let config = read(&path);
        assert_eq!(config["SomeOtherSection"]["Foo"].as_str(), Some("bar"));
        assert_eq!(config["DASer"]["SampleFrom"].as_integer(), Some(1000));
        assert_eq!(config["DASer"]["SamplingRange"].as_integer(), Some(100));
        assert_eq!(config["Header"]["TrustedHash"].as_str(), Some("HASHA"));
        assert_eq!(
            config["Header"]["TrustedPeers"].as_array().map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn test_missing_tables_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[RPC]\nPort = \"26658\"\n").unwrap();

        update_trust_anchor(&path, &checkpoint(777, "HASHB")).unwrap();

        let config = read(&path);
        assert_eq!(config["DASer"]["SampleFrom"].as_integer(), Some(777));
        assert_eq!(config["Header"]["TrustedHash"].as_str(), Some("HASHB"));
        assert_eq!(config["RPC"]["Port"].as_str(), Some("26658"));
    }

    #[test]
    fn test_update_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[Other]\nA = 1\n").unwrap();

        update_trust_anchor(&path, &checkpoint(5, "AA")).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        update_trust_anchor(&path, &checkpoint(5, "AA")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_failures_leave_file_untouched() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            update_trust_anchor(&missing, &checkpoint(1, "AA")),
            Err(CheckpointError::Io { .. })
        ));
        assert!(!missing.exists());

        let scalar = dir.path().join("scalar.toml");
        std::fs::write(&scalar, "DASer = 3\n").unwrap();
        assert!(matches!(
            update_trust_anchor(&scalar, &checkpoint(1, "AA")),
            Err(CheckpointError::NotATable("DASer"))
        ));
        assert_eq!(std::fs::read_to_string(&scalar).unwrap(), "DASer = 3\n");

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[DASer\n").unwrap();
        assert!(matches!(
            update_trust_anchor(&broken, &checkpoint(1, "AA")),
            Err(CheckpointError::Parse { .. })
        ));
    }
}
