//! Backend selection and the light-node store it owns.

use chain_client::ChainClient;
use roller_config::{fs, DaBackend, Executables, RollappConfig};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{Avail, Celestia, DaError, DataLayer, MockDa, Result};

/// File inside the light-node store recording which backend created it.
pub const BACKEND_MARKER: &str = ".backend";

/// Owns the one [`DataLayer`] of the configured backend.
///
/// Callers only ever see the trait object; the concrete backend is picked
/// here. Backends without an implementation are rejected at construction.
pub struct DaManager {
    backend: DaBackend,
    store: PathBuf,
    layer: Box<dyn DataLayer>,
}

impl DaManager {
    pub fn new(
        config: &RollappConfig,
        client: Arc<dyn ChainClient>,
        bins: &Executables,
    ) -> Result<Self> {
        let backend = config.da.backend;
        let layer: Box<dyn DataLayer> = match backend {
            DaBackend::Celestia => Box::new(Celestia::new(config, client, bins)),
            DaBackend::Avail => Box::new(Avail::new(config, client)),
            DaBackend::Mock => Box::new(MockDa),
            unsupported => return Err(DaError::Unsupported(unsupported)),
        };

        Ok(Self {
            backend,
            store: config.light_node_dir(),
            layer,
        })
    }

    pub fn backend(&self) -> DaBackend {
        self.backend
    }

    /// The light-node store directory.
    pub fn store(&self) -> &Path {
        &self.store
    }

    fn marker_path(&self) -> PathBuf {
        self.store.join(BACKEND_MARKER)
    }

    /// The backend that created the store, if recorded.
    pub fn recorded_backend(&self) -> Result<Option<DaBackend>> {
        let path = self.marker_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().parse()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DaError::io(path, e)),
        }
    }

    /// Make the store usable for the configured backend.
    ///
    /// A store created by a different backend is wiped. Returns whether a
    /// wipe happened.
    pub fn prepare_store(&self) -> Result<bool> {
        let wiped = match self.recorded_backend() {
            Ok(Some(previous)) if previous != self.backend => {
                info!(
                    "DA backend changed from {} to {}, wiping {}",
                    previous,
                    self.backend,
                    self.store.display()
                );
                true
            }
            Ok(_) => false,
            Err(DaError::Config(e)) => {
                warn!("Unreadable backend marker ({}), wiping {}", e, self.store.display());
                true
            }
            Err(e) => return Err(e),
        };

        if wiped {
            self.reset_store()?;
        }
        self.write_marker()?;
        Ok(wiped)
    }

    /// Remove the whole store.
    pub fn reset_store(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.store) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DaError::io(&self.store, e)),
        }
    }

    fn write_marker(&self) -> Result<()> {
        let path = self.marker_path();
        fs::write_atomic(&path, self.backend.as_str().as_bytes()).map_err(|e| DaError::io(path, e))
    }
}

impl Deref for DaManager {
    type Target = dyn DataLayer;

    fn deref(&self) -> &Self::Target {
        self.layer.as_ref()
    }
}

impl DerefMut for DaManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.layer.as_mut()
    }
}
