//! DA backend selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// The DA network a rollapp posts its blocks to.
///
/// Exactly one backend is active per rollapp. Only [`DaBackend::Celestia`],
/// [`DaBackend::Avail`] and [`DaBackend::Mock`] have working implementations;
/// the rest are recognised so that configs naming them parse, but selecting
/// one fails when the data layer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaBackend {
    Celestia,
    Avail,
    Mock,
    Bnb,
    Kaspa,
    Solana,
    Walrus,
    LoadNetwork,
    WeaveVm,
    Near,
    Sui,
    Aptos,
}

impl DaBackend {
    pub const ALL: [DaBackend; 12] = [
        DaBackend::Celestia,
        DaBackend::Avail,
        DaBackend::Mock,
        DaBackend::Bnb,
        DaBackend::Kaspa,
        DaBackend::Solana,
        DaBackend::Walrus,
        DaBackend::LoadNetwork,
        DaBackend::WeaveVm,
        DaBackend::Near,
        DaBackend::Sui,
        DaBackend::Aptos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DaBackend::Celestia => "celestia",
            DaBackend::Avail => "avail",
            DaBackend::Mock => "mock",
            DaBackend::Bnb => "bnb",
            DaBackend::Kaspa => "kaspa",
            DaBackend::Solana => "solana",
            DaBackend::Walrus => "walrus",
            DaBackend::LoadNetwork => "loadnetwork",
            DaBackend::WeaveVm => "weavevm",
            DaBackend::Near => "near",
            DaBackend::Sui => "sui",
            DaBackend::Aptos => "aptos",
        }
    }

    /// Whether a real data layer exists for this backend.
    pub fn is_supported(&self) -> bool {
        matches!(self, DaBackend::Celestia | DaBackend::Avail | DaBackend::Mock)
    }
}

impl fmt::Display for DaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DaBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DaBackend::ALL
            .into_iter()
            .find(|backend| backend.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownBackend(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_names() {
        for backend in DaBackend::ALL {
            assert_eq!(backend.as_str().parse::<DaBackend>().unwrap(), backend);
        }
        assert_eq!("Celestia".parse::<DaBackend>().unwrap(), DaBackend::Celestia);
        assert!("ethereum".parse::<DaBackend>().is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            backend: DaBackend,
        }

        let text = toml::to_string(&Wrapper {
            backend: DaBackend::LoadNetwork,
        })
        .unwrap();
        assert_eq!(text.trim(), "backend = \"loadnetwork\"");

        let parsed: Wrapper = toml::from_str("backend = \"weavevm\"").unwrap();
        assert_eq!(parsed.backend, DaBackend::WeaveVm);
    }

    #[test]
    fn test_supported_backends() {
        let supported: Vec<_> = DaBackend::ALL
            .into_iter()
            .filter(DaBackend::is_supported)
            .collect();
        assert_eq!(
            supported,
            vec![DaBackend::Celestia, DaBackend::Avail, DaBackend::Mock]
        );
    }
}
