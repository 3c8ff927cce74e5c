//! Funding gate: block until the DA account can pay for blobs.

use da_layer::{DaError, DataLayer, NotFundedAddress};
use prettytable::format::FormatBuilder;
use prettytable::{row, Cell, Row, Table};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::prompt::Prompter;

#[derive(Error, Debug)]
pub enum FundingError {
    #[error("funding cancelled by operator")]
    Cancelled,
    #[error(transparent)]
    Da(#[from] DaError),
}

pub struct FundingGate {
    prompter: Arc<dyn Prompter>,
}

impl FundingGate {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }

    /// Re-check the balance until it suffices or the operator gives up.
    pub async fn wait_until_funded(&self, da: &dyn DataLayer) -> Result<(), FundingError> {
        loop {
            let missing = da.check_da_balance().await?;
            if missing.is_empty() {
                info!("{} DA account is funded", da.backend());
                return Ok(());
            }

            self.prompter.notify(&render_funding_table(&missing));
            if !self
                .prompter
                .confirm("press 'y' once the addresses above are funded")
                .await
            {
                return Err(FundingError::Cancelled);
            }
        }
    }
}

/// Operator-facing table of the accounts to fund.
pub fn render_funding_table(missing: &[NotFundedAddress]) -> String {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .padding(0, 1)
            .build(),
    );
    table.set_titles(row!["Name", "Address", "Current", "Required", "Network"]);
    for m in missing {
        table.add_row(Row::new(vec![
            Cell::new(&m.key_name),
            Cell::new(&m.address),
            Cell::new(&format!("{}{}", m.current_balance, m.denom)),
            Cell::new(&format!("{}{}", m.required_balance, m.denom)),
            Cell::new(&m.network),
        ]));
    }

    let mut out = String::from("Please fund the following addresses:\n");
    for line in table.to_string().lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use chain_client::fake::FakeChainClient;
    use da_layer::Celestia;
    use roller_config::{
        DaBackend, Executables, HubData, KeyringBackend, NetworkPresets, NodeType, RollappConfig,
    };
    use std::path::Path;

    fn celestia(home: &Path, fake: &Arc<FakeChainClient>) -> Celestia {
        let config = RollappConfig {
            home: home.to_path_buf(),
            rollapp_id: "ra_1-1".to_string(),
            environment: "playground".to_string(),
            node_type: NodeType::Sequencer,
            keyring_backend: KeyringBackend::Test,
            hub_data: HubData {
                id: "dymension_100-1".to_string(),
                rpc_url: "http://hub:36657".to_string(),
                api_url: String::new(),
                environment: "playground".to_string(),
            },
            da: NetworkPresets::builtin()
                .lookup("playground", DaBackend::Celestia)
                .unwrap()
                .clone(),
        };
        Celestia::new(&config, fake.clone(), &Executables::in_dir("/bins"))
    }

    fn balance(amount: u64) -> String {
        format!(r#"{{"balances":[{{"denom":"utia","amount":"{amount}"}}]}}"#)
    }

    #[tokio::test]
    async fn test_waits_until_funded() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("cel-key show", r#"{"address":"celestia1abc"}"#)
            .respond("q bank balances", balance(0))
            .respond("q bank balances", balance(0))
            .respond("q bank balances", balance(1000));
        let prompter = Arc::new(ScriptedPrompter::new().with_confirms([true, true, true]));

        FundingGate::new(prompter.clone())
            .wait_until_funded(&celestia(home.path(), &fake))
            .await
            .unwrap();

        assert_eq!(fake.call_count("q bank balances"), 3);
        assert_eq!(prompter.asked().len(), 2);
        assert!(prompter.notices()[0].contains("celestia1abc"));
    }

    #[tokio::test]
    async fn test_cancel_stops_immediately() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.respond("cel-key show", r#"{"address":"celestia1abc"}"#)
            .respond("q bank balances", balance(0));
        let prompter = Arc::new(ScriptedPrompter::new().with_confirms([false]));

        let err = FundingGate::new(prompter)
            .wait_until_funded(&celestia(home.path(), &fake))
            .await
            .unwrap_err();

        assert!(matches!(err, FundingError::Cancelled));
        assert_eq!(fake.call_count("q bank balances"), 1);
    }

    #[tokio::test]
    async fn test_balance_errors_propagate() {
        let home = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeChainClient::new());
        fake.fail("cel-key show", "Error: my_celes_key.info: key not found");

        let err = FundingGate::new(Arc::new(ScriptedPrompter::new()))
            .wait_until_funded(&celestia(home.path(), &fake))
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::Da(DaError::MissingKey(_))));
    }

    #[test]
    fn test_render_funding_table() {
        let table = render_funding_table(&[NotFundedAddress {
            key_name: "my_celes_key".to_string(),
            address: "celestia1abc".to_string(),
            current_balance: 0,
            required_balance: 1,
            denom: "utia".to_string(),
            network: "mocha-4".to_string(),
        }]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Name"));
        assert!(lines[2].contains("celestia1abc"));
        assert!(lines[2].contains("0utia"));
        assert!(lines[2].ends_with("mocha-4"));
    }
}
