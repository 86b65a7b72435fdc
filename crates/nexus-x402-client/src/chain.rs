use alloy::primitives::{address, Address, TxHash};
use alloy::providers::Provider;
use alloy::transports::TransportError;
use std::env;

use x402::{ChainStateProvider, ConfigError, TransferOutcome, X402Error};

/// Base mainnet chain ID.
pub const BASE_CHAIN_ID: u64 = 8453;

/// Default public RPC endpoint for Base mainnet.
pub const BASE_RPC_URL: &str = "https://mainnet.base.org";

/// Circle USDC on Base mainnet.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Block explorer base URL.
pub const BASE_EXPLORER: &str = "https://basescan.org";

pub const NATIVE_SYMBOL: &str = "ETH";

/// Chain the wallet pays on. Defaults to Base mainnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub usdc_token: Address,
    pub native_symbol: String,
    pub explorer_base: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            rpc_url: BASE_RPC_URL.to_string(),
            usdc_token: BASE_USDC,
            native_symbol: NATIVE_SYMBOL.to_string(),
            explorer_base: BASE_EXPLORER.to_string(),
        }
    }
}

impl ChainConfig {
    /// Reads `RPC_URL`, `CHAIN_ID`, `USDC_TOKEN` and `EXPLORER_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(rpc_url) = lookup("RPC_URL") {
            url::Url::parse(&rpc_url).map_err(|_| ConfigError::InvalidUrl(rpc_url.clone()))?;
            config.rpc_url = rpc_url;
        }
        if let Some(chain_id) = lookup("CHAIN_ID") {
            config.chain_id = match chain_id.trim().parse::<u64>() {
                Ok(id) if id > 0 => id,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "CHAIN_ID",
                        value: chain_id,
                    })
                }
            };
        }
        if let Some(token) = lookup("USDC_TOKEN") {
            config.usdc_token = token
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddress {
                    var: "USDC_TOKEN",
                    value: token.clone(),
                })?;
        }
        if let Some(explorer) = lookup("EXPLORER_URL") {
            config.explorer_base = explorer.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    /// Explorer link for a transaction hash.
    pub fn explorer_tx_url(&self, transfer_id: &str) -> String {
        format!("{}/tx/{}", self.explorer_base, transfer_id)
    }
}

/// [`ChainStateProvider`] backed by JSON-RPC receipt and block queries.
#[derive(Debug, Clone)]
pub struct RpcChainState<P> {
    provider: P,
}

impl<P> RpcChainState<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> ChainStateProvider for RpcChainState<P>
where
    P: Provider + Send + Sync,
{
    async fn confirmation_depth(&self, transfer_id: &str) -> Result<Option<u64>, X402Error> {
        let hash = parse_tx_hash(transfer_id)?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_unreachable("eth_getTransactionReceipt", e))?;

        let mined_in = match receipt.and_then(|r| r.block_number) {
            Some(block) => block,
            None => {
                let tx = self
                    .provider
                    .get_transaction_by_hash(hash)
                    .await
                    .map_err(|e| rpc_unreachable("eth_getTransactionByHash", e))?;
                match tx {
                    None => return Ok(None),
                    Some(tx) => match tx.block_number {
                        Some(block) => block,
                        // In the mempool.
                        None => return Ok(Some(0)),
                    },
                }
            }
        };

        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| rpc_unreachable("eth_blockNumber", e))?;

        Ok(Some(latest.saturating_sub(mined_in) + 1))
    }

    async fn transfer_outcome(&self, transfer_id: &str) -> Result<TransferOutcome, X402Error> {
        let hash = parse_tx_hash(transfer_id)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_unreachable("eth_getTransactionReceipt", e))?;

        Ok(match receipt {
            None => TransferOutcome::Pending,
            Some(r) if r.status() => TransferOutcome::Included,
            Some(_) => TransferOutcome::Reverted,
        })
    }
}

fn parse_tx_hash(transfer_id: &str) -> Result<TxHash, X402Error> {
    transfer_id
        .trim()
        .parse()
        .map_err(|e| X402Error::TransferRejected(format!("not a transaction hash {transfer_id:?}: {e}")))
}

fn rpc_unreachable(method: &str, e: TransportError) -> X402Error {
    X402Error::ProviderUnreachable(format!("{method} failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U64;
    use alloy::providers::ProviderBuilder;
    use alloy::transports::mock::Asserter;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    fn chain(asserter: &Asserter) -> RpcChainState<impl Provider> {
        RpcChainState::new(
            ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_mocked_client(asserter.clone()),
        )
    }

    fn receipt(block: u64, success: bool) -> Value {
        json!({
            "type": "0x2",
            "status": if success { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": HASH,
            "transactionIndex": "0x0",
            "blockHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": format!("{block:#x}"),
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": "0x0000000000000000000000000000000000000001",
            "to": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
            "contractAddress": null
        })
    }

    #[tokio::test]
    async fn test_depth_counts_inclusion_block() {
        let asserter = Asserter::new();
        asserter.push_success(&receipt(100, true));
        asserter.push_success(&U64::from(102));

        let depth = chain(&asserter).confirmation_depth(HASH).await.unwrap();
        assert_eq!(depth, Some(3));
    }

    #[tokio::test]
    async fn test_depth_of_unknown_transfer_is_none() {
        let asserter = Asserter::new();
        asserter.push_success(&Value::Null);
        asserter.push_success(&Value::Null);

        let depth = chain(&asserter).confirmation_depth(HASH).await.unwrap();
        assert_eq!(depth, None);
    }

    #[tokio::test]
    async fn test_outcome_from_receipt_status() {
        let asserter = Asserter::new();
        asserter.push_success(&Value::Null);
        asserter.push_success(&receipt(100, true));
        asserter.push_success(&receipt(100, false));

        let chain = chain(&asserter);
        assert_eq!(chain.transfer_outcome(HASH).await.unwrap(), TransferOutcome::Pending);
        assert_eq!(chain.transfer_outcome(HASH).await.unwrap(), TransferOutcome::Included);
        assert_eq!(chain.transfer_outcome(HASH).await.unwrap(), TransferOutcome::Reverted);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_unreachable() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("upstream overloaded");

        let err = chain(&asserter).transfer_outcome(HASH).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_garbage_id_is_rejected_without_rpc() {
        let asserter = Asserter::new();
        let err = chain(&asserter).confirmation_depth("not-a-hash").await.unwrap_err();
        assert!(matches!(err, X402Error::TransferRejected(_)));
    }

    #[test]
    fn test_chain_config_defaults_to_base() {
        let config = ChainConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ChainConfig::default());
        assert_eq!(config.chain_id, 8453);
        assert_eq!(
            config.usdc_token,
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse::<Address>().unwrap()
        );
        assert_eq!(
            config.explorer_tx_url("0xabc"),
            "https://basescan.org/tx/0xabc"
        );
    }

    #[test]
    fn test_chain_config_overrides() {
        let env: HashMap<&str, &str> = [
            ("RPC_URL", "https://sepolia.base.org"),
            ("CHAIN_ID", "84532"),
            ("USDC_TOKEN", "0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            ("EXPLORER_URL", "https://sepolia.basescan.org/"),
        ]
        .into_iter()
        .collect();
        let config = ChainConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.chain_id, 84532);
        assert_eq!(config.rpc_url, "https://sepolia.base.org");
        assert_eq!(config.explorer_base, "https://sepolia.basescan.org");
    }

    #[test]
    fn test_chain_config_rejects_bad_values() {
        assert!(matches!(
            ChainConfig::from_lookup(|k| (k == "USDC_TOKEN").then(|| "0x12".to_string())),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            ChainConfig::from_lookup(|k| (k == "CHAIN_ID").then(|| "base".to_string())),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            ChainConfig::from_lookup(|k| (k == "RPC_URL").then(|| "not a url".to_string())),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
