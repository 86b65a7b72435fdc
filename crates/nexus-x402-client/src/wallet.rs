use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::TransportError;

use x402::{PaymentDescriptor, Signer, TransferReceipt, X402Error, USDC_SYMBOL};

use crate::chain::ChainConfig;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function transfer(address to, uint256 value) external returns (bool);
    }
}

/// Connect a wallet-equipped provider for `private_key` on `rpc_url`.
pub fn connect_wallet(
    private_key: &str,
    rpc_url: &str,
) -> Result<(impl Provider + Clone, Address), X402Error> {
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .map_err(|e| X402Error::ConfigError(format!("invalid private key: {e}")))?;
    let address = signer.address();
    let rpc_url = rpc_url
        .parse()
        .map_err(|e| X402Error::ConfigError(format!("invalid RPC URL {rpc_url:?}: {e}")))?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url);
    Ok((provider, address))
}

/// [`Signer`] that pays by sending an on-chain transaction.
///
/// USDC descriptors become an ERC-20 `transfer` on the configured token;
/// descriptors in the chain's native currency become a plain value transfer.
/// Returns once the node has accepted the transaction; inclusion is left to
/// the tracker.
pub struct EvmSigner<P> {
    provider: P,
    config: ChainConfig,
}

impl<P: Provider> EvmSigner<P> {
    /// Create a signer on Base mainnet.
    pub fn new(provider: P) -> Self {
        Self::with_chain_config(provider, ChainConfig::default())
    }

    pub fn with_chain_config(provider: P, config: ChainConfig) -> Self {
        Self { provider, config }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    async fn send_usdc(&self, to: Address, value: U256) -> Result<String, X402Error> {
        let token = IERC20::new(self.config.usdc_token, &self.provider);
        let pending = token
            .transfer(to, value)
            .send()
            .await
            .map_err(|e| match e {
                alloy::contract::Error::TransportError(e) => classify("USDC transfer", e),
                other => X402Error::TransferRejected(format!("USDC transfer failed: {other}")),
            })?;
        Ok(pending.tx_hash().to_string())
    }

    async fn send_native(&self, to: Address, value: U256) -> Result<String, X402Error> {
        let tx = TransactionRequest::default().with_to(to).with_value(value);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify("native transfer", e))?;
        Ok(pending.tx_hash().to_string())
    }
}

impl<P> Signer for EvmSigner<P>
where
    P: Provider + Send + Sync,
{
    async fn transfer(&self, descriptor: &PaymentDescriptor) -> Result<TransferReceipt, X402Error> {
        let to: Address = descriptor.recipient.trim().parse().map_err(|e| {
            X402Error::TransferRejected(format!(
                "invalid recipient {:?}: {e}",
                descriptor.recipient
            ))
        })?;
        let value: U256 = descriptor.amount.parse().map_err(|e| {
            X402Error::TransferRejected(format!("invalid amount {:?}: {e}", descriptor.amount))
        })?;

        let currency = descriptor.currency.trim();
        let tx_hash = if currency.eq_ignore_ascii_case(USDC_SYMBOL) {
            self.send_usdc(to, value).await?
        } else if currency.eq_ignore_ascii_case(&self.config.native_symbol) {
            self.send_native(to, value).await?
        } else {
            return Err(X402Error::TransferRejected(format!(
                "unsupported currency {currency:?}"
            )));
        };

        tracing::info!(
            tx_hash = %tx_hash,
            to = %to,
            value = %value,
            currency = %currency,
            chain_id = self.config.chain_id,
            "payment transaction sent"
        );
        Ok(TransferReceipt::new(tx_hash))
    }
}

/// A JSON-RPC error response is the node refusing the transaction; anything
/// else means the node could not be asked.
fn classify(context: &str, e: TransportError) -> X402Error {
    match e.as_error_resp() {
        Some(resp) => X402Error::TransferRejected(format!("{context} refused: {}", resp.message)),
        None => X402Error::SignerUnavailable(format!("{context} failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};
    use alloy::transports::mock::Asserter;

    const RECIPIENT: Address = address!("00000000000000000000000000000000000000aa");

    fn signer(asserter: &Asserter) -> EvmSigner<impl Provider> {
        EvmSigner::new(
            ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_mocked_client(asserter.clone()),
        )
    }

    fn descriptor(currency: &str) -> PaymentDescriptor {
        PaymentDescriptor::new("1500000", currency, RECIPIENT.to_string())
    }

    #[tokio::test]
    async fn test_usdc_transfer_returns_tx_hash() {
        let asserter = Asserter::new();
        let hash = B256::repeat_byte(0x11);
        asserter.push_success(&hash);

        let receipt = signer(&asserter).transfer(&descriptor("USDC")).await.unwrap();
        assert_eq!(receipt.transfer_id, hash.to_string());
    }

    #[tokio::test]
    async fn test_native_transfer_returns_tx_hash() {
        let asserter = Asserter::new();
        let hash = B256::repeat_byte(0x22);
        asserter.push_success(&hash);

        let receipt = signer(&asserter).transfer(&descriptor("eth")).await.unwrap();
        assert_eq!(receipt.transfer_id, hash.to_string());
    }

    #[tokio::test]
    async fn test_node_error_is_rejection() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("insufficient funds for gas * price + value");

        let err = signer(&asserter).transfer(&descriptor("USDC")).await.unwrap_err();
        match err {
            X402Error::TransferRejected(msg) => assert!(msg.contains("insufficient funds")),
            other => panic!("expected TransferRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_rejected() {
        let asserter = Asserter::new();
        let err = signer(&asserter).transfer(&descriptor("DAI")).await.unwrap_err();
        assert!(matches!(err, X402Error::TransferRejected(_)));
    }

    #[tokio::test]
    async fn test_bad_recipient_is_rejected() {
        let asserter = Asserter::new();
        let bad = PaymentDescriptor::new("1", "USDC", "vitalik.eth");
        let err = signer(&asserter).transfer(&bad).await.unwrap_err();
        assert!(matches!(err, X402Error::TransferRejected(_)));
    }

    #[tokio::test]
    async fn test_connect_wallet_reports_address() {
        let key = PrivateKeySigner::random();
        let hex = key.to_bytes().to_string();
        let (_, address) = connect_wallet(&hex, "https://mainnet.base.org").unwrap();
        assert_eq!(address, key.address());
    }

    #[tokio::test]
    async fn test_connect_wallet_rejects_bad_key() {
        let err = connect_wallet("0x1234", "https://mainnet.base.org").err().unwrap();
        assert!(matches!(err, X402Error::ConfigError(_)));
    }
}
