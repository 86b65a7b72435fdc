use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use x402::{ConfigError, GatewayConfig, HttpRequest, PaymentGateway, TrackerConfig, TracingObserver};
use x402_client::{connect_wallet, ChainConfig, EvmSigner, PaymentSession, RpcChainState, TrackOutcome};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let private_key =
        std::env::var("EVM_PRIVATE_KEY").map_err(|_| ConfigError::MissingRequired("EVM_PRIVATE_KEY"))?;
    let resource =
        std::env::var("RESOURCE_URL").map_err(|_| ConfigError::MissingRequired("RESOURCE_URL"))?;

    let chain = ChainConfig::from_env()?;
    let gateway_config = GatewayConfig::from_env()?;
    let tracker_config = TrackerConfig::from_env()?;

    let (provider, address) = connect_wallet(&private_key, &chain.rpc_url)?;

    println!("Requesting: {resource}");
    println!("Paying from: {address} (chain {})\n", chain.chain_id);

    let signer = EvmSigner::with_chain_config(provider.clone(), chain.clone());
    let gateway = PaymentGateway::new(gateway_config)?.with_signer(signer);
    let session = PaymentSession::new(
        gateway,
        RpcChainState::new(provider),
        tracker_config,
        Arc::new(TracingObserver),
    );

    let (resp, receipt) = session.fetch(HttpRequest::get(resource)).await?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_success() {
        println!("Response data:");
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{body}"),
        }
    } else {
        eprintln!("Request failed with status: {status}");
        eprintln!("{body}");
    }

    let Some(receipt) = receipt else {
        return Ok(());
    };
    println!("\nPayment sent: {}", chain.explorer_tx_url(&receipt.transfer_id));

    match session.wait_for_settlement().await {
        Some(TrackOutcome::Confirmed(s)) => {
            println!("Payment confirmed ({} confirmations)", s.confirmations);
        }
        Some(TrackOutcome::Failed(s)) => {
            let reason = s.last_error.unwrap_or_else(|| "unknown".to_string());
            return Err(format!("payment failed: {reason}").into());
        }
        Some(TrackOutcome::TimedOut(s)) => {
            println!(
                "Stopped waiting for confirmation; last seen {} with {} confirmations",
                s.phase, s.confirmations
            );
        }
        Some(TrackOutcome::Superseded) | None => {}
    }
    Ok(())
}
