use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use crate::config::{ConfigError, GatewayConfig};
use crate::constants::{PROTOCOL_HEADER, PROTOCOL_NAME, PROTOCOL_VERSION, VERSION_HEADER};
use crate::error::UnpaidResponse;
use crate::payment::{PaymentDescriptor, PaymentRecord, TransferReceipt};
use crate::scheme::{NoSigner, Signer};
use crate::X402Error;

/// An outbound request, kept around so it can be re-issued after payment.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute, or relative to the gateway's base URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, X402Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// HTTP client that transparently pays 402 challenges.
///
/// Wraps `reqwest::Client`. On a 402 response carrying a payment descriptor
/// header, it asks the configured [`Signer`] for a transfer and retries the
/// request once with the transfer id in the proof header. A second 402 is
/// returned to the caller as [`X402Error::PaymentRequired`]; there is never
/// more than one retry per request.
pub struct PaymentGateway<S = NoSigner> {
    http: reqwest::Client,
    config: GatewayConfig,
    base_url: Option<Url>,
    descriptor_header: HeaderName,
    proof_header: HeaderName,
    signer: Option<S>,
}

impl PaymentGateway<NoSigner> {
    /// Create a gateway without a signer. 402 responses are returned as errors
    /// until one is attached with [`PaymentGateway::with_signer`].
    pub fn new(config: GatewayConfig) -> Result<Self, X402Error> {
        let http = build_http_client(&config)?;
        Self::with_http_client(config, http)
    }

    /// Create a gateway with a custom `reqwest::Client`.
    ///
    /// The client's own default headers are used as-is; the x402 protocol
    /// headers are still added to every request.
    pub fn with_http_client(config: GatewayConfig, http: reqwest::Client) -> Result<Self, X402Error> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| Url::parse(u).map_err(|_| ConfigError::InvalidUrl(u.to_string())))
            .transpose()?;
        let descriptor_header = parse_header_name(&config.descriptor_header)?;
        let proof_header = parse_header_name(&config.proof_header)?;

        Ok(Self {
            http,
            config,
            base_url,
            descriptor_header,
            proof_header,
            signer: None,
        })
    }
}

impl<S> PaymentGateway<S> {
    /// Attach a signer, replacing the gateway's signer type.
    pub fn with_signer<T: Signer>(self, signer: T) -> PaymentGateway<T> {
        PaymentGateway {
            http: self.http,
            config: self.config,
            base_url: self.base_url,
            descriptor_header: self.descriptor_header,
            proof_header: self.proof_header,
            signer: Some(signer),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }
}

impl<S: Signer> PaymentGateway<S> {
    /// Replace (or clear) the signer of an existing gateway.
    pub fn set_signer(&mut self, signer: Option<S>) {
        self.signer = signer;
    }

    /// Issue `req`, paying a 402 challenge at most once.
    ///
    /// Returns the final response and, if a payment was made, its receipt.
    /// Once a transfer has been submitted every error carries its receipt,
    /// see [`X402Error::receipt`].
    pub async fn request(
        &self,
        req: HttpRequest,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        let url = self.resolve(&req.url)?;

        let resp = self.send(&req, &url, None).await?;
        if resp.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok((resp, None));
        }

        let Some(signer) = self.signer.as_ref() else {
            tracing::debug!(url = %url, "402 received but no signer is configured");
            return Err(unpaid(resp, None).await);
        };

        let Some(raw) = resp.headers().get(&self.descriptor_header).cloned() else {
            tracing::debug!(
                url = %url,
                header = %self.descriptor_header,
                "402 received without a payment descriptor"
            );
            return Err(unpaid(resp, None).await);
        };
        let raw = raw.to_str().map_err(|e| {
            X402Error::MalformedPaymentDescriptor(format!("header is not valid text: {e}"))
        })?;
        let descriptor = PaymentDescriptor::from_header(raw)?;

        tracing::info!(
            url = %url,
            amount = %descriptor.amount,
            currency = %descriptor.currency,
            recipient = %descriptor.recipient,
            "payment required, submitting transfer"
        );
        let receipt = self.transfer_with(signer, &descriptor).await?;

        let proof = match HeaderValue::from_str(&receipt.transfer_id) {
            Ok(proof) => proof,
            Err(e) => {
                let source = X402Error::TransferRejected(format!(
                    "transfer id is not a valid header value: {e}"
                ));
                return Err(paid_failure(receipt, source));
            }
        };

        let retried = match self.send(&req, &url, Some(proof)).await {
            Ok(resp) => resp,
            Err(e) => return Err(paid_failure(receipt, e)),
        };
        if retried.status() == StatusCode::PAYMENT_REQUIRED {
            tracing::warn!(
                url = %url,
                transfer_id = %receipt.transfer_id,
                "paid request still answered 402, not retrying again"
            );
            return Err(unpaid(retried, Some(receipt)).await);
        }

        tracing::info!(
            url = %url,
            transfer_id = %receipt.transfer_id,
            status = %retried.status(),
            "paid request completed"
        );
        Ok((retried, Some(receipt)))
    }

    /// Submit a transfer for `descriptor` directly, without an HTTP challenge.
    pub async fn pay(&self, descriptor: &PaymentDescriptor) -> Result<TransferReceipt, X402Error> {
        descriptor.validate()?;
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| X402Error::SignerUnavailable("no signer configured".to_string()))?;
        self.transfer_with(signer, descriptor).await
    }

    /// Ask the API's payment endpoint for the settlement record of a transfer.
    pub async fn check_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<PaymentRecord, X402Error> {
        let path = format!(
            "{}/{}",
            self.config.payment_endpoint.trim_end_matches('/'),
            transfer_id
        );
        let (resp, _) = self.request(HttpRequest::get(path)).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(X402Error::HttpError(format!(
                "payment status lookup returned {status}: {body}"
            )));
        }
        resp.json()
            .await
            .map_err(|e| X402Error::HttpError(format!("failed to parse payment record: {e}")))
    }

    pub async fn get(
        &self,
        url: &str,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        self.request(HttpRequest::get(url)).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        self.request(HttpRequest::post(url).json(body)?).await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        self.request(HttpRequest::new(Method::PUT, url).json(body)?)
            .await
    }

    pub async fn delete(
        &self,
        url: &str,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        self.request(HttpRequest::new(Method::DELETE, url)).await
    }

    async fn transfer_with(
        &self,
        signer: &S,
        descriptor: &PaymentDescriptor,
    ) -> Result<TransferReceipt, X402Error> {
        let timeout = self.config.signer_timeout;
        let receipt = tokio::time::timeout(timeout, signer.transfer(descriptor))
            .await
            .map_err(|_| {
                X402Error::SignerUnavailable(format!(
                    "signer did not respond within {}s",
                    timeout.as_secs()
                ))
            })??;
        tracing::info!(transfer_id = %receipt.transfer_id, "transfer submitted by signer");
        Ok(receipt)
    }

    async fn send(
        &self,
        req: &HttpRequest,
        url: &Url,
        proof: Option<HeaderValue>,
    ) -> Result<reqwest::Response, X402Error> {
        let mut builder = self
            .http
            .request(req.method.clone(), url.clone())
            .headers(req.headers.clone())
            .header(PROTOCOL_HEADER, PROTOCOL_NAME)
            .header(VERSION_HEADER, PROTOCOL_VERSION);
        if let Some(proof) = proof {
            builder = builder.header(self.proof_header.clone(), proof);
        }
        if let Some(ref body) = req.body {
            builder = builder.body(body.clone());
        }
        builder
            .send()
            .await
            .map_err(|e| X402Error::HttpError(format!("request to {url} failed: {e}")))
    }
}

impl<S> PaymentGateway<S> {
    fn resolve(&self, url: &str) -> Result<Url, X402Error> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = self.base_url.as_ref().ok_or_else(|| {
            X402Error::ConfigError(format!("relative URL {url:?} but no base URL configured"))
        })?;
        base.join(url)
            .map_err(|e| X402Error::ConfigError(format!("cannot join {url:?} onto {base}: {e}")))
    }
}

fn build_http_client(config: &GatewayConfig) -> Result<reqwest::Client, X402Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in &config.headers {
        let value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeader(format!("{name}: {value}")))?;
        headers.insert(parse_header_name(name)?, value);
    }

    reqwest::Client::builder()
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
        .map_err(|e| X402Error::ConfigError(format!("failed to build HTTP client: {e}")))
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ConfigError::InvalidHeader(name.to_string()))
}

fn paid_failure(receipt: TransferReceipt, source: X402Error) -> X402Error {
    tracing::warn!(
        transfer_id = %receipt.transfer_id,
        error = %source,
        "paid retry failed after transfer was submitted"
    );
    X402Error::PaidRequestFailed {
        receipt,
        source: Box::new(source),
    }
}

async fn unpaid(resp: reqwest::Response, receipt: Option<TransferReceipt>) -> X402Error {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.bytes().await.unwrap_or_default();
    X402Error::PaymentRequired(Box::new(UnpaidResponse {
        status,
        headers,
        body,
        receipt,
    }))
}
