//! JSON-over-HTTP implementation of the backend contract.

use async_trait::async_trait;
use common::{AssetId, EstimateId, OrderId, TransactionId};
use domain::{
    EstimateDetails, EstimateInput, EstimateUpdate, LineUpdate, Order, OrderInput,
    OrderLineInput, PaymentInput, Transaction, TransactionStatus,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{CommerceBackend, Operation};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::requests::{
    AddOrderLineRequest, CreateTransactionRequest, CreatedTransaction, DeleteOrderLineRequest,
    UpdateTransactionRequest,
};

const API_PREFIX: [&str; 2] = ["api", "payment"];

/// Commerce backend reached over HTTP.
///
/// Response bodies are read as text before they are parsed, so a failing
/// call can log exactly what the backend sent while the caller still gets a
/// fixed, human-readable error.
#[derive(Debug, Clone)]
pub struct HttpCommerceBackend {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpCommerceBackend {
    /// Builds a client from configuration.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| BackendError::Config(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Config(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
        })
    }

    /// Returns the backend origin requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> RequestBuilder {
        self.request(method, segments).json(body)
    }

    /// Sends the request and returns the body of a successful response.
    async fn send(&self, operation: Operation, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(%operation, error = %e, "backend request failed");
            BackendError::Transport {
                operation,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| BackendError::Transport {
            operation,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            tracing::error!(%operation, status = status.as_u16(), %body, "backend returned an error");
            return Err(BackendError::Http {
                operation,
                status: status.as_u16(),
            });
        }

        tracing::debug!(%operation, status = status.as_u16(), "backend call succeeded");
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T> {
        let body = self.send(operation, request).await?;
        decode(operation, &body)
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(%operation, error = %e, %body, "malformed backend response");
        BackendError::Decode {
            operation,
            message: e.to_string(),
        }
    })
}

#[async_trait]
impl CommerceBackend for HttpCommerceBackend {
    async fn create_transaction(&self, request: CreateTransactionRequest) -> Result<Transaction> {
        let service_id = request.service_id.clone();
        let created: CreatedTransaction = self
            .send_json(
                Operation::CreateTransaction,
                self.json_request(Method::POST, &["transaction"], &request),
            )
            .await?;
        Ok(created.into_transaction(service_id))
    }

    async fn update_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<()> {
        let body = UpdateTransactionRequest {
            transaction_id: transaction_id.clone(),
            status,
        };
        self.send(
            Operation::UpdateTransaction,
            self.json_request(Method::PUT, &["transaction"], &body),
        )
        .await
        .map(|_| ())
    }

    async fn create_estimate(&self, input: EstimateInput) -> Result<EstimateDetails> {
        self.send_json(
            Operation::CreateEstimate,
            self.json_request(Method::POST, &["estimate"], &input),
        )
        .await
    }

    async fn get_estimate(&self, estimate_id: &EstimateId) -> Result<EstimateDetails> {
        self.send_json(
            Operation::GetEstimate,
            self.request(Method::GET, &["estimate", estimate_id.as_str()]),
        )
        .await
    }

    async fn update_estimate(&self, update: EstimateUpdate) -> Result<EstimateDetails> {
        self.send_json(
            Operation::UpdateEstimate,
            self.json_request(Method::PUT, &["estimate"], &update),
        )
        .await
    }

    async fn create_order(&self, input: OrderInput) -> Result<Order> {
        self.send_json(
            Operation::CreateOrder,
            self.json_request(Method::POST, &["order"], &input),
        )
        .await
    }

    async fn add_order_line(&self, order_id: &OrderId, line: OrderLineInput) -> Result<()> {
        let body = AddOrderLineRequest {
            order_id: order_id.clone(),
            line_input: line,
        };
        self.send(
            Operation::AddOrderLine,
            self.json_request(Method::PUT, &["order"], &body),
        )
        .await
        .map(|_| ())
    }

    async fn update_order_line(
        &self,
        order_id: &OrderId,
        asset_id: &AssetId,
        update: LineUpdate,
    ) -> Result<()> {
        self.send(
            Operation::UpdateOrderLine,
            self.json_request(
                Method::PUT,
                &["order", order_id.as_str(), "lines", asset_id.as_str()],
                &update,
            ),
        )
        .await
        .map(|_| ())
    }

    async fn delete_order_line(&self, order_id: &OrderId, asset_id: &AssetId) -> Result<()> {
        let body = DeleteOrderLineRequest {
            order_id: order_id.clone(),
            asset_id: asset_id.clone(),
        };
        self.send(
            Operation::DeleteOrderLine,
            self.json_request(Method::DELETE, &["order"], &body),
        )
        .await
        .map(|_| ())
    }

    async fn submit_payment(&self, input: PaymentInput) -> Result<serde_json::Value> {
        let body = self
            .send(
                Operation::SubmitPayment,
                self.json_request(Method::POST, &["payment"], &input),
            )
            .await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        decode(Operation::SubmitPayment, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpCommerceBackend {
        HttpCommerceBackend::new(BackendConfig::default().with_base_url(base)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_prefix() {
        let b = backend("http://localhost:3000");
        assert_eq!(
            b.endpoint(&["estimate", "est-1"]).as_str(),
            "http://localhost:3000/api/payment/estimate/est-1"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let b = backend("https://shop.example.com/storefront/");
        assert_eq!(
            b.endpoint(&["order", "ord-1", "lines", "A"]).as_str(),
            "https://shop.example.com/storefront/api/payment/order/ord-1/lines/A"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let b = backend("http://localhost:3000");
        assert_eq!(
            b.endpoint(&["estimate", "a/b c"]).as_str(),
            "http://localhost:3000/api/payment/estimate/a%2Fb%20c"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpCommerceBackend::new(BackendConfig::default().with_base_url("not a url"));
        assert!(matches!(result, Err(BackendError::Config(_))));

        let result = HttpCommerceBackend::new(BackendConfig::default().with_base_url("mailto:x@y"));
        assert!(matches!(result, Err(BackendError::Config(_))));
    }
}
