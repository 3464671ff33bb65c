//! ledgerd HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, ChargeGrantRequest, FinalizeRequest, FinalizeResponse,
    GrantResponse, ReconcileResponse, ReleaseAllRequest, ReleaseAllResponse, ReservationResponse,
    ReserveRequest, SetSubscriptionRequest, SetSubscriptionResponse,
};

/// ledgerd API client.
///
/// Drives the reservation lifecycle and billing writes against a ledgerd
/// service.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl LedgerClient {
    /// Create a new ledgerd client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the ledgerd service (e.g., `"http://ledgerd:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new ledgerd client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Reserve credits ahead of a generation job.
    ///
    /// Supplying a `reservation_id` makes the call retry-safe; replays
    /// return the original hold with `was_idempotent = true`.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionRequired` or `InsufficientCredits` when the
    /// user cannot cover the job, or an error if the request fails.
    pub async fn reserve(
        &self,
        request: ReserveRequest,
    ) -> Result<ReservationResponse, ClientError> {
        let url = format!("{}/v1/reservations", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Bind a provider request id to a reservation.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when a different id is already attached, or an
    /// error if the request fails.
    pub async fn attach_external_id(
        &self,
        reservation_id: &str,
        external_request_id: &str,
    ) -> Result<(), ClientError> {
        let url = format!("{}/v1/reservations/{reservation_id}/external", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&serde_json::json!({ "external_request_id": external_request_id }))
            .send()
            .await?;

        self.handle_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Settle a reservation once the job's outcome is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn finalize(
        &self,
        request: FinalizeRequest,
    ) -> Result<FinalizeResponse, ClientError> {
        let url = format!("{}/v1/reservations/finalize", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Release every open reservation for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn release_all(
        &self,
        request: ReleaseAllRequest,
    ) -> Result<ReleaseAllResponse, ClientError> {
        let url = format!("{}/v1/reservations/release-all", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Grant plan credits for a successful recurring charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grant_for_charge(
        &self,
        request: ChargeGrantRequest,
    ) -> Result<GrantResponse, ClientError> {
        let url = format!("{}/v1/grants/charge", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Set or replace a user's subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn set_subscription(
        &self,
        request: SetSubscriptionRequest,
    ) -> Result<SetSubscriptionResponse, ClientError> {
        let url = format!("{}/v1/subscriptions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Reconcile a user's reserved balance against open reservations.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn reconcile(&self, user_id: &str) -> Result<ReconcileResponse, ClientError> {
        let url = format!("{}/v1/reconcile", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a user's current balance (requires user bearer token, not the
    /// service API key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self, user_jwt: &str) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/credits/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                // Map specific error codes to typed errors
                match code {
                    "insufficient_credits" => {
                        let balance = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("balance"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);
                        let required = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("required"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);

                        Err(ClientError::InsufficientCredits { balance, required })
                    }
                    "subscription_required" => Err(ClientError::SubscriptionRequired),
                    "forbidden" => Err(ClientError::Forbidden),
                    "conflict" => Err(ClientError::Conflict(message)),
                    "not_found" => Err(ClientError::NotFound(message)),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
