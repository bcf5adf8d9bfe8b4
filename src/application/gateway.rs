use crate::application::signer;
use crate::domain::config::{ConfigUpdate, GatewayConfig};
use crate::domain::payment::{
    CheckoutForm, DEFAULT_PRODUCT_DESCRIPTION, DEFAULT_PRODUCT_TYPE, PAYMENT_METHOD,
    PaymentInitiation, PaymentRequest, normalize_phone, normalize_time_limit,
};
use crate::error::{GatewayError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    merchant_code: &'a str,
    consumer_secret: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: Option<String>,
    message: Option<String>,
}

/// Result of checking the configured credentials against the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCheck {
    pub success: bool,
    pub message: String,
    pub token_received: bool,
}

/// Client for the gateway's merchant authentication and checkout flow.
///
/// Holds the current configuration as an immutable snapshot. Every operation
/// works on the snapshot it captured when it started; `update_configuration`
/// installs a new snapshot without affecting calls already in flight.
///
/// No retries happen here. A failed token exchange is reported to the caller,
/// which owns the retry policy.
pub struct GatewayClient {
    http: reqwest::Client,
    config: RwLock<Arc<GatewayConfig>>,
}

impl GatewayClient {
    /// Creates a client using the configuration's timeout and TLS settings.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| {
                GatewayError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// The configuration snapshot new operations will use.
    pub async fn config(&self) -> Arc<GatewayConfig> {
        self.config.read().await.clone()
    }

    /// Merges a partial credential update into a new configuration snapshot.
    ///
    /// Changing the environment switches the endpoint pair immediately.
    /// Timeout and TLS verification stay as the client was built with.
    pub async fn update_configuration(&self, update: &ConfigUpdate) -> Arc<GatewayConfig> {
        let mut current = self.config.write().await;
        let next = Arc::new(current.apply(update));
        info!(
            environment = %next.environment,
            merchant_code = %next.merchant_code,
            "Gateway configuration updated"
        );
        *current = next.clone();
        next
    }

    /// Exchanges the merchant credentials for a bearer token.
    pub async fn authenticate(&self) -> Result<String> {
        let config = self.config().await;
        self.authenticate_with(&config).await
    }

    async fn authenticate_with(&self, config: &GatewayConfig) -> Result<String> {
        if !config.missing_credentials().is_empty() {
            return Err(GatewayError::ConfigurationError(
                "Missing required credentials. Please configure merchant code, consumer secret, and API key."
                    .to_string(),
            ));
        }

        let endpoint = &config.active_endpoints().token;
        debug!(endpoint = %endpoint, "Requesting gateway access token");

        let response = self
            .http
            .post(endpoint)
            .header("Api-Key", &config.api_key)
            .json(&TokenRequest {
                merchant_code: &config.merchant_code,
                consumer_secret: &config.consumer_secret,
            })
            .send()
            .await
            .map_err(|e| {
                let message = format!("Failed to connect to Jenga API: {}", e);
                error!(error = %e, "Jenga API request failed");
                GatewayError::AuthenticationError(message)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            GatewayError::AuthenticationError(format!("Failed to connect to Jenga API: {}", e))
        })?;

        if status == StatusCode::OK {
            if body.trim().is_empty() {
                return Err(GatewayError::AuthenticationError(
                    "Empty response from Jenga API".to_string(),
                ));
            }
            let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                GatewayError::AuthenticationError(format!("Invalid JSON response: {}", e))
            })?;
            match parsed.access_token {
                Some(token) if !token.is_empty() => return Ok(token),
                _ => {
                    let message = parsed
                        .message
                        .unwrap_or_else(|| "Authentication failed".to_string());
                    error!(status = status.as_u16(), message = %message, "Jenga authentication error");
                    return Err(GatewayError::AuthenticationError(message));
                }
            }
        }

        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_default();
        let message = authentication_failure_message(status, parsed.message);
        error!(
            status = status.as_u16(),
            message = %message,
            response = %body,
            "Jenga authentication error"
        );
        Err(GatewayError::AuthenticationError(message))
    }

    /// Validates a checkout request and assembles the form the end user posts
    /// to the gateway.
    ///
    /// Never calls the payment endpoint itself. Signature problems are logged
    /// and the form goes out unsigned.
    pub async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        let order = request.validate()?;

        let config = self.config().await;
        let token = self.authenticate_with(&config).await?;

        let callback_url = request
            .callback_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| config.callback_url.clone());
        let amount = request.order_amount.as_deref().unwrap_or_default().trim();

        let signature = match signer::sign(
            &config.merchant_code,
            order.order_reference,
            order.currency,
            amount,
            &callback_url,
            config.private_key.as_deref().unwrap_or_default(),
        ) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(error = %e, "Signature generation failed, proceeding without signature");
                String::new()
            }
        };

        let order_items = match &request.order_items {
            Some(items) => serde_json::to_string(items)?,
            None => "[]".to_string(),
        };

        let form_data = CheckoutForm {
            token,
            signature,
            merchant_code: config.merchant_code.clone(),
            currency: order.currency.to_string(),
            country_code: order.country_code.to_string(),
            order_amount: amount.to_string(),
            order_reference: order.order_reference.to_string(),
            product_type: request
                .product_type
                .clone()
                .unwrap_or_else(|| DEFAULT_PRODUCT_TYPE.to_string()),
            product_description: request
                .product_description
                .clone()
                .unwrap_or_else(|| DEFAULT_PRODUCT_DESCRIPTION.to_string()),
            extra_data: request.extra_data.clone().unwrap_or_default(),
            payment_time_limit: normalize_time_limit(request.payment_time_limit.as_deref()),
            customer_first_name: order.first_name.to_string(),
            customer_last_name: order.last_name.to_string(),
            customer_email: order.email.to_string(),
            customer_phone: normalize_phone(order.phone),
            customer_postal_code_zip: request.customer.postal_code.clone().unwrap_or_default(),
            customer_address: request.customer.address.clone().unwrap_or_default(),
            callback_url,
            secondary_reference: request.secondary_reference.clone().unwrap_or_default(),
            order_items,
        };

        info!(
            order_reference = %form_data.order_reference,
            amount = %form_data.order_amount,
            signed = !form_data.signature.is_empty(),
            "Payment initiation prepared"
        );

        Ok(PaymentInitiation {
            payment_url: config.active_endpoints().payment.clone(),
            form_data,
            method: PAYMENT_METHOD,
        })
    }

    /// Checks that the credentials are complete and accepted by the gateway.
    pub async fn test_connection(&self) -> ConnectionCheck {
        let config = self.config().await;
        let result = match config.validate_credentials() {
            Ok(()) => self.authenticate_with(&config).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(token) => ConnectionCheck {
                success: true,
                message: "Connection successful".to_string(),
                token_received: !token.is_empty(),
            },
            Err(e) => ConnectionCheck {
                success: false,
                message: failure_detail(&e),
                token_received: false,
            },
        }
    }
}

fn authentication_failure_message(status: StatusCode, reported: Option<String>) -> String {
    match status.as_u16() {
        401 => "401: Authentication Error. Kindly contact us for support!".to_string(),
        code @ (500 | 502 | 504) => {
            format!("{}: Internal Server Error. Kindly contact us for support!", code)
        }
        404 => "404: Resource Not found Error. Kindly contact us for support!".to_string(),
        _ => reported
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Authentication failed".to_string()),
    }
}

/// The message of an error without its kind prefix.
fn failure_detail(error: &GatewayError) -> String {
    match error {
        GatewayError::ConfigurationError(m)
        | GatewayError::AuthenticationError(m)
        | GatewayError::ValidationError(m) => m.clone(),
        other => other.to_string(),
    }
}
