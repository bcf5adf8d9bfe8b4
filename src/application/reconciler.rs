use crate::domain::callback::{CallbackPayload, parse_transaction_date};
use crate::domain::config::GatewayConfig;
use crate::domain::payment_entity::{PaymentStatus, PaymentSummary};
use crate::domain::ports::{PaymentRepository, PaymentRepositoryBox, TransactionStoreBox};
use crate::domain::transaction::{NewTransaction, TransactionRecord, normalize_status};
use crate::error::{GatewayError, Result};
use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// A new delivery was recorded.
    Processed,
    /// The delivery was already recorded; nothing new was stored.
    Duplicate,
    /// The payload lacked the fields needed to reconcile it.
    Rejected,
    /// Something unexpected failed while handling the delivery.
    Error,
}

/// What handling one callback delivery amounted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub outcome: Outcome,
    pub success: bool,
    pub message: String,
    /// Normalized transaction data derived from the payload.
    pub transaction: Option<NewTransaction>,
    /// Whether the host application's payment reached the requested state.
    pub payment_completed: bool,
    /// Status as the gateway reported it.
    pub reported_status: String,
}

impl ReconciliationOutcome {
    fn rejected() -> Self {
        Self {
            outcome: Outcome::Rejected,
            success: false,
            message: "Missing required fields".to_string(),
            transaction: None,
            payment_completed: false,
            reported_status: String::new(),
        }
    }

    fn error(cause: &GatewayError) -> Self {
        Self {
            outcome: Outcome::Error,
            success: false,
            message: format!("Error processing callback: {}", cause),
            transaction: None,
            payment_completed: false,
            reported_status: String::new(),
        }
    }
}

/// How the caller of the callback endpoint wants to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Browser,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackResponse {
    Json { status: StatusCode, body: Value },
    Redirect { location: String },
}

/// The latest recorded transaction for an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStatusView {
    pub success: bool,
    pub transaction: TransactionRecord,
    pub payment: Option<PaymentSummary>,
}

/// Records gateway callbacks and moves the host application's payments along.
///
/// Storage problems while recording are logged and swallowed so the gateway
/// always gets an answer it will not retry. The payments collaborator is
/// optional; without one, payment transitions are skipped.
pub struct CallbackReconciler {
    transactions: TransactionStoreBox,
    payments: Option<PaymentRepositoryBox>,
    config: Arc<GatewayConfig>,
}

impl CallbackReconciler {
    pub fn new(
        transactions: TransactionStoreBox,
        payments: Option<PaymentRepositoryBox>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            transactions,
            payments,
            config,
        }
    }

    /// Handles one callback delivery. Never fails; failures become `Outcome::Error`.
    pub async fn handle(&self, payload: &CallbackPayload) -> ReconciliationOutcome {
        match self.reconcile(payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    error = %e,
                    payload = ?payload,
                    "Jenga callback error"
                );
                ReconciliationOutcome::error(&e)
            }
        }
    }

    /// Handles a delivery and renders the answer for the given caller.
    pub async fn handle_and_respond(
        &self,
        payload: &CallbackPayload,
        format: ResponseFormat,
    ) -> CallbackResponse {
        let outcome = self.handle(payload).await;
        self.respond(&outcome, format)
    }

    async fn reconcile(&self, payload: &CallbackPayload) -> Result<ReconciliationOutcome> {
        if !payload.has_required_fields() {
            warn!(payload = ?payload, "Jenga callback missing required fields");
            return Ok(ReconciliationOutcome::rejected());
        }

        let status = payload.status();
        let order_reference = payload.order_reference();
        let transaction_id = payload.transaction_id();

        if self.config.verify_hash {
            match payload.hash() {
                // TODO: verify once the gateway publishes its callback hash algorithm.
                Some(hash) => info!(hash = %hash, "Jenga callback hash received"),
                None => warn!(order_reference = %order_reference, "Jenga callback without hash"),
            }
        }

        let transaction_date = match payload.date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => parse_transaction_date(raw).unwrap_or_else(|| {
                warn!(date = %raw, "Failed to parse transaction date");
                Utc::now()
            }),
            None => Utc::now(),
        };

        let transaction = NewTransaction {
            order_status: normalize_status(status),
            order_reference: order_reference.to_string(),
            transaction_reference: transaction_id.unwrap_or_default().to_string(),
            transaction_amount: payload
                .amount
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "0.00".to_string()),
            // The callback does not carry the currency.
            transaction_currency: String::new(),
            payment_channel: payload.payment_channel().unwrap_or_default().to_string(),
            transaction_date,
        };

        if self.find_existing(order_reference, transaction_id).await?.is_some() {
            info!(
                order_reference = %order_reference,
                transaction_id = ?transaction_id,
                "Duplicate Jenga callback received"
            );
            let payment_completed = if transaction.is_successful() {
                self.complete_payment(payload).await
            } else {
                self.fail_payment(payload).await
            };
            return Ok(ReconciliationOutcome {
                outcome: Outcome::Duplicate,
                success: true,
                message: "Transaction already processed".to_string(),
                transaction: Some(transaction),
                payment_completed,
                reported_status: status.to_string(),
            });
        }

        if let Err(e) = self.transactions.insert(transaction.clone()).await {
            error!(error = %e, transaction = ?transaction, "Failed to store Jenga transaction");
        }

        if transaction.is_successful() {
            let payment_completed = self.complete_payment(payload).await;
            info!(
                order_reference = %order_reference,
                transaction_id = ?transaction_id,
                amount = %transaction.transaction_amount,
                channel = %transaction.payment_channel,
                payment_completed,
                "Jenga payment successful"
            );
            Ok(ReconciliationOutcome {
                outcome: Outcome::Processed,
                success: true,
                message: "Payment successful".to_string(),
                transaction: Some(transaction),
                payment_completed,
                reported_status: status.to_string(),
            })
        } else {
            warn!(
                order_reference = %order_reference,
                status = %status,
                transaction_id = ?transaction_id,
                "Jenga payment failed"
            );
            let payment_completed = self.fail_payment(payload).await;
            Ok(ReconciliationOutcome {
                outcome: Outcome::Processed,
                success: false,
                message: format!("Payment status: {}", status),
                transaction: Some(transaction),
                payment_completed,
                reported_status: status.to_string(),
            })
        }
    }

    async fn find_existing(
        &self,
        order_reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<TransactionRecord>> {
        if let Some(reference) = transaction_id
            && let Some(existing) = self.transactions.find_by_transaction_reference(reference).await?
        {
            return Ok(Some(existing));
        }
        self.transactions
            .find_successful_by_order_reference(order_reference)
            .await
    }

    /// Asks the payments collaborator to complete the order's payment.
    ///
    /// A payment that is already completed counts as success.
    async fn complete_payment(&self, payload: &CallbackPayload) -> bool {
        let Some(payments) = &self.payments else {
            debug!("Payment repository not configured, skipping payment completion");
            return false;
        };
        complete_with(&**payments, payload)
            .await
            .unwrap_or_else(|e| {
                error!(
                    error = %e,
                    order_reference = %payload.order_reference(),
                    transaction_id = ?payload.transaction_id(),
                    "Failed to complete payment via Jenga callback"
                );
                false
            })
    }

    async fn fail_payment(&self, payload: &CallbackPayload) -> bool {
        let Some(payments) = &self.payments else {
            return false;
        };
        fail_with(&**payments, payload)
            .await
            .unwrap_or_else(|e| {
                error!(
                    error = %e,
                    order_reference = %payload.order_reference(),
                    "Failed to mark payment as failed via Jenga callback"
                );
                false
            })
    }

    /// Latest recorded transaction for an order, with its payment if one is known.
    pub async fn status(&self, order_reference: &str) -> Result<TransactionStatusView> {
        let order_reference = order_reference.trim();
        if order_reference.is_empty() {
            return Err(GatewayError::ValidationError(
                "Order reference is required".to_string(),
            ));
        }

        let transaction = self
            .transactions
            .latest_for_order(order_reference)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Transaction not found".to_string()))?;

        let payment = match &self.payments {
            Some(payments) => match payments.find_by_any_reference(&[order_reference]).await {
                Ok(found) => found.map(|p| p.summary()),
                Err(e) => {
                    warn!(error = %e, order_reference = %order_reference, "Payment lookup failed");
                    None
                }
            },
            None => None,
        };

        Ok(TransactionStatusView {
            success: true,
            transaction,
            payment,
        })
    }

    /// Renders an outcome as a JSON body or a browser redirect.
    ///
    /// Both shapes carry the same status and references.
    pub fn respond(&self, outcome: &ReconciliationOutcome, format: ResponseFormat) -> CallbackResponse {
        match format {
            ResponseFormat::Json => json_response(outcome),
            ResponseFormat::Browser => CallbackResponse::Redirect {
                location: self.redirect_location(outcome),
            },
        }
    }

    fn redirect_location(&self, outcome: &ReconciliationOutcome) -> String {
        let tx = outcome.transaction.as_ref();
        let order_reference = tx.map(|t| t.order_reference.as_str()).unwrap_or_default();
        let transaction_id = tx.map(|t| t.transaction_reference.as_str()).unwrap_or_default();

        let (base, query): (&str, Vec<(&str, &str)>) = match (outcome.outcome, outcome.success) {
            (Outcome::Processed, true) => (
                self.config.success_url.as_str(),
                vec![
                    ("status", "success"),
                    ("orderReference", order_reference),
                    ("transactionId", transaction_id),
                    ("amount", tx.map(|t| t.transaction_amount.as_str()).unwrap_or_default()),
                    ("channel", tx.map(|t| t.payment_channel.as_str()).unwrap_or_default()),
                ],
            ),
            (Outcome::Duplicate, _) => (
                self.config.success_url.as_str(),
                vec![
                    ("status", "success"),
                    ("orderReference", order_reference),
                    ("transactionId", transaction_id),
                ],
            ),
            (Outcome::Processed, false) => (
                self.config.failure_url.as_str(),
                vec![
                    ("status", "failed"),
                    ("orderReference", order_reference),
                    ("transactionStatus", outcome.reported_status.as_str()),
                ],
            ),
            (Outcome::Rejected, _) => (self.config.failure_url.as_str(), vec![("status", "invalid")]),
            (Outcome::Error, _) => (self.config.failure_url.as_str(), vec![("status", "error")]),
        };

        let query = serde_urlencoded::to_string(&query).unwrap_or_default();
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}{}", base, separator, query)
    }
}

fn json_response(outcome: &ReconciliationOutcome) -> CallbackResponse {
    let (status, body) = match (outcome.outcome, outcome.success) {
        (Outcome::Processed, true) => (
            StatusCode::OK,
            json!({
                "success": true,
                "message": outcome.message,
                "transaction": outcome.transaction,
                "payment_completed": outcome.payment_completed,
            }),
        ),
        (Outcome::Processed, false) => (
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "message": outcome.message,
                "transaction": outcome.transaction,
            }),
        ),
        (Outcome::Duplicate, _) => (
            StatusCode::OK,
            json!({ "success": true, "message": outcome.message }),
        ),
        (Outcome::Rejected, _) => (
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": outcome.message }),
        ),
        (Outcome::Error, _) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "success": false, "message": outcome.message }),
        ),
    };
    CallbackResponse::Json { status, body }
}

/// `mark_completed` is idempotent, so it is requested again for payments that
/// already completed. Failed or cancelled payments are left alone.
async fn complete_with(payments: &dyn PaymentRepository, payload: &CallbackPayload) -> Result<bool> {
    let order_reference = payload.order_reference();
    let transaction_id = payload.transaction_id();

    let Some(payment) = payments
        .find_by_any_reference(&reference_candidates(order_reference, transaction_id))
        .await?
    else {
        warn!(
            order_reference = %order_reference,
            transaction_id = ?transaction_id,
            "Payment not found for order reference"
        );
        return Ok(false);
    };

    if payments.is_in_final_state(&payment) && payment.status != PaymentStatus::Completed {
        warn!(
            payment_id = payment.id,
            status = ?payment.status,
            "Payment already in a final state, not completing"
        );
        return Ok(true);
    }

    let completed = payments
        .mark_completed(
            &payment,
            transaction_id.unwrap_or(order_reference),
            provider_response(payload),
        )
        .await?;
    if completed {
        info!(
            payment_id = payment.id,
            transaction_id = %payment.transaction_id,
            jenga_transaction_id = ?transaction_id,
            order_reference = %order_reference,
            "Payment marked as completed via Jenga callback"
        );
    }
    Ok(completed)
}

/// A payment already in a final state is left alone and counts as success.
async fn fail_with(payments: &dyn PaymentRepository, payload: &CallbackPayload) -> Result<bool> {
    let status = payload.status();
    let Some(payment) = payments
        .find_by_any_reference(&reference_candidates(
            payload.order_reference(),
            payload.transaction_id(),
        ))
        .await?
    else {
        return Ok(false);
    };

    if payments.is_in_final_state(&payment) {
        return Ok(true);
    }

    let failed = payments
        .mark_failed(
            &payment,
            &format!("Payment status: {}", status),
            provider_response(payload),
        )
        .await?;
    if failed {
        info!(
            payment_id = payment.id,
            transaction_id = %payment.transaction_id,
            status = %status,
            "Payment marked as failed via Jenga callback"
        );
    }
    Ok(failed)
}

fn reference_candidates<'a>(order_reference: &'a str, transaction_id: Option<&'a str>) -> Vec<&'a str> {
    let mut candidates = vec![order_reference];
    if let Some(id) = transaction_id {
        candidates.push(id);
    }
    candidates
}

fn provider_response(payload: &CallbackPayload) -> Value {
    json!({
        "jenga_callback": payload,
        "jenga_transaction_id": payload.transaction_id(),
        "jenga_status": payload.status(),
        "jenga_payment_channel": payload.payment_channel(),
        "jenga_callback_received_at": Utc::now().to_rfc3339(),
    })
}
