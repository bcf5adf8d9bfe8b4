use super::string_or_number;
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_ORDER_REFERENCE_LEN: usize = 8;
pub const MAX_PRODUCT_DESCRIPTION_LEN: usize = 200;
pub const DEFAULT_PAYMENT_TIME_LIMIT: &str = "15mins";
pub const DEFAULT_PRODUCT_TYPE: &str = "Product";
pub const DEFAULT_PRODUCT_DESCRIPTION: &str = "Payment via Jenga Gateway";
pub const PAYMENT_METHOD: &str = "POST";

/// A positive order amount.
///
/// Keeps the caller's scale: `1000.00` displays as `1000.00`, which matters
/// because the displayed text is what gets signed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct OrderAmount(Decimal);

impl OrderAmount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(invalid_amount())
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for OrderAmount {
    type Err = GatewayError;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let value = Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| invalid_amount())?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for OrderAmount {
    type Error = GatewayError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for OrderAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn invalid_amount() -> GatewayError {
    GatewayError::ValidationError("orderAmount must be a positive number".to_string())
}

/// Customer fields of a checkout; flat `customer*` keys on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(rename = "customerFirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "customerLastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "customerEmail", default)]
    pub email: Option<String>,
    #[serde(rename = "customerPhone", default)]
    pub phone: Option<String>,
    #[serde(rename = "customerPostalCodeZip", default)]
    pub postal_code: Option<String>,
    #[serde(rename = "customerAddress", default)]
    pub address: Option<String>,
}

/// A payment initiation request as supplied by the merchant application.
///
/// Every field is optional at this level so that validation can report the
/// first missing one by its gateway name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default)]
    pub order_reference: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(flatten)]
    pub customer: CustomerDetails,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub extra_data: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub payment_time_limit: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub secondary_reference: Option<String>,
    #[serde(default)]
    pub order_items: Option<serde_json::Value>,
}

/// The request fields that passed validation, borrowed from the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder<'a> {
    pub order_reference: &'a str,
    pub amount: OrderAmount,
    pub currency: &'a str,
    pub country_code: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

impl PaymentRequest {
    /// Checks the request against the gateway's field rules.
    ///
    /// Runs before any network traffic; each rule has its own message.
    pub fn validate(&self) -> Result<ValidatedOrder<'_>> {
        let order_reference = required("orderReference", &self.order_reference)?;
        let order_amount = required("orderAmount", &self.order_amount)?;
        let currency = required("currency", &self.currency)?;
        let first_name = required("customerFirstName", &self.customer.first_name)?;
        let last_name = required("customerLastName", &self.customer.last_name)?;
        let email = required("customerEmail", &self.customer.email)?;
        let phone = required("customerPhone", &self.customer.phone)?;
        let country_code = required("countryCode", &self.country_code)?;

        if order_reference.len() < MIN_ORDER_REFERENCE_LEN {
            return Err(GatewayError::ValidationError(format!(
                "orderReference must be at least {} characters long",
                MIN_ORDER_REFERENCE_LEN
            )));
        }
        if !order_reference.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GatewayError::ValidationError(
                "orderReference must be alphanumeric".to_string(),
            ));
        }
        if let Some(description) = &self.product_description
            && description.chars().count() > MAX_PRODUCT_DESCRIPTION_LEN
        {
            return Err(GatewayError::ValidationError(format!(
                "productDescription must not exceed {} characters",
                MAX_PRODUCT_DESCRIPTION_LEN
            )));
        }
        let amount = order_amount.parse::<OrderAmount>()?;

        Ok(ValidatedOrder {
            order_reference,
            amount,
            currency,
            country_code,
            first_name,
            last_name,
            email,
            phone,
        })
    }
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| GatewayError::ValidationError(format!("Missing required field: {}", name)))
}

/// Strips everything but ASCII digits.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Applies the gateway's `<n>mins` format to a payment time limit.
pub fn normalize_time_limit(limit: Option<&str>) -> String {
    match limit.map(str::trim) {
        None | Some("") => DEFAULT_PAYMENT_TIME_LIMIT.to_string(),
        Some(limit) if Decimal::from_str(limit).is_ok() => format!("{}mins", limit),
        Some(limit) => limit.to_string(),
    }
}

/// The field set the end user's browser posts to the payment endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub token: String,
    pub signature: String,
    pub merchant_code: String,
    pub currency: String,
    pub country_code: String,
    pub order_amount: String,
    pub order_reference: String,
    pub product_type: String,
    pub product_description: String,
    pub extra_data: String,
    pub payment_time_limit: String,
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_postal_code_zip: String,
    pub customer_address: String,
    pub callback_url: String,
    pub secondary_reference: String,
    pub order_items: String,
}

impl CheckoutForm {
    /// Form fields in the order the gateway documents them.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("token", &self.token),
            ("signature", &self.signature),
            ("merchantCode", &self.merchant_code),
            ("currency", &self.currency),
            ("countryCode", &self.country_code),
            ("orderAmount", &self.order_amount),
            ("orderReference", &self.order_reference),
            ("productType", &self.product_type),
            ("productDescription", &self.product_description),
            ("extraData", &self.extra_data),
            ("paymentTimeLimit", &self.payment_time_limit),
            ("customerFirstName", &self.customer_first_name),
            ("customerLastName", &self.customer_last_name),
            ("customerEmail", &self.customer_email),
            ("customerPhone", &self.customer_phone),
            ("customerPostalCodeZip", &self.customer_postal_code_zip),
            ("customerAddress", &self.customer_address),
            ("callbackUrl", &self.callback_url),
            ("secondaryReference", &self.secondary_reference),
            ("orderItems", &self.order_items),
        ]
    }
}

/// What the caller needs to send the end user to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInitiation {
    pub payment_url: String,
    pub form_data: CheckoutForm,
    pub method: &'static str,
}

impl PaymentInitiation {
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        self.form_data.fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn complete_request() -> PaymentRequest {
        PaymentRequest {
            order_reference: Some("ORD12345AB".to_string()),
            order_amount: Some("1000.00".to_string()),
            currency: Some("KES".to_string()),
            country_code: Some("KE".to_string()),
            customer: CustomerDetails {
                first_name: Some("Jane".to_string()),
                last_name: Some("Doe".to_string()),
                email: Some("jane@example.com".to_string()),
                phone: Some("+254 700-000000".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_amount_validation() {
        assert!(OrderAmount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            OrderAmount::new(dec!(0.0)),
            Err(GatewayError::ValidationError(_))
        ));
        assert!("-5".parse::<OrderAmount>().is_err());
        assert!("abc".parse::<OrderAmount>().is_err());
        assert_eq!("1e3".parse::<OrderAmount>().unwrap().value(), dec!(1000));
    }

    #[test]
    fn test_amount_keeps_scale() {
        let amount: OrderAmount = "1000.00".parse().unwrap();
        assert_eq!(amount.to_string(), "1000.00");
    }

    #[test]
    fn test_validate_complete_request() {
        let request = complete_request();
        let order = request.validate().unwrap();
        assert_eq!(order.order_reference, "ORD12345AB");
        assert_eq!(order.amount.value(), dec!(1000.00));
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let mut request = complete_request();
        request.currency = None;
        request.country_code = None;

        let err = request.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Missing required field: currency"
        );
    }

    #[test]
    fn test_validate_order_reference_rules() {
        let mut request = complete_request();
        request.order_reference = Some("ORD123".to_string());
        assert!(
            request
                .validate()
                .unwrap_err()
                .to_string()
                .contains("at least 8 characters")
        );

        request.order_reference = Some("ORD-12345".to_string());
        assert!(
            request
                .validate()
                .unwrap_err()
                .to_string()
                .contains("alphanumeric")
        );
    }

    #[test]
    fn test_validate_description_length() {
        let mut request = complete_request();
        request.product_description = Some("x".repeat(200));
        assert!(request.validate().is_ok());

        request.product_description = Some("x".repeat(201));
        assert!(
            request
                .validate()
                .unwrap_err()
                .to_string()
                .contains("productDescription")
        );
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+254 (700) 000-000"), "254700000000");
    }

    #[test]
    fn test_normalize_time_limit() {
        assert_eq!(normalize_time_limit(None), "15mins");
        assert_eq!(normalize_time_limit(Some("30")), "30mins");
        assert_eq!(normalize_time_limit(Some("2hours")), "2hours");
        assert_eq!(normalize_time_limit(Some("inf")), "inf");
        assert_eq!(normalize_time_limit(Some("NaN")), "NaN");
        assert_eq!(normalize_time_limit(Some("infinity")), "infinity");
    }

    #[test]
    fn test_request_deserializes_wire_shape() {
        let json = r#"{
            "orderReference": "ORD12345AB",
            "orderAmount": 250,
            "currency": "KES",
            "countryCode": "KE",
            "customerFirstName": "Jane",
            "customerPhone": "0700000000",
            "paymentTimeLimit": 20,
            "orderItems": [{"name": "Mug", "qty": 2}]
        }"#;
        let request: PaymentRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.order_amount.as_deref(), Some("250"));
        assert_eq!(request.payment_time_limit.as_deref(), Some("20"));
        assert_eq!(request.customer.first_name.as_deref(), Some("Jane"));
        assert_eq!(request.customer.last_name, None);
        assert!(request.order_items.is_some());
    }
}
