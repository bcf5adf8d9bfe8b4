use jenga_pgw::application::gateway::GatewayClient;
use jenga_pgw::domain::config::{ConfigUpdate, Endpoints, Environment, GatewayConfig};
use jenga_pgw::domain::payment::{CustomerDetails, PaymentRequest};
use jenga_pgw::error::GatewayError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &str = include_str!("fixtures/private_key.pem");

fn endpoints(server: &MockServer, prefix: &str) -> Endpoints {
    Endpoints {
        token: format!("{}/{}/token", server.uri(), prefix),
        payment: format!("{}/{}/processPayment", server.uri(), prefix),
    }
}

fn client(server: &MockServer, private_key: &str) -> GatewayClient {
    let config = GatewayConfig::builder()
        .merchant_code("JENGA001")
        .consumer_secret("secret")
        .api_key("api-key-123")
        .private_key(private_key)
        .callback_url("https://shop.example.com/kcejenga/callback")
        .endpoints(Environment::Sandbox, endpoints(server, "sandbox"))
        .endpoints(Environment::Production, endpoints(server, "production"))
        .build();
    GatewayClient::new(config).unwrap()
}

fn request() -> PaymentRequest {
    PaymentRequest {
        order_reference: Some("ORD12345AB".to_string()),
        order_amount: Some("1000.00".to_string()),
        currency: Some("KES".to_string()),
        country_code: Some("KE".to_string()),
        customer: CustomerDetails {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            phone: Some("+254 712-345-678".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn mount_token(server: &MockServer, prefix: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/token", prefix)))
        .and(header("Api-Key", "api-key-123"))
        .and(body_json(json!({
            "merchantCode": "JENGA001",
            "consumerSecret": "secret",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "tok-123" })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authenticate_returns_token() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let token = client(&server, "").authenticate().await.unwrap();
    assert_eq!(token, "tok-123");
}

#[tokio::test]
async fn test_authenticate_maps_status_codes() {
    let cases = [
        (401, json!({}), "401: Authentication Error. Kindly contact us for support!"),
        (504, json!({}), "504: Internal Server Error. Kindly contact us for support!"),
        (404, json!({}), "404: Resource Not found Error. Kindly contact us for support!"),
        (403, json!({ "message": "Merchant suspended" }), "Merchant suspended"),
        (400, json!({}), "Authentication failed"),
    ];

    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sandbox/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        let err = client(&server, "").authenticate().await.unwrap_err();
        match err {
            GatewayError::AuthenticationError(message) => assert_eq!(message, expected),
            other => panic!("unexpected error for {}: {:?}", status, other),
        }
    }
}

#[tokio::test]
async fn test_authenticate_without_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandbox/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Invalid merchant" })))
        .mount(&server)
        .await;

    let err = client(&server, "").authenticate().await.unwrap_err();
    assert!(matches!(err, GatewayError::AuthenticationError(m) if m == "Invalid merchant"));
}

#[tokio::test]
async fn test_authenticate_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandbox/token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client(&server, "").authenticate().await.unwrap_err();
    assert!(matches!(err, GatewayError::AuthenticationError(m) if m == "Empty response from Jenga API"));
}

#[tokio::test]
async fn test_authenticate_transport_failure() {
    let server = MockServer::start().await;
    let client = client(&server, "");
    drop(server);

    let err = client.authenticate().await.unwrap_err();
    assert!(
        matches!(err, GatewayError::AuthenticationError(ref m) if m.starts_with("Failed to connect to Jenga API")),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_initiate_payment_builds_signed_form() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let mut request = request();
    request.payment_time_limit = Some("30".to_string());
    request.order_items = Some(json!([{ "name": "Widget", "quantity": 2 }]));

    let initiation = client(&server, PRIVATE_KEY)
        .initiate_payment(&request)
        .await
        .unwrap();

    assert_eq!(initiation.payment_url, format!("{}/sandbox/processPayment", server.uri()));
    assert_eq!(initiation.method, "POST");

    let form = &initiation.form_data;
    assert_eq!(form.token, "tok-123");
    assert_eq!(form.order_reference, "ORD12345AB");
    assert_eq!(form.order_amount, "1000.00");
    assert_eq!(form.customer_phone, "254712345678");
    assert_eq!(form.payment_time_limit, "30mins");
    assert_eq!(form.product_type, "Product");
    assert_eq!(form.product_description, "Payment via Jenga Gateway");
    assert_eq!(form.callback_url, "https://shop.example.com/kcejenga/callback");
    assert_eq!(form.order_items, r#"[{"name":"Widget","quantity":2}]"#);
    assert_eq!(
        form.signature,
        include_str!("fixtures/expected_signature.b64").trim()
    );

    let fields = initiation.form_fields();
    assert_eq!(fields[0], ("token", "tok-123"));
    assert!(fields.contains(&("orderReference", "ORD12345AB")));
}

#[tokio::test]
async fn test_initiate_defaults() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let mut request = request();
    request.callback_url = Some("https://other.example.com/cb".to_string());

    let initiation = client(&server, "").initiate_payment(&request).await.unwrap();
    let form = &initiation.form_data;
    assert_eq!(form.payment_time_limit, "15mins");
    assert_eq!(form.order_items, "[]");
    assert_eq!(form.callback_url, "https://other.example.com/cb");
    assert_eq!(form.customer_address, "");
}

#[tokio::test]
async fn test_placeholder_key_initiates_unsigned() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let initiation = client(&server, "placeholder")
        .initiate_payment(&request())
        .await
        .unwrap();
    assert_eq!(initiation.form_data.signature, "");
}

#[tokio::test]
async fn test_unparseable_key_initiates_unsigned() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let broken = PRIVATE_KEY.replace('M', "x");
    let initiation = client(&server, &broken)
        .initiate_payment(&request())
        .await
        .unwrap();
    assert_eq!(initiation.form_data.signature, "");
}

#[tokio::test]
async fn test_invalid_requests_make_no_network_calls() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 0).await;
    let client = client(&server, "");

    let mut negative = request();
    negative.order_amount = Some("-5".to_string());
    let mut short = request();
    short.order_reference = Some("ORD1".to_string());
    let mut punctuated = request();
    punctuated.order_reference = Some("ORD-12345".to_string());
    let mut missing = request();
    missing.customer.email = None;

    let cases = [
        (negative, "orderAmount"),
        (short, "at least 8 characters"),
        (punctuated, "alphanumeric"),
        (missing, "Missing required field: customerEmail"),
    ];

    for (request, fragment) in cases {
        let err = client.initiate_payment(&request).await.unwrap_err();
        match err {
            GatewayError::ValidationError(message) => {
                assert!(message.contains(fragment), "{} !~ {}", message, fragment)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_authentication_failure_aborts_initiation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandbox/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, "").initiate_payment(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::AuthenticationError(_)));
}

#[tokio::test]
async fn test_environment_switch_changes_endpoints() {
    let server = MockServer::start().await;
    mount_token(&server, "production", 1).await;
    let client = client(&server, "");

    client
        .update_configuration(&ConfigUpdate {
            environment: Some(Environment::Production),
            ..Default::default()
        })
        .await;

    let initiation = client.initiate_payment(&request()).await.unwrap();
    assert_eq!(
        initiation.payment_url,
        format!("{}/production/processPayment", server.uri())
    );
}

#[tokio::test]
async fn test_connection_check() {
    let server = MockServer::start().await;
    mount_token(&server, "sandbox", 1).await;

    let check = client(&server, "").test_connection().await;
    assert!(check.success);
    assert!(check.token_received);
    assert_eq!(check.message, "Connection successful");
}
