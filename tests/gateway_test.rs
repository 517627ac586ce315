//! HTTP gateway behavior against a mocked record store.

use assert_matches::assert_matches;
use cartwheel::{Cart, CartGateway, CartLineItem, DiscountType, GatewayError, HttpCartGateway};
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> HttpCartGateway {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    HttpCartGateway::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn line_item(product: &str, qty: u32) -> CartLineItem {
    CartLineItem {
        product_id: product.to_string(),
        variant_id: "v1".to_string(),
        name: "Organic Honey".to_string(),
        variant_label: "500 g".to_string(),
        image: "/img/honey.jpg".to_string(),
        category: "Pantry".to_string(),
        unit_price: dec!(249.00),
        quantity: qty,
        available_stock: 20,
    }
}

fn coupon_json() -> serde_json::Value {
    json!({
        "code": "SAVE20",
        "discount_type": "PERCENTAGE",
        "discount_value": 20,
        "max_discount_value": 150,
        "min_order_value": 500,
        "validity": {
            "start_date": "2024-01-01T00:00:00Z",
            "end_date": "2030-01-01T00:00:00Z"
        },
        "is_active": true,
        "usage_stats": { "remaining": 42 }
    })
}

#[tokio::test]
async fn fetch_cart_reads_cart_and_coupon_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "email": "shopper@example.com",
            "addresses": [{"city": "Pune"}],
            "cart": [serde_json::to_value(line_item("p1", 2)).unwrap()],
            "usedCoupons": ["WELCOME10"]
        })))
        .mount(&server)
        .await;

    let record = gateway(&server).fetch_cart("u1").await.unwrap();
    assert_eq!(record.cart.len(), 1);
    assert_eq!(record.cart[0].product_id, "p1");
    assert_eq!(record.cart[0].quantity, 2);
    assert_eq!(record.used_coupons, vec!["WELCOME10".to_string()]);
}

#[tokio::test]
async fn fetch_cart_defaults_missing_cart_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "u1", "email": "shopper@example.com" })),
        )
        .mount(&server)
        .await;

    let record = gateway(&server).fetch_cart("u1").await.unwrap();
    assert!(record.cart.is_empty());
    assert!(record.used_coupons.is_empty());
}

#[tokio::test]
async fn fetch_cart_surfaces_remote_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = gateway(&server).fetch_cart("missing").await.unwrap_err();
    assert_matches!(err, GatewayError::Remote { status } if status.as_u16() == 404);
}

#[tokio::test]
async fn fetch_cart_rejects_malformed_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "cart": "definitely not a cart" })),
        )
        .mount(&server)
        .await;

    let err = gateway(&server).fetch_cart("u1").await.unwrap_err();
    assert_matches!(err, GatewayError::Schema(_));
}

#[tokio::test]
async fn replace_cart_patches_only_the_cart_field() {
    let server = MockServer::start().await;
    let cart = Cart::new(vec![line_item("p1", 2), line_item("p2", 1)]);

    // The body must carry the cart field and nothing else, so the rest of
    // the account record stays untouched.
    let expected = json!({ "cart": serde_json::to_value(cart.items()).unwrap() });
    Mock::given(method("PATCH"))
        .and(path("/users/u1"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server).replace_cart("u1", &cart).await.unwrap();
}

#[tokio::test]
async fn replace_cart_surfaces_remote_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .replace_cart("u1", &Cart::default())
        .await
        .unwrap_err();
    assert_matches!(err, GatewayError::Remote { status } if status.as_u16() == 500);
}

#[tokio::test]
async fn fetch_coupon_unwraps_single_element_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coupons"))
        .and(query_param("code", "SAVE20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([coupon_json()])))
        .mount(&server)
        .await;

    let coupon = gateway(&server).fetch_coupon("SAVE20").await.unwrap();
    let coupon = coupon.expect("coupon should be found");
    assert_eq!(coupon.code, "SAVE20");
    assert_eq!(coupon.discount_type, DiscountType::Percentage);
    assert_eq!(coupon.max_discount_value, Some(dec!(150)));
}

#[tokio::test]
async fn fetch_coupon_empty_array_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coupons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(gateway(&server).fetch_coupon("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn slow_record_store_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "cart": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let gateway = HttpCartGateway::new(server.uri(), Duration::from_millis(50)).unwrap();
    let err = gateway.fetch_cart("u1").await.unwrap_err();
    assert_matches!(err, GatewayError::Network(_));
}
