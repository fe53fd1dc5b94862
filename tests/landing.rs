use axum::{
    body::Body,
    http::{header::LOCATION, Request, StatusCode},
};
use light::{redirect::BackendOrigin, server::landing_routes};
use tower::ServiceExt;

async fn get(origin: BackendOrigin, uri: &str) -> axum::response::Response {
    landing_routes(origin)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn landing_page_does_not_redirect() {
    let response = get(BackendOrigin::default(), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(LOCATION).is_none());

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(r#"href="/connect""#));
    assert!(html.contains("Connect to Gmail"));
}

#[tokio::test]
async fn connect_redirects_to_default_backend() {
    let response = get(BackendOrigin::resolve(None), "/connect").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "https://lighter-delv.onrender.com/login"
    );
}

#[tokio::test]
async fn connect_uses_configured_backend() {
    let response = get(
        BackendOrigin::resolve(Some("https://api.example.com")),
        "/connect",
    )
    .await;

    assert_eq!(location(&response), "https://api.example.com/login");
}

#[tokio::test]
async fn connect_keeps_trailing_slash_verbatim() {
    let response = get(
        BackendOrigin::resolve(Some("https://api.example.com/")),
        "/connect",
    )
    .await;

    assert_eq!(location(&response), "https://api.example.com//login");
}

#[tokio::test]
async fn repeated_clicks_hit_the_same_target() {
    let origin = BackendOrigin::resolve(Some("https://api.example.com"));
    let first = get(origin.clone(), "/connect").await;
    let second = get(origin, "/connect").await;

    assert_eq!(location(&first), location(&second));
}

#[tokio::test]
async fn connect_encodes_non_ascii_origin() {
    let response = get(
        BackendOrigin::resolve(Some("https://bücher.example")),
        "/connect",
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://b%C3%BCcher.example/login");
}

#[tokio::test]
async fn connect_encodes_control_characters() {
    let response = get(
        BackendOrigin::resolve(Some("https://api.example.com\r\n")),
        "/connect",
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://api.example.com%0D%0A/login");
}
