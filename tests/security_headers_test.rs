use routebridge::{AppConfig, RawRequest, Response, RouteBridge, WireResponse};

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

fn assert_default_security_headers(wire: &WireResponse) {
    for (name, value) in SECURITY_HEADERS {
        assert_eq!(wire.header(name), Some(value), "{}", name);
    }
}

#[test]
fn response_has_no_security_headers_by_default() {
    let wire = Response::new().into_wire();
    for (name, _) in SECURITY_HEADERS {
        assert!(wire.header(name).is_none(), "{}", name);
    }
}

#[test]
fn security_headers_sets_all_five() {
    let mut res = Response::new();
    res.security_headers();
    assert_default_security_headers(&res.into_wire());
}

#[test]
fn response_allows_overrides() {
    let mut res = Response::new();
    res.security_headers()
        .set_header("X-Frame-Options", "SAMEORIGIN");

    let wire = res.into_wire();
    assert_eq!(wire.header("X-Frame-Options"), Some("SAMEORIGIN"));
    // 他の既定は維持
    assert_eq!(wire.header("X-Content-Type-Options"), Some("nosniff"));
}

#[tokio::test]
async fn pipeline_applies_security_headers_when_enabled() {
    let mut config = AppConfig::default();
    config.security_headers = true;
    let app = RouteBridge::builder()
        .config(config)
        .get("/", |_req, res| {
            res.send("ok")?;
            Ok(())
        })
        .build()
        .unwrap();

    assert_default_security_headers(&app.dispatch(RawRequest::new("GET", "/")).await);
    // エラー応答にも付与される
    assert_default_security_headers(&app.dispatch(RawRequest::new("GET", "/missing")).await);
    assert_default_security_headers(&app.dispatch(RawRequest::new("TRACE", "/")).await);
}

#[tokio::test]
async fn pipeline_leaves_security_headers_off_by_default() {
    let app = RouteBridge::builder()
        .config(AppConfig::default())
        .get("/", |_req, res| {
            res.send("ok")?;
            Ok(())
        })
        .build()
        .unwrap();

    let wire = app.dispatch(RawRequest::new("GET", "/")).await;
    assert!(wire.header("Strict-Transport-Security").is_none());
}

#[test]
fn header_injection_is_rejected() {
    let mut res = Response::new();
    res.set_header("X-Test", "ok\r\nSet-Cookie: evil=1")
        .set_header("Bad Name", "v");
    let wire = res.into_wire();
    assert!(wire.header("X-Test").is_none());
    assert!(wire.header("Set-Cookie").is_none());
    assert!(wire.header("Bad Name").is_none());
}
