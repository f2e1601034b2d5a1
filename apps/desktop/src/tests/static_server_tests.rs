use super::*;
use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

struct Bundle {
    root: PathBuf,
}

impl Bundle {
    fn create() -> Self {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let root = env::temp_dir().join(format!("glide_static_test_{suffix}"));
        fs::create_dir_all(root.join("nested")).expect("nested");
        fs::create_dir_all(root.join("empty")).expect("empty");
        fs::write(root.join("dashboard.html"), "<h1>dashboard</h1>").expect("dashboard");
        fs::write(root.join("settings.html"), "<h1>settings</h1>").expect("settings");
        fs::write(root.join("app.js"), "console.log('hi')").expect("js");
        fs::write(root.join("page.rsc"), "0:[]").expect("rsc");
        fs::write(root.join("nested/index.html"), "<h1>nested</h1>").expect("index");
        fs::write(root.join("logo.png"), [0x89, b'P', b'N', b'G']).expect("logo");
        Self { root }
    }
}

impl Drop for Bundle {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

async fn spawn_site(bundle: &Bundle) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let site = Arc::new(StaticSite::new(
        bundle.root.clone(),
        Some(&bundle.root.join("logo.png")),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(site)).await;
    });
    format!("http://{addr}")
}

async fn get(base: &str, path: &str) -> (u16, String, String) {
    let response = reqwest::get(format!("{base}{path}")).await.expect("request");
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.text().await.expect("body");
    (status, content_type, body)
}

#[test]
fn join_within_refuses_to_escape_root() {
    let root = Path::new("/srv/out");
    assert_eq!(
        join_within(root, "a/../b.html"),
        Some(PathBuf::from("/srv/out/b.html"))
    );
    assert_eq!(join_within(root, "./x"), Some(PathBuf::from("/srv/out/x")));
    assert_eq!(join_within(root, "../etc/passwd"), None);
    assert_eq!(join_within(root, "a/../../etc"), None);
}

#[test]
fn rsc_payloads_get_component_type() {
    assert_eq!(content_type(Path::new("x/page.rsc")), "text/x-component");
    assert_eq!(content_type(Path::new("x/blob.unknownext")), "application/octet-stream");
}

#[tokio::test]
async fn entry_routes_serve_dashboard_with_cors() {
    let bundle = Bundle::create();
    let base = spawn_site(&bundle).await;
    for path in ["/", "/dashboard"] {
        let response = reqwest::get(format!("{base}{path}")).await.expect("request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert_eq!(response.text().await.expect("body"), "<h1>dashboard</h1>");
    }
}

#[tokio::test]
async fn resolution_order() {
    let bundle = Bundle::create();
    let base = spawn_site(&bundle).await;

    let (status, content_type, body) = get(&base, "/app.js").await;
    assert_eq!(status, 200);
    assert!(content_type.contains("javascript"), "{content_type}");
    assert_eq!(body, "console.log('hi')");

    let (_, content_type, body) = get(&base, "/settings").await;
    assert_eq!(body, "<h1>settings</h1>");
    assert_eq!(content_type, "text/html");

    let (_, content_type, _) = get(&base, "/page.rsc").await;
    assert_eq!(content_type, "text/x-component");

    let (_, _, body) = get(&base, "/nested").await;
    assert_eq!(body, "<h1>nested</h1>");

    let (status, _, body) = get(&base, "/gestures/library").await;
    assert_eq!(status, 200);
    assert_eq!(body, "<h1>dashboard</h1>");
}

#[tokio::test]
async fn traversal_is_forbidden_and_bare_directory_is_not_found() {
    let bundle = Bundle::create();
    let base = spawn_site(&bundle).await;

    let (status, _, _) = get(&base, "/..%2f..%2fetc%2fpasswd").await;
    assert_eq!(status, 403);

    let (status, _, _) = get(&base, "/empty").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn loading_page_embeds_logo() {
    let bundle = Bundle::create();
    let base = spawn_site(&bundle).await;
    let (status, content_type, body) = get(&base, "/__loading").await;
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/html"));
    assert!(body.contains("Starting engine..."));
    assert!(body.contains("data:image/png;base64,iVBORw=="));
}

#[test]
fn loading_page_without_logo_uses_fallback() {
    let page = loading_page(None);
    assert!(page.contains("icon-fallback"));
    assert!(!page.contains("data:image"));
}

#[tokio::test]
async fn bind_falls_back_to_next_port_then_gives_up() {
    let first = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = first.local_addr().expect("addr").port();
    if port == u16::MAX {
        return;
    }

    let (second, addr) = bind(port).await.expect("fallback");
    assert_eq!(addr.port(), port + 1);

    let err = bind(port).await.expect_err("both taken");
    assert!(err.to_string().contains("another instance"));
    drop((first, second));
}
