//! Serves the exported dashboard bundle to the local browser.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const ENTRY_PAGE: &str = "dashboard.html";

pub struct StaticSite {
    root: PathBuf,
    loading_page: String,
}

impl StaticSite {
    pub fn new(root: PathBuf, logo: Option<&Path>) -> Self {
        let logo = logo.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => Some(logo_data_uri(path, &bytes)),
            Err(err) => {
                warn!(path = %path.display(), %err, "launcher: could not load logo");
                None
            }
        });
        Self {
            root,
            loading_page: loading_page(logo.as_deref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn router(site: Arc<StaticSite>) -> Router {
    Router::new()
        .route("/", get(serve_entry))
        .route("/__loading", get(serve_loading))
        .route("/*path", get(serve_path))
        .with_state(site)
}

/// Binds `port`, or `port + 1` when it is taken. Holding the socket doubles
/// as the single-instance lock.
pub async fn bind(port: u16) -> anyhow::Result<(TcpListener, SocketAddr)> {
    let mut last_err = None;
    for candidate in [port, port.saturating_add(1)] {
        match TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, candidate))).await {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                if candidate != port {
                    info!(port, fallback = candidate, "launcher: frontend port in use, using fallback");
                }
                return Ok((listener, addr));
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                debug!(port = candidate, "launcher: port in use");
                last_err = Some(err);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to bind frontend port {candidate}"))
            }
        }
    }
    match last_err {
        Some(err) => Err(err).context("another instance appears to be running: frontend ports are taken"),
        None => bail!("no frontend port to bind"),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Forbidden,
}

/// Maps `root` + `relative` without letting `..` climb above `root`.
fn join_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                joined.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(joined)
}

/// `/` and `/dashboard` are the entry page; otherwise the file itself, then
/// `<path>.html`, then a directory's `index.html`, then the entry page.
async fn resolve(root: &Path, request_path: &str) -> Resolved {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative == "dashboard" {
        ENTRY_PAGE
    } else {
        relative
    };

    let Some(candidate) = join_within(root, relative) else {
        return Resolved::Forbidden;
    };

    let metadata = tokio::fs::metadata(&candidate).await.ok();
    if metadata.as_ref().is_some_and(|m| !m.is_dir()) {
        return Resolved::File(candidate);
    }

    let mut with_html = candidate.clone().into_os_string();
    with_html.push(".html");
    let with_html = PathBuf::from(with_html);
    if tokio::fs::try_exists(&with_html).await.unwrap_or(false) {
        return Resolved::File(with_html);
    }

    if metadata.is_some_and(|m| m.is_dir()) {
        let index = candidate.join("index.html");
        if tokio::fs::try_exists(&index).await.unwrap_or(false) {
            return Resolved::File(index);
        }
        return Resolved::File(candidate);
    }

    Resolved::File(root.join(ENTRY_PAGE))
}

fn content_type(path: &Path) -> HeaderValue {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    if ext.as_deref() == Some("rsc") {
        return HeaderValue::from_static("text/x-component");
    }
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

async fn serve(site: &StaticSite, request_path: &str) -> Response {
    let path = match resolve(&site.root, request_path).await {
        Resolved::Forbidden => {
            warn!(%request_path, "launcher: rejected path outside static root");
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
        Resolved::File(path) => path,
    };

    match tokio::fs::read(&path).await {
        Ok(body) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, content_type(&path));
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
            (StatusCode::OK, headers, body).into_response()
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "launcher: static file unreadable");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

async fn serve_entry(State(site): State<Arc<StaticSite>>) -> Response {
    serve(&site, "/").await
}

async fn serve_path(State(site): State<Arc<StaticSite>>, UrlPath(path): UrlPath<String>) -> Response {
    serve(&site, &path).await
}

async fn serve_loading(State(site): State<Arc<StaticSite>>) -> Html<String> {
    Html(site.loading_page.clone())
}

fn logo_data_uri(path: &Path, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(path).first_or(mime_guess::mime::IMAGE_JPEG);
    format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes))
}

fn loading_page(logo: Option<&str>) -> String {
    let icon = match logo {
        Some(src) => format!(r#"<img src="{src}" class="icon" alt="Glide" />"#),
        None => r#"<div class="icon icon-fallback"></div>"#.to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <title>Glide</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{
      background: #0a0a0f;
      color: white;
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
      display: flex;
      align-items: center;
      justify-content: center;
      height: 100vh;
    }}
    .container {{ text-align: center; }}
    .icon {{ width: 64px; height: 64px; margin: 0 auto 16px; border-radius: 16px; object-fit: cover; }}
    .icon-fallback {{ background: linear-gradient(135deg, #301088, #7c3aed); }}
    .logo {{ font-size: 28px; font-weight: 700; margin-bottom: 6px; color: #e2e0ff; }}
    .subtitle {{ color: rgba(255,255,255,0.4); font-size: 13px; margin-bottom: 32px; }}
    .progress-bar {{ width: 180px; height: 3px; background: rgba(124,58,237,0.15); border-radius: 4px; overflow: hidden; margin: 0 auto; }}
    .progress-fill {{ height: 100%; width: 30%; background: linear-gradient(90deg, #7c3aed, #a78bfa); animation: loading 1.5s ease-in-out infinite; }}
    @keyframes loading {{ 0% {{ transform: translateX(-100%); }} 100% {{ transform: translateX(400%); }} }}
    .status {{ color: rgba(255,255,255,0.35); font-size: 11px; margin-top: 14px; }}
  </style>
</head>
<body>
  <div class="container">
    {icon}
    <div class="logo">Glide</div>
    <div class="subtitle">Gesture Control</div>
    <div class="progress-bar"><div class="progress-fill"></div></div>
    <div class="status">Starting engine...</div>
  </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
#[path = "tests/static_server_tests.rs"]
mod tests;
