use std::{path::Path, process::Stdio, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::{DesktopConfig, LauncherSettings},
    static_server::{self, StaticSite},
};

/// Backend process we started and are responsible for stopping.
pub struct Backend {
    child: Child,
}

impl Backend {
    pub fn spawn(bin: &Path, args: &[String]) -> Result<Self> {
        let mut command = Command::new(bin);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = bin.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start backend {}", bin.display()))?;
        info!(bin = %bin.display(), pid = ?child.id(), "launcher: backend started");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, true));
        }
        Ok(Self { child })
    }

    /// Asks the backend to exit, then kills it if it is still running after
    /// `grace`.
    pub async fn stop(mut self, grace: Duration) {
        if let Ok(Some(status)) = self.child.try_wait() {
            info!(%status, "launcher: backend already exited");
            return;
        }
        if let Some(pid) = self.child.id() {
            if let Err(err) = terminate(pid) {
                warn!(pid, %err, "launcher: failed to signal backend");
            }
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "launcher: backend stopped"),
            Ok(Err(err)) => warn!(%err, "launcher: failed to wait for backend"),
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "launcher: backend ignored terminate; killing");
                if let Err(err) = self.child.kill().await {
                    error!(%err, "launcher: failed to kill backend");
                }
            }
        }
    }

    async fn exited(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }
}

async fn forward_output(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: "engine", "{line}"),
            Ok(Some(line)) => info!(target: "engine", "{line}"),
            Ok(None) => break,
            Err(err) => {
                debug!(%err, "launcher: backend output closed");
                break;
            }
        }
    }
}

#[cfg(unix)]
extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}

#[cfg(unix)]
const SIGTERM: i32 = 15;

#[cfg(unix)]
fn terminate(pid: u32) -> std::io::Result<()> {
    let pid = i32::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: plain syscall on a pid we spawned; no memory is shared.
    let rc = unsafe { kill(pid, SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "graceful terminate is unix-only",
    ))
}

/// Polls `GET <base>/` until it answers 200. Returns the attempt that
/// succeeded.
pub async fn wait_for_backend(
    base: &Url,
    retries: u32,
    interval: Duration,
    request_timeout: Duration,
) -> Result<u32> {
    let http = reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .context("failed to build readiness client")?;
    let retries = retries.max(1);

    for attempt in 1..=retries {
        match http.get(base.clone()).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                return Ok(attempt);
            }
            Ok(response) => {
                debug!(attempt, status = %response.status(), "launcher: backend not ready");
            }
            Err(err) => debug!(attempt, %err, "launcher: backend not reachable"),
        }
        if attempt < retries {
            tokio::time::sleep(interval).await;
        }
    }
    Err(anyhow!("backend at {base} did not become ready after {retries} attempts"))
}

pub fn open_in_browser(opener: &str, url: &str) -> Result<()> {
    let mut parts = opener.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("opener command is empty"))?;
    std::process::Command::new(program)
        .args(parts)
        .arg(url)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run opener `{opener}`"))?;
    Ok(())
}

fn default_opener() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("open")
    } else if cfg!(target_os = "linux") {
        Some("xdg-open")
    } else if cfg!(target_os = "windows") {
        Some("explorer")
    } else {
        None
    }
}

/// The configured opener, else the platform's.
fn resolve_opener(configured: Option<&str>) -> Option<&str> {
    configured.or(default_opener())
}

/// Serves the dashboard, starts the backend and waits for it, then runs
/// until Ctrl-C or until the backend exits.
pub async fn run(config: DesktopConfig, open: bool) -> Result<()> {
    let LauncherSettings {
        backend_bin,
        backend_args,
        frontend_port,
        static_dir,
        logo_path,
        ready_retries,
        opener,
        ..
    } = config.launcher.clone();

    let (listener, addr) = static_server::bind(frontend_port).await?;
    let site = Arc::new(StaticSite::new(static_dir, logo_path.as_deref()));
    if !site.root().is_dir() {
        warn!(dir = %site.root().display(), "launcher: static directory missing");
    }
    let (stop_server, server_stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let app = static_server::router(site);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = server_stopped.await;
            })
            .await
    });
    info!(%addr, "launcher: frontend server running");

    let mut backend = match &backend_bin {
        Some(bin) => Some(Backend::spawn(bin, &backend_args)?),
        None => {
            info!("launcher: no backend binary configured; expecting an external backend");
            None
        }
    };

    let api = config.client.api_base()?;
    match wait_for_backend(
        &api,
        ready_retries,
        config.launcher.ready_interval(),
        config.launcher.ready_timeout(),
    )
    .await
    {
        Ok(attempt) => info!(attempt, %api, "launcher: backend is ready"),
        Err(err) => {
            error!(%err, "launcher: backend failed to start");
            if let Some(backend) = backend.take() {
                backend.stop(config.launcher.stop_grace()).await;
                let _ = stop_server.send(());
                return Err(err.context("could not connect to the engine"));
            }
        }
    }

    let dashboard_url = format!("http://localhost:{}/dashboard", addr.port());
    info!(url = %dashboard_url, "launcher: dashboard available");
    if open {
        match resolve_opener(opener.as_deref()) {
            Some(command) => {
                if let Err(err) = open_in_browser(command, &dashboard_url) {
                    warn!(%err, "launcher: could not open dashboard");
                }
            }
            None => warn!("launcher: no opener configured for this platform"),
        }
    }

    match backend.as_mut() {
        Some(running) => {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for ctrl-c")?;
                    info!("launcher: shutting down");
                }
                status = running.exited() => {
                    warn!(?status, "launcher: backend exited");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("launcher: shutting down");
        }
    }

    if let Some(backend) = backend {
        backend.stop(config.launcher.stop_grace()).await;
    }
    let _ = stop_server.send(());
    match server.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err).context("frontend server failed"),
        Err(err) => Err(err).context("frontend server task panicked"),
    }
}

#[cfg(test)]
#[path = "tests/launcher_tests.rs"]
mod tests;
