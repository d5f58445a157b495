//! The HTTP endpoint: prometheus metrics and SLA reports.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    conf::HttpServerSettings, logging::LogFile, metric, report, ProbeResult, Prober, Status,
    DEFAULT_HTTP_SERVER_IP, DEFAULT_HTTP_SERVER_PORT, DEFAULT_PROBE_INTERVAL, DEFAULT_TIMEOUT,
};

/// What the handlers read; every prober is included, the Bad ones too.
#[derive(Clone)]
pub struct AppState {
    pub probers: Arc<Vec<Arc<dyn Prober>>>,
    pub timeformat: String,
    pub refresh: Duration,
}

impl AppState {
    fn snapshots(&self, status: Option<Status>) -> Vec<ProbeResult> {
        self.probers
            .iter()
            .map(|p| p.result().snapshot())
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect()
    }
}

/// Resolves the listen address, falling back to the defaults for values
/// that are invalid or privileged.
pub fn listen_addr(settings: &HttpServerSettings) -> SocketAddr {
    let ip = match settings.ip.trim() {
        "" => DEFAULT_HTTP_SERVER_IP.parse().ok(),
        ip => ip.parse::<IpAddr>().ok(),
    };
    let ip = ip.unwrap_or_else(|| {
        log::warn!(
            "[Web] Invalid IP address: {}, use the default value: {}",
            settings.ip,
            DEFAULT_HTTP_SERVER_IP
        );
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    });

    let default_port = DEFAULT_HTTP_SERVER_PORT.parse().unwrap_or(8181);
    let port = match settings.port.trim().parse::<u16>() {
        Ok(0) => 0,
        Ok(p) if p > 1024 => p,
        _ => {
            log::warn!(
                "[Web] Invalid port number: {}, use the default value: {}",
                settings.port,
                DEFAULT_HTTP_SERVER_PORT
            );
            default_port
        }
    };
    SocketAddr::new(ip, port)
}

#[derive(Debug, Default, Deserialize)]
struct SlaQuery {
    status: Option<String>,
    refresh: Option<String>,
}

impl SlaQuery {
    fn status(&self) -> Option<Status> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().unwrap_or(Status::Unknown))
    }
}

async fn metrics_handler() -> Response {
    match metric::encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            log::error!("[Web] Failed to encode the metrics: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn sla_json(State(state): State<AppState>, Query(q): Query<SlaQuery>) -> Json<Vec<ProbeResult>> {
    Json(state.snapshots(q.status()))
}

async fn sla_page(State(state): State<AppState>, Query(q): Query<SlaQuery>) -> Response {
    let refresh = match q.refresh.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => humantime::parse_duration(r).unwrap_or_else(|err| {
            log::error!("[Web] Invalid refresh time: {}", err);
            state.refresh
        }),
        _ => state.refresh,
    };

    let body = report::sla_text(&state.snapshots(q.status()), &state.timeformat);
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::REFRESH, refresh.as_secs().max(1).to_string()),
        ],
        body,
    )
        .into_response()
}

async fn access_log(
    State(file): State<LogFile>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    let line = format!(
        "{} {} {} {} {} {}ms",
        chrono::Utc::now().to_rfc3339(),
        remote,
        method,
        uri,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    if let Err(err) = file.write_line(&line) {
        log::warn!("[Web] Failed to write the access log - {}", err);
    }
    response
}

pub fn router(state: AppState, access: LogFile) -> Router {
    Router::new()
        .route("/", get(sla_page))
        .route("/api/v1/sla", get(sla_json))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn_with_state(access, access_log))
}

/// A running HTTP server.
#[derive(Debug)]
pub struct WebServer {
    local_addr: SocketAddr,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl WebServer {
    /// Binds the listener and starts serving; a bind failure is an error.
    pub async fn start(
        settings: &HttpServerSettings,
        probers: Vec<Arc<dyn Prober>>,
        timeformat: &str,
        access: LogFile,
    ) -> Result<Self> {
        let addr = listen_addr(settings);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("[Web] Failed to start the http server on {}", addr))?;
        let local_addr = listener.local_addr()?;
        log::info!("[Web] HTTP server is listening on {}", local_addr);

        let refresh = if settings.refresh.is_zero() {
            DEFAULT_PROBE_INTERVAL
        } else {
            settings.refresh
        };
        let state = AppState {
            probers: Arc::new(probers),
            timeformat: timeformat.to_string(),
            refresh,
        };
        let app = router(state, access);

        let token = CancellationToken::new();
        let done = token.clone();
        let handle = tokio::spawn(async move {
            let res = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { done.cancelled().await })
            .await;
            if let Err(err) = res {
                log::error!("[Web] HTTP server error: {}", err);
            }
            log::info!("[Web] HTTP server is stopped.");
        });

        Ok(Self {
            local_addr,
            token,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the in-flight requests,
    /// at most the default timeout.
    pub async fn shutdown(self) {
        self.token.cancel();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(DEFAULT_TIMEOUT, self.handle).await {
            Ok(_) => log::info!("[Web] HTTP server is shutdown"),
            Err(_) => {
                log::error!(
                    "[Web] HTTP server did not stop within {:?}, aborting",
                    DEFAULT_TIMEOUT
                );
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::config_probers;
    use crate::probe::testing::{new_dummy_prober, DummyBehavior};
    use crate::probe::ResultStore;
    use crate::ProbeSettings;

    fn settings(ip: &str, port: &str) -> HttpServerSettings {
        HttpServerSettings {
            ip: ip.to_string(),
            port: port.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_listen_addr() {
        assert_eq!(
            listen_addr(&settings("127.0.0.1", "9090")),
            "127.0.0.1:9090".parse().unwrap()
        );
        assert_eq!(
            listen_addr(&settings("not-an-ip", "9090")),
            "0.0.0.0:9090".parse().unwrap()
        );
        assert_eq!(listen_addr(&settings("", "80")).port(), 8181);
        assert_eq!(listen_addr(&settings("", "1024")).port(), 8181);
        assert_eq!(listen_addr(&settings("", "99999")).port(), 8181);
        assert_eq!(listen_addr(&settings("", "http")).port(), 8181);
        assert_eq!(listen_addr(&settings("::1", "0")), "[::1]:0".parse().unwrap());
    }

    async fn probers() -> Vec<Arc<dyn Prober>> {
        let mut up = new_dummy_prober("up", DummyBehavior::default());
        up.config(&ProbeSettings::default()).unwrap();
        up.probe().await;

        let bad = new_dummy_prober(
            "bad",
            DummyBehavior {
                bad_config: true,
                ..Default::default()
            },
        );
        let (all, valid) =
            config_probers(vec![Box::new(bad)], &ProbeSettings::default(), &ResultStore::new());
        assert!(valid.is_empty());

        let mut probers: Vec<Arc<dyn Prober>> = vec![Arc::new(up)];
        probers.extend(all);
        probers
    }

    #[tokio::test]
    async fn test_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let access = LogFile::new();
        let access_path = dir.path().join("access.log");
        access.open(access_path.to_str().unwrap()).unwrap();

        let server = WebServer::start(
            &settings("127.0.0.1", "0"),
            probers().await,
            "%Y-%m-%d",
            access.clone(),
        )
        .await
        .unwrap();
        let base = format!("http://{}", server.local_addr());

        let get_json = |url: String| async move {
            let body = reqwest::get(url).await.unwrap().text().await.unwrap();
            serde_json::from_str::<Vec<ProbeResult>>(&body).unwrap()
        };

        let all = get_json(format!("{}/api/v1/sla", base)).await;
        assert_eq!(all.len(), 2);

        let bad = get_json(format!("{}/api/v1/sla?status=bad", base)).await;
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].name, "bad");
        assert_eq!(bad[0].endpoint, "dummy://endpoint");
        assert_eq!(bad[0].message, "Bad Configuration: malformed address");

        let page = reqwest::get(format!("{}/?refresh=5s", base)).await.unwrap();
        assert_eq!(page.headers()[header::REFRESH], "5");
        let text = page.text().await.unwrap();
        assert!(text.starts_with("[Overall SLA Report]"));
        assert!(text.contains("up - dummy://endpoint"));

        let metrics = reqwest::get(format!("{}/metrics", base)).await.unwrap();
        assert!(metrics.status().is_success());
        assert!(metrics.text().await.unwrap().contains("easeprobe_dummy_status"));

        server.shutdown().await;
        assert!(reqwest::get(format!("{}/", base)).await.is_err());

        let log = std::fs::read_to_string(&access_path).unwrap();
        assert!(log.contains("GET /api/v1/sla?status=bad 200"));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port().to_string();
        let res = WebServer::start(&settings("127.0.0.1", &port), vec![], "", LogFile::new()).await;
        assert!(res.is_err());
    }
}
