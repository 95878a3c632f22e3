use std::{
    convert::Infallible,
    future::IntoFuture,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::Context;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request},
    Router,
};
use tokio::{net::TcpListener, runtime::Handle};
use tower::ServiceExt;
use tracing::{info, warn};

use roomnode_common::{
    ActuationController, ControlLoop, HttpResponse, HttpTransport, MotionInput, NetworkConfig,
    NetworkLink, OutputError, Outputs, RuntimeConfig, SensorReader, SettingsFetcher, SystemClock,
    TelemetryReporter, TemperatureProbe, ThreadScheduler, TransportError,
};

use crate::collector::{self, CollectorState, SETTINGS_PATH, TELEMETRY_PATH};

const MAX_RESPONSE_BODY: usize = 64 * 1024;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("ROOMNODE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.roomnode"));

    let stored = load_runtime_config(&data_dir.join("runtime.json"))
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load runtime config: {err:#}");
            None
        });
    let has_stored = stored.is_some();
    let mut runtime = stored.unwrap_or_default();

    let port = std::env::var("COLLECTOR_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    configure_endpoints(
        &mut runtime.network,
        has_stored,
        port,
        std::env::var("TELEMETRY_URL").ok(),
        std::env::var("SETTINGS_URL").ok(),
    );
    runtime.sanitize();

    let settings_path = data_dir.join("settings.json");
    let initial_settings = collector::load_settings(&settings_path)
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load user settings: {err:#}");
            None
        })
        .unwrap_or_default();

    let app = collector::router(CollectorState::new(
        initial_settings,
        Some(settings_path),
    ));

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind collector at {addr}"))?;
    info!("collector listening on http://{addr}");

    let transport = CollectorTransport {
        router: app.clone(),
        runtime: Handle::current(),
        timeout: runtime.network.http_timeout(),
    };
    thread::Builder::new()
        .name("control-loop".to_string())
        .spawn(move || -> anyhow::Result<()> {
            build_control_loop(&runtime, transport).run()
        })
        .context("failed to spawn control loop thread")?;

    let server = axum::serve(listener, app).into_future();
    tokio::select! {
        result = server => {
            result.context("collector server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<Option<RuntimeConfig>> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(serde_json::from_slice::<RuntimeConfig>(&raw)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Without a stored config the loop talks to the local collector; the
/// environment overrides either way.
fn configure_endpoints(
    network: &mut NetworkConfig,
    has_stored: bool,
    port: u16,
    telemetry_env: Option<String>,
    settings_env: Option<String>,
) {
    if !has_stored {
        network.override_endpoints(
            Some(&format!("http://127.0.0.1:{port}{TELEMETRY_PATH}")),
            Some(&format!("http://127.0.0.1:{port}{SETTINGS_PATH}")),
        );
    }
    network.override_endpoints(telemetry_env.as_deref(), settings_env.as_deref());
}

type HostLoop = ControlLoop<
    SimulatedProbe,
    SimulatedMotion,
    SystemClock,
    CollectorTransport,
    LoggedOutputs,
    SimulatedLink,
    ThreadScheduler,
>;

fn build_control_loop(runtime: &RuntimeConfig, transport: CollectorTransport) -> HostLoop {
    let reader = SensorReader::new(
        SimulatedProbe::default(),
        SimulatedMotion::default(),
        SystemClock::from_name(&runtime.timezone),
        runtime.control.settle_delay(),
    );

    ControlLoop::new(
        runtime.control.clone(),
        reader,
        TelemetryReporter::new(transport.clone(), runtime.network.telemetry_url.clone()),
        SettingsFetcher::new(transport, runtime.network.settings_url.clone()),
        ActuationController::new(runtime.actuation),
        LoggedOutputs::default(),
        SimulatedLink::default(),
        ThreadScheduler,
    )
}

/// Sends requests straight into the collector router; URLs only contribute
/// their path.
#[derive(Clone)]
struct CollectorTransport {
    router: Router,
    runtime: Handle,
    timeout: Duration,
}

impl CollectorTransport {
    fn dispatch(&self, request: Request<Body>) -> Result<HttpResponse, TransportError> {
        let router = self.router.clone();
        let timeout = self.timeout;

        self.runtime.block_on(async move {
            let response = tokio::time::timeout(timeout, router.oneshot(request))
                .await
                .map_err(|_| TransportError::Request("request timed out".to_string()))?
                .map_err(|err: Infallible| -> TransportError { match err {} })?;

            let status = i32::from(response.status().as_u16());
            let body = axum::body::to_bytes(response.into_body(), MAX_RESPONSE_BODY)
                .await
                .map_err(|err| TransportError::Request(err.to_string()))?;
            Ok::<_, TransportError>(HttpResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}

impl HttpTransport for CollectorTransport {
    fn post(
        &mut self,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_vec()))
            .map_err(|err| TransportError::Request(err.to_string()))?;
        self.dispatch(request)
    }

    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .body(Body::empty())
            .map_err(|err| TransportError::Request(err.to_string()))?;
        self.dispatch(request)
    }
}

// Hardware integration point: the esp32 build replaces these with the
// DS18B20, PIR and GPIO drivers.

#[derive(Default)]
struct SimulatedProbe {
    conversions: u64,
}

impl TemperatureProbe for SimulatedProbe {
    fn request_conversion(&mut self) {
        self.conversions = self.conversions.saturating_add(1);
    }

    fn read_celsius(&mut self) -> f32 {
        22.0 + (self.conversions % 8) as f32 * 0.75
    }
}

#[derive(Default)]
struct SimulatedMotion {
    samples: u64,
}

impl MotionInput for SimulatedMotion {
    fn is_motion(&mut self) -> bool {
        self.samples = self.samples.saturating_add(1);
        (self.samples / 3) % 2 == 1
    }
}

/// Pretends association takes a few polls so the connecting blink is visible.
#[derive(Default)]
struct SimulatedLink {
    polls: u32,
}

impl NetworkLink for SimulatedLink {
    fn is_connected(&mut self) -> bool {
        self.polls = self.polls.saturating_add(1);
        self.polls > 5
    }

    fn local_address(&mut self) -> Option<String> {
        Some("127.0.0.1".to_string())
    }
}

#[derive(Default)]
struct LoggedOutputs {
    fan: Option<bool>,
    light: Option<bool>,
    indicator: Option<bool>,
}

fn log_level_change(name: &str, slot: &mut Option<bool>, on: bool) {
    if *slot != Some(on) {
        info!("{name} -> {}", if on { "ON" } else { "OFF" });
        *slot = Some(on);
    }
}

impl Outputs for LoggedOutputs {
    fn set_fan(&mut self, on: bool) -> Result<(), OutputError> {
        log_level_change("fan", &mut self.fan, on);
        Ok(())
    }

    fn set_light(&mut self, on: bool) -> Result<(), OutputError> {
        log_level_change("light", &mut self.light, on);
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), OutputError> {
        log_level_change("indicator", &mut self.indicator, on);
        Ok(())
    }
}
