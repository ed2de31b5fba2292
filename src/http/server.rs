//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that hands every request to the kernel
//! - Wire up middleware (timeout, body limit, request ID, tracing)
//! - Stream the kernel's output back to the client
//! - Swap in a rebuilt kernel when the configuration changes
//!
//! # Design Decisions
//! - The kernel is synchronous; each dispatch runs on the blocking pool
//! - Output flows through a bounded channel, so a throttled response
//!   streams at its configured rate and a disconnect is visible to the
//!   kernel as a closed sink
//! - The kernel lives in an `ArcSwap`; in-flight requests keep the kernel
//!   they started with

use std::any::Any;
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::StickConfig;
use crate::dispatch::{Kernel, ResponseSink};
use crate::http::request::RequestContext;
use crate::lifecycle::startup::{build_kernel, StartupError};

/// Buffered body chunks between the kernel and the client.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// State injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<ArcSwap<Kernel>>,
    pub max_body_size: usize,
}

/// HTTP front end of the kernel.
pub struct HttpServer {
    router: Router,
    kernel: Arc<ArcSwap<Kernel>>,
    config: StickConfig,
}

impl HttpServer {
    /// Build the kernel from `config` and the router around it.
    pub fn new(config: StickConfig) -> Result<Self, StartupError> {
        let kernel = build_kernel(&config)?;
        Ok(Self::with_kernel(config, kernel))
    }

    /// Serve an already built kernel.
    pub fn with_kernel(config: StickConfig, kernel: Kernel) -> Self {
        let kernel = Arc::new(ArcSwap::from_pointee(kernel));
        let state = AppState {
            kernel: kernel.clone(),
            max_body_size: config.listener.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            kernel,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &StickConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Kernel currently serving requests.
    pub fn kernel(&self) -> Arc<Kernel> {
        self.kernel.load_full()
    }

    pub fn config(&self) -> &StickConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, rebuilding the kernel for
    /// every config received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<StickConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.kernel().routes().len(), "HTTP server starting");

        let kernel = self.kernel.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match build_kernel(&config) {
                    Ok(rebuilt) => {
                        tracing::info!(routes = rebuilt.routes().len(), "Kernel reloaded");
                        kernel.store(Arc::new(rebuilt));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Kernel rebuild failed, keeping current routes");
                    }
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Hands the request to the kernel and streams its output.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let kernel = state.kernel.load_full();
    let request = RequestContext::from_http(&parts, body, &kernel.settings().base);
    let request_id = request.request_id.clone();

    let (sink, head_rx, body_rx) = ChannelSink::new();
    tokio::task::spawn_blocking(move || {
        kernel.dispatch(request, Box::new(sink));
    });

    let head = match head_rx.await {
        Ok(head) => head,
        Err(_) => {
            tracing::error!(request_id = %request_id, "Kernel finished without a response head");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let stream = futures_util::stream::unfold(body_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::from_u16(head.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    *response.headers_mut() = head.headers;
    response
}

/// Status and headers produced by the kernel.
#[derive(Debug)]
pub struct ResponseHead {
    pub code: u16,
    pub headers: HeaderMap,
}

/// Sink forwarding kernel output to the async response body.
pub struct ChannelSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<ResponseHead>, mpsc::Receiver<Bytes>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            Self {
                head: Some(head_tx),
                body: body_tx,
            },
            head_rx,
            body_rx,
        )
    }

    fn send_head(&mut self, code: u16, headers: HeaderMap) -> io::Result<()> {
        let Some(tx) = self.head.take() else {
            return Ok(());
        };
        tx.send(ResponseHead { code, headers })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl ResponseSink for ChannelSink {
    fn write_head(&mut self, code: u16, _reason: &str, headers: &HeaderMap) -> io::Result<()> {
        self.send_head(code, headers.clone())
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.send_head(200, HeaderMap::new())?;
        self.body
            .blocking_send(Bytes::copy_from_slice(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }

    fn is_closed(&self) -> bool {
        self.body.is_closed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
