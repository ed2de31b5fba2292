//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use stick_kernel::cache::{ManualClock, ResponseCache};
use stick_kernel::config::{KernelConfig, StickConfig};
use stick_kernel::container::Hive;
use stick_kernel::dispatch::{BufferedSink, Exchange, Kernel};
use stick_kernel::http::HttpServer;
use stick_kernel::lifecycle::Shutdown;

/// Kernel with an in-memory cache driven by a manual clock.
pub fn kernel_at(clock: Arc<ManualClock>) -> Kernel {
    let settings = KernelConfig::default();
    let cache = ResponseCache::new(
        Arc::new(stick_kernel::cache::MemoryStore::new()),
        "test",
        clock,
    );
    Kernel::with_hive(Hive::new(settings), cache)
}

/// Body written to the buffered sink of a mocked exchange.
pub fn body(ex: &Exchange) -> String {
    ex.sink::<BufferedSink>()
        .map(BufferedSink::body_text)
        .unwrap_or_default()
}

/// A running server plus the handles to drive it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<StickConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve `kernel` on an ephemeral port.
pub async fn start_server(config: StickConfig, kernel: Kernel) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::with_kernel(config, kernel);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, updates_rx, rx).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    TestServer {
        addr,
        shutdown,
        config_updates,
    }
}

/// HTTP client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
