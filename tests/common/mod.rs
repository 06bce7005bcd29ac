//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

use service_shell::config::{ConfigError, ConfigSource, Env};
use service_shell::http::Middleware;
use service_shell::lifecycle::{Application, LifecycleError, ServerHandle, ServerState};
use service_shell::observability::subscriber_with_writer;
use service_shell::Listeners;

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self) -> Dispatch {
        subscriber_with_writer(Env::Test, self.clone())
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'w> MakeWriter<'w> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'w self) -> Self::Writer {
        self.clone()
    }
}

/// Config listener binding an ephemeral port, plus extra YAML.
pub fn config_with(yaml: &'static str) -> impl Fn(&mut ConfigSource) -> Result<(), ConfigError> + Send + Sync {
    move |source: &mut ConfigSource| -> Result<(), ConfigError> {
        source.add_yaml(yaml);
        source.set("server.port", 0_i64)?;
        Ok(())
    }
}

pub fn listeners() -> Listeners {
    Listeners::new().config(config_with("server:\n  env: test\n"))
}

pub fn app(listeners: Listeners, middlewares: Vec<Middleware>) -> Application {
    Application::with_config_file("unused.yml", listeners, middlewares).unwrap()
}

/// A running application.
pub struct Running {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub task: JoinHandle<Result<(), LifecycleError>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), LifecycleError> {
        self.handle.shutdown();
        self.task.await.unwrap()
    }
}

/// Run `app` in the background until it is serving.
pub async fn start(app: Application) -> Running {
    start_until(app, std::future::pending()).await
}

pub async fn start_until<F>(app: Application, signal: F) -> Running
where
    F: Future<Output = ()> + Send + 'static,
{
    let resources = app.resources().clone();
    let mut state = app.subscribe_state();
    let task = tokio::spawn(app.run_until(signal));
    state
        .wait_for(|s| *s >= ServerState::Serving)
        .await
        .expect("application stopped before serving");

    let handle = resources.get::<ServerHandle>().expect("server handle published");
    let addr = SocketAddr::from(([127, 0, 0, 1], handle.local_addr().port()));
    Running {
        addr,
        handle: (*handle).clone(),
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
