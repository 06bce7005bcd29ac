//! Structured logging.
//!
//! # Design Decisions
//! - A subscriber is a value (`tracing::Dispatch`) handed to the application,
//!   never installed globally by the library
//! - JSON for `prod`, human-readable for `dev`/`test`
//! - `RUST_LOG` overrides the env-derived level

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Env;

/// Noisy transport crates are capped at info.
const QUIET_TARGETS: &str = "hyper=info,h2=info,tower=info";

/// Default level for an environment.
pub fn default_level(env: Env) -> &'static str {
    match env {
        Env::Prod => "info",
        Env::Dev | Env::Test => "debug",
    }
}

/// Subscriber writing to stdout.
pub fn subscriber(env: Env) -> Dispatch {
    build(env, std::io::stdout, true)
}

/// Subscriber writing to `writer`, without ANSI colors.
pub fn subscriber_with_writer<W>(env: Env, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build(env, writer, false)
}

fn build<W>(env: Env, writer: W, ansi: bool) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{QUIET_TARGETS}", default_level(env))));

    let fmt_layer = match env {
        Env::Prod => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        Env::Dev | Env::Test => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    Dispatch::new(tracing_subscriber::registry().with(filter).with(fmt_layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'w> MakeWriter<'w> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'w self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn prod_logs_json() {
        let buffer = Buffer::default();
        let dispatch = subscriber_with_writer(Env::Prod, buffer.clone());
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(port = 4006, "Server started");
        });

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"]["message"], "Server started");
        assert_eq!(line["fields"]["port"], 4006);
    }

    #[test]
    fn levels_follow_env() {
        assert_eq!(default_level(Env::Prod), "info");
        assert_eq!(default_level(Env::Dev), "debug");
        assert_eq!(default_level(Env::Test), "debug");
    }
}
