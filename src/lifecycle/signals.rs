//! OS signal handling.
//!
//! SIGINT and SIGTERM both request a graceful shutdown; nothing else is
//! handled.

/// Resolves on the first SIGINT or SIGTERM.
///
/// If a handler cannot be installed that signal is ignored; the other one
/// still works.
pub async fn terminate() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!(signal = "SIGINT", "Termination signal received"),
        _ = term => tracing::info!(signal = "SIGTERM", "Termination signal received"),
    }
}
