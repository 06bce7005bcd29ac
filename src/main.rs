//! Service Shell demo.
//!
//! ```text
//! GET /ping          → {"err_code":0,"err_msg":"ok","ret":"pong"}
//! GET /users/{id}    → user, or business failure 40000 for unknown ids
//! GET /boom          → generic failure, masked as 50000
//! GET /admin/stats   → requires `Authorization`, else 40001 (HTTP 401)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Path;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde::{Deserialize, Serialize};

use service_shell::config::{Env, StartupArgs};
use service_shell::http::middleware;
use service_shell::observability::logging;
use service_shell::{
    AppError, Application, ApplicationEventListener, BusinessFailure, Exchange, Listeners,
    MethodInterceptor, Responder,
};

const BANNER: &str = r"
  ___ ___ _ ___ __ (_)__ ___   ___ / /  ___ / / /
 (_-</ -_) '_/ |/ // / __/ -_) (_-</ _ \/ -_) / /
/___/\__/_/ |___//_/\__/\__/ /___/_//_/\__/_/_/
";

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: &'static str,
}

/// Demo-only section of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    greeting: Option<String>,
}

struct StartupLog;

impl ApplicationEventListener for StartupLog {
    fn pre_apply(&self) {
        tracing::info!("Registering demo resources");
    }

    fn pre_start(&self) {
        tracing::info!("Demo routes ready");
    }

    fn post_stop(&self) {
        tracing::info!("Demo stopped");
    }
}

/// Rejects `/admin` requests without credentials.
struct RequireAuth;

impl MethodInterceptor for RequireAuth {
    fn predicate(&self, exchange: &Exchange) -> bool {
        exchange.path().starts_with("/admin")
    }

    fn pre_handle(&self, exchange: &mut Exchange) {
        if !exchange.headers().contains_key(axum::http::header::AUTHORIZATION) {
            let response = exchange.responder().no_login(None);
            exchange.abort_with(response);
        }
    }
}

fn routes(users: Arc<HashMap<u64, User>>, greeting: String) -> Router {
    Router::new()
        .route("/ping", get(move |r: Responder| async move { r.json(greeting) }))
        .route(
            "/users/{id}",
            get(move |r: Responder, Path(id): Path<u64>| async move {
                let user = users
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| BusinessFailure::new(format!("user {id} not found")))?;
                Ok::<Response, AppError>(r.json(user))
            }),
        )
        .route("/boom", get(boom))
        .route("/admin/stats", get(|r: Responder| async move { r.json(serde_json::json!({"uptime": "ok"})) }))
}

async fn boom() -> Result<Response, AppError> {
    Err(std::io::Error::other("disk full").into())
}

#[tokio::main]
async fn main() {
    let args = StartupArgs::parse();
    let bootstrap = logging::subscriber(Env::Dev);

    let mut stack = vec![middleware::trace_ids()];
    stack.extend(middleware::defaults());

    let app = tracing::dispatcher::with_default(&bootstrap, || {
        Application::with_config_file(&args.config, Listeners::new().event(StartupLog), stack)
    });
    let app = match app {
        Ok(app) => app,
        Err(err) => {
            tracing::dispatcher::with_default(&bootstrap, || {
                tracing::error!(error = %err, "Failed to load configuration");
            });
            std::process::exit(1);
        }
    };

    let greeting = app
        .read_config_sub::<DemoConfig>("demo")
        .unwrap_or_default()
        .greeting
        .unwrap_or_else(|| "pong".to_string());

    let users: HashMap<u64, User> = [(1, User { id: 1, name: "ada" }), (2, User { id: 2, name: "grace" })]
        .into_iter()
        .collect();

    let dispatch = logging::subscriber(app.config().server.env);
    let app = app
        .banner_text(BANNER)
        .interceptor(RequireAuth)
        .routes(routes(Arc::new(users), greeting))
        .log(dispatch.clone());

    if let Err(err) = app.run().await {
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(error = %err, "Service terminated with error");
        });
        std::process::exit(1);
    }
}
