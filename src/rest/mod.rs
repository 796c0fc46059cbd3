// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local only by default. Every task route requires a
// verified bearer credential; health is open.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/tasks
//   POST   /api/v1/tasks
//   GET    /api/v1/tasks/{id}
//   PATCH  /api/v1/tasks/{id}
//   DELETE /api/v1/tasks/{id}
//   PUT    /api/v1/tasks/reorder
//   GET    /api/v1/tasks/category/{category}
//   GET    /api/v1/tasks/due/{date}

pub mod auth;
pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let task_routes = Router::new()
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/api/v1/tasks/reorder", put(routes::tasks::reorder_tasks))
        .route(
            "/api/v1/tasks/{id}",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/api/v1/tasks/category/{category}",
            get(routes::tasks::tasks_by_category),
        )
        .route(
            "/api/v1/tasks/due/{date}",
            get(routes::tasks::tasks_by_due_date),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_bearer,
        ));

    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        .merge(task_routes)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn shutdown_signal() {
    // Ctrl-C or SIGTERM, whichever arrives first.
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
