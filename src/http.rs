mod authors;
mod books;
mod handler;
mod health;

use crate::repositories::{AuthorRepository, BookRepository, HealthCheck};
use anyhow::Context;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Debug)]
pub struct AppState<R> {
    repo: Arc<R>,
    started_at: Instant,
    version: &'static str,
}

impl<R> AppState<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo: Arc::new(repo),
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            started_at: self.started_at,
            version: self.version,
        }
    }
}

#[derive(Debug)]
pub struct HttpServerConfig {
    port: u16,
}

impl HttpServerConfig {
    pub const fn new(port: u16) -> Self {
        Self { port }
    }
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<R>(state: AppState<R>, config: HttpServerConfig) -> anyhow::Result<Self>
    where
        R: AuthorRepository + BookRepository + HealthCheck,
    {
        let router = router(state);

        let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
            .await
            .with_context(|| format!("Failed to bind to port {}", config.port))?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self
            .listener
            .local_addr()
            .context("Failed to read listener address")?;
        tracing::info!(%addr, "listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Received error from running server")?;
        Ok(())
    }
}

/// Builds the complete application router for the given state.
pub fn router<R>(state: AppState<R>) -> Router
where
    R: AuthorRepository + BookRepository + HealthCheck,
{
    Router::new()
        .route("/health", get(health::health::<R>))
        .route("/ready", get(health::ready::<R>))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes<R>() -> Router<AppState<R>>
where
    R: AuthorRepository + BookRepository + HealthCheck,
{
    Router::new()
        .route(
            "/books",
            get(books::list_books::<R>).post(books::create_book::<R>),
        )
        .route(
            "/books/{id}",
            get(books::get_book::<R>)
                .patch(books::update_book::<R>)
                .delete(books::delete_book::<R>),
        )
        .route(
            "/authors",
            get(authors::list_authors::<R>).post(authors::create_author::<R>),
        )
        .route(
            "/authors/{id}",
            get(authors::get_author::<R>)
                .patch(authors::update_author::<R>)
                .delete(authors::delete_author::<R>),
        )
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
