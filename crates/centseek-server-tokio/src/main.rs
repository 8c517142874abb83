use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use centseek_core::{
    config::Config,
    error::{CentseekError, ErrorKind, ErrorReport},
    importance::DEFAULT_TOP_N,
    model,
    pipeline::AppCore,
    schema::{Evaluation, FeatureImportance, RawCustomerInput, SentimentResult},
};
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON settings file; without it settings come from `.env` and `CENTSEEK_*`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the model artifact path from settings
    #[arg(long)]
    model: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080; overrides `bind_addr` from settings
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[derive(Clone)]
struct AppState {
    core: Arc<AppCore>,
    prom: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
struct ImportanceQuery {
    n: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    model_loaded: bool,
    sentiment_primary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // metrics
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .context("install prometheus recorder")?;

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(p) => Config::from_file(p)?,
        None => Config::from_env(),
    };
    if let Some(m) = args.model {
        cfg.model_path = m;
    }
    let addr: SocketAddr = match args.bind {
        Some(a) => a,
        None => cfg
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address `{}`", cfg.bind_addr))?,
    };

    // Warm the model; a missing artifact only disables risk scoring.
    match model::load(&cfg.model_path) {
        Ok(h) => tracing::info!(
            path = %cfg.model_path.display(),
            trees = h.num_trees(),
            version = ?h.version,
            "model ready"
        ),
        Err(e) => tracing::error!(error = %e, "model unavailable; risk scoring disabled"),
    }

    let core = Arc::new(AppCore::new(cfg));
    let state = AppState { core, prom };

    let app = Router::new()
        .route("/evaluate", post(evaluate))
        .route("/sentiment", get(sentiment))
        .route("/importance", get(importance))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("centseek-server-tokio listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn evaluate_status(ev: &Evaluation) -> StatusCode {
    match ev.risk_error.as_ref().map(|e| e.kind) {
        Some(ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::ModelLoad) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

/// A body serde cannot read is a validation failure like any other. Data
/// errors carry the offending path (`delays`, `delays[0]`) ahead of the reason.
fn rejection_report(rej: &JsonRejection) -> ErrorReport {
    let text = rej.body_text();
    let detail = text.split_once(": ").map_or(text.as_str(), |(_, d)| d);
    let (field, reason) = match rej {
        JsonRejection::JsonDataError(_) => match detail.split_once(": ") {
            Some((path, reason)) if !path.is_empty() && !path.contains(' ') => (path, reason),
            _ => ("body", detail),
        },
        _ => ("body", detail),
    };
    CentseekError::validation(field, reason).report()
}

async fn evaluate(
    State(st): State<AppState>,
    body: Result<Json<RawCustomerInput>, JsonRejection>,
) -> Response {
    let raw = match body {
        Ok(Json(raw)) => raw,
        Err(rej) => {
            metrics::counter!("evaluate_validation_failed_total").increment(1);
            let report = rejection_report(&rej);
            tracing::info!(field = ?report.field, "rejected unreadable evaluate body");
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(report)).into_response();
        }
    };
    let ev = st.core.evaluate(&raw).await;
    (evaluate_status(&ev), Json(ev)).into_response()
}

async fn sentiment(State(st): State<AppState>) -> Json<SentimentResult> {
    Json(st.core.sentiment().await)
}

async fn importance(
    State(st): State<AppState>,
    Query(q): Query<ImportanceQuery>,
) -> Result<Json<FeatureImportance>, (StatusCode, String)> {
    let n = q.n.unwrap_or(DEFAULT_TOP_N);
    st.core
        .top_features(n)
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.user_message()))
}

async fn healthz(State(st): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        model_loaded: model::loaded().is_some(),
        sentiment_primary: st.core.sentiment_primary(),
    })
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}
