//! OME Book - market view daemon
//!
//! Follows one OME market: polls its order book, tracks the connected
//! account's orders and fills, publishes store snapshots over IPC and serves
//! state, margin and health over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ome_book::margin::{
    check_transfer, to_approx_currency, to_precision, Balances, MarginSnapshot, TracerMargin,
    TransferKind,
};
use ome_book::metrics::StoreMetrics;
use ome_book::{
    Config, GraphFilledOrders, HttpOmeClient, MatchedOrdersListener, OmeAction, OmeState,
    OmeStore, Publisher,
};

/// Application state shared across handlers
struct AppState {
    store: OmeStore,
    registry: Registry,
    margin: TracerMargin,
    config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting OME book daemon");

    let config = Arc::new(Config::load()?);
    info!(market = ?config.market_address, account = ?config.account, "Configuration loaded");

    let registry = Registry::new();
    let metrics = StoreMetrics::register(&registry)?;

    let client = HttpOmeClient::new(&config.ome_endpoint, config.request_timeout())?;
    let filled_source = GraphFilledOrders::new(&config.graph_endpoint, config.request_timeout())?;
    let store = OmeStore::new(
        Arc::new(client),
        Arc::new(filled_source),
        config.poll_interval(),
        Some(metrics),
    );

    let publisher = Publisher::new(&config.ipc_socket_path).await?;
    tokio::spawn(forward_snapshots(store.clone(), publisher));

    store.set_account(config.account.clone()).await;
    store.select_market(config.market_address.clone()).await;

    if let Some(market) = config.market_address.clone() {
        let mut listener = MatchedOrdersListener::new(
            store.clone(),
            &config.events_endpoint,
            &market,
            config.reconnect_delay_ms,
        );
        let handle = tokio::spawn(async move { listener.run().await });
        store.attach_subscription(handle).await;
    } else {
        warn!("No MARKET_ADDRESS configured, order book polling is idle");
    }

    let state = Arc::new(AppState {
        store: store.clone(),
        registry,
        margin: TracerMargin::new(config.liquidation_gas_cost),
        config: config.clone(),
    });
    let server = tokio::spawn(async move {
        if let Err(e) = start_http_server(state).await {
            warn!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    store.unmount().await;
    server.abort();

    Ok(())
}

/// Push a snapshot to IPC views after every store change
async fn forward_snapshots(store: OmeStore, publisher: Publisher) {
    let mut rx = store.subscribe();
    while rx.changed().await.is_ok() && store.is_mounted() {
        let state = rx.borrow_and_update().clone();
        let market = store.selection().market.unwrap_or_default();
        if let Err(e) = publisher.publish(&market, &state).await {
            warn!(error = %e, "Failed to publish snapshot");
        }
    }
}

async fn start_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let port = state.config.http_port;
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/state", get(current_state))
        .route("/margin", get(margin))
        .route("/transfer", get(transfer))
        .route("/dispatch/:action", post(dispatch))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(app): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let selection = app.store.selection();
    let status = if app.store.is_mounted() { "healthy" } else { "stopped" };
    Json(serde_json::json!({
        "status": status,
        "component": "ome-book",
        "market": selection.market,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn current_state(State(app): State<Arc<AppState>>) -> Json<OmeState> {
    Json(app.store.state())
}

/// Payload-free actions only: `refetchOrders`, `refetchUserOrders`
async fn dispatch(
    State(app): State<Arc<AppState>>,
    Path(action): Path<String>,
) -> (StatusCode, String) {
    match action.parse::<OmeAction>() {
        Ok(action) => {
            app.store.dispatch(action);
            (StatusCode::ACCEPTED, "accepted".to_string())
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct MarginQuery {
    quote: Decimal,
    base: Decimal,
    price: Decimal,
    max_leverage: Option<Decimal>,
}

type JsonResponse = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: String) -> JsonResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

async fn margin(State(app): State<Arc<AppState>>, Query(q): Query<MarginQuery>) -> JsonResponse {
    let max_leverage = q.max_leverage.unwrap_or(app.config.max_leverage);
    let balances = Balances::new(q.quote, q.base);
    let snapshot = match MarginSnapshot::compute(&balances, q.price, max_leverage, &app.margin) {
        Ok(snapshot) => snapshot,
        Err(e) => return bad_request(e.to_string()),
    };

    let available = to_precision(snapshot.available_margin_percent, 3);
    let body = serde_json::json!({
        "metrics": snapshot,
        "display": {
            "total_margin": to_approx_currency(snapshot.total_margin),
            "buying_power": to_approx_currency(snapshot.buying_power),
            "available_margin": format!("{available}%"),
            "liquidation_price": to_approx_currency(snapshot.liquidation_price),
            "max_leverage": format!("@{}X Maximum Leverage", max_leverage.normalize()),
        }
    });
    (StatusCode::OK, Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransferDirection {
    Deposit,
    Withdraw,
}

#[derive(Debug, Deserialize)]
struct TransferQuery {
    kind: TransferDirection,
    amount: Decimal,
    quote: Decimal,
    base: Decimal,
    price: Decimal,
    wallet_balance: Option<Decimal>,
    max_leverage: Option<Decimal>,
}

/// Validate a deposit or withdrawal against the account's margin
async fn transfer(
    State(app): State<Arc<AppState>>,
    Query(q): Query<TransferQuery>,
) -> JsonResponse {
    let kind = match (q.kind, q.wallet_balance) {
        (TransferDirection::Deposit, Some(wallet_balance)) => {
            TransferKind::Deposit { wallet_balance }
        }
        (TransferDirection::Deposit, None) => {
            return bad_request("wallet_balance is required for deposits".to_string())
        }
        (TransferDirection::Withdraw, _) => TransferKind::Withdraw,
    };

    let result = check_transfer(
        kind,
        q.amount,
        &Balances::new(q.quote, q.base),
        q.price,
        q.max_leverage.unwrap_or(app.config.max_leverage),
        app.config.minimum_deposit,
        &app.margin,
    );
    match result {
        Ok(check) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": check, "ok": check.is_ok() })),
        ),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn metrics(State(app): State<Arc<AppState>>) -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&app.registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
