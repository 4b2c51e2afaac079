use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use hearth_api::attachments::{self, AttachmentStore, MAX_FILE_SIZE, MAX_FILES_PER_MESSAGE};
use hearth_api::conversations;
use hearth_api::messages;
use hearth_api::middleware::{decode_token, require_auth};
use hearth_api::unread;
use hearth_api::{AppState, AppStateInner};
use hearth_db::Database;
use hearth_gateway::connection;
use hearth_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HEARTH_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HEARTH_DB_PATH").unwrap_or_else(|_| "hearth.db".into());
    let upload_dir = std::env::var("HEARTH_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
    let host = std::env::var("HEARTH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HEARTH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Shared state
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let store = AttachmentStore::new(&upload_dir).await?;
    let dispatcher = Dispatcher::new();

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        store,
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
    });

    // A full send is at most 5 files of 10 MB, plus text and part framing.
    let body_limit = MAX_FILES_PER_MESSAGE * MAX_FILE_SIZE + 1024 * 1024;

    // Routes
    let api_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/{conversation_id}", get(messages::get_messages))
        .route(
            "/conversations/{conversation_id}/messages",
            post(messages::send_message),
        )
        .route(
            "/conversations/{conversation_id}/read",
            post(unread::mark_read),
        )
        .route("/attachments/{attachment_id}", get(attachments::download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new().route("/gateway", get(ws_upgrade)).with_state(ServerState {
        dispatcher,
        db,
        jwt_secret,
    });

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Hearth server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct GatewayAuth {
    token: String,
}

/// Websocket upgrade, authenticated by the JWT in the query string.
/// Per-conversation authorization happens later, at subscribe time.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(auth): Query<GatewayAuth>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    match decode_token(&auth.token, &state.jwt_secret) {
        Ok(claims) => ws
            .on_upgrade(move |socket| {
                connection::handle_connection(socket, state.dispatcher, state.db, claims.sub)
            })
            .into_response(),
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}
