// Web UI: an index page plus a WebSocket chat endpoint. Each connection owns
// its own ChatSession; submissions are processed one at a time per socket,
// with the partial reply re-rendered and pushed after every token.

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    serve, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::chat::send_message;
use crate::llm::{LlmClient, TokenEvent};
use crate::session::ChatSession;
use crate::table::{render_response, Render};

/// Messages the browser sends over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Chat { text: String },
    Reset,
}

/// Messages pushed to the browser. `partial` carries the re-rendered view of
/// the accumulated reply after each token; `final` the completed turn.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Info { message: String },
    Start,
    Partial { render: Render },
    Final { render: Render },
    Error { message: String },
    ResetOk,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    llm: LlmClient,
}

impl AppState {
    pub fn new(llm: LlmClient) -> Result<Self> {
        let templates = create_minijinja_env().context("Failed to initialize template engine")?;
        Ok(Self {
            templates: Arc::new(templates),
            llm,
        })
    }
}

// Minijinja Environment setup
fn create_minijinja_env() -> Result<AutoReloader> {
    // Use AutoReloader for development convenience
    let reloader = AutoReloader::new(|notifier| {
        let loader = path_loader("templates");
        let mut env = Environment::new();
        env.set_loader(loader);
        // Watch the templates directory for changes
        notifier.watch_path("templates", true);
        Ok(env)
    });
    Ok(reloader)
}

async fn index_handler(
    State(state): State<AppState>,
) -> Result<axum::response::Html<String>, axum::response::Html<String>> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "Cundi",
                    tagline => "Soy Cundi, tu asistente virtual para la CAR. Entiende tus Peticiones, Quejas, Reclamos y Solicitudes (PQRS)",
                    placeholder => "Escribe tu mensaje acá... (Inicia con PQRS: para procesar el PQRS)",
                    model => state.llm.model(),
                };
                tmpl.render(context)
            })
        })
        .map(axum::response::Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            axum::response::Html(format!("Internal Server Error: {}", e))
        })
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(e) => {
            error!("Failed to serialize outbound message: {}", e);
            Ok(())
        }
    }
}

// Handle one WebSocket connection. The session lives and dies with the
// socket; submissions are handled strictly one at a time.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("New WebSocket connection established");
    let mut session = ChatSession::new();

    let welcome = ServerMessage::Info {
        message: "Conectado a Cundi".to_string(),
    };
    if send_json(&mut socket, &welcome).await.is_err() {
        warn!("Failed to send welcome message to new WebSocket client");
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Chat { text }) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    handle_submission(&mut socket, &state.llm, &mut session, &text).await;
                }
                Ok(ClientMessage::Reset) => {
                    session.reset();
                    info!("Session history cleared");
                    if send_json(&mut socket, &ServerMessage::ResetOk).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Unrecognized client message: {} - {}", text, e);
                }
            },
            Message::Binary(_) => {
                warn!("Received unexpected binary message from client");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                info!("Client requested WebSocket close");
                break;
            }
        }
    }
    info!("WebSocket connection closed");
}

// Run one submission: stream the reply, re-rendering the accumulated text
// for the client after every token, then push the final rendered turn.
async fn handle_submission(
    socket: &mut WebSocket,
    llm: &LlmClient,
    session: &mut ChatSession,
    text: &str,
) {
    let (tx, mut rx) = mpsc::channel::<TokenEvent>(64);

    let forward = async {
        let mut accumulated = String::new();
        while let Some(event) = rx.recv().await {
            let outbound = match event {
                TokenEvent::Start => ServerMessage::Start,
                TokenEvent::Token { text } => {
                    accumulated.push_str(&text);
                    ServerMessage::Partial {
                        render: render_response(&accumulated),
                    }
                }
                TokenEvent::Error { error } => ServerMessage::Error { message: error },
                TokenEvent::Done => continue,
            };
            if send_json(socket, &outbound).await.is_err() {
                // Client is gone; the request still runs to completion so
                // the session history stays consistent.
                warn!("WebSocket client disconnected mid-stream");
                break;
            }
        }
    };

    let (reply, ()) = tokio::join!(send_message(llm, session, text, tx), forward);

    let final_msg = ServerMessage::Final {
        render: render_response(&reply),
    };
    let _ = send_json(socket, &final_msg).await;
}

/// Builds the router. Kept separate from `start_web_server` so tests can
/// drive it without binding a port.
pub fn app(state: AppState) -> Router {
    // Serve static files from the `static` directory
    let static_files_service =
        ServeDir::new("static").not_found_service(tower::service_fn(|_| async {
            Ok::<_, std::convert::Infallible>(
                axum::http::Response::builder()
                    .status(axum::http::StatusCode::NOT_FOUND)
                    .body(axum::body::Body::from("Not Found"))
                    .unwrap(),
            )
        }));

    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, llm: LlmClient) -> Result<()> {
    let state = AppState::new(llm)?;
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
