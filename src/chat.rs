// The conversation loop, shared by the web UI and the terminal session.
//
// One streaming request per submission: fixed system instruction, the
// trailing turns of history, then the new user text. The transcript keeps
// the raw submission (marker included); only the outgoing request is
// stripped. An upstream failure never leaves the session half-updated — the
// apology turn is appended exactly like a normal reply.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use comfy_table::{presets, ContentArrangement, Table};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::constants::{APOLOGY, HISTORY_WINDOW, SYSTEM_PROMPT};
use crate::llm::{ChatMessage, LlmClient, TokenEvent};
use crate::session::{strip_pqrs_prefix, ChatSession};
use crate::table::{render_response, Render, TableRow, FIELD_LABEL, VALUE_LABEL};

/// Builds the message list for one submission: system instruction, the last
/// `HISTORY_WINDOW` turns, then the new user text with any `PQRS:` marker
/// stripped. History turns go out as stored, marker and all.
pub fn compose_request(session: &ChatSession, input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(HISTORY_WINDOW + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    for turn in session.recent_turns(HISTORY_WINDOW) {
        messages.push(ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(ChatMessage::user(strip_pqrs_prefix(input)));
    messages
}

/// Runs one submission through the completion endpoint, streaming token
/// events to `tx`, and returns the assistant text appended to the session.
/// On upstream failure the returned (and appended) text is the fixed apology.
pub async fn send_message(
    client: &LlmClient,
    session: &mut ChatSession,
    input: &str,
    tx: mpsc::Sender<TokenEvent>,
) -> String {
    let messages = compose_request(session, input);
    session.push_user(input);

    let reply = match client.stream_chat(&messages, tx).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error generating response: {}", e);
            APOLOGY.to_string()
        }
    };

    session.push_assistant(reply.clone());
    reply
}

fn record_table(rows: &[TableRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![FIELD_LABEL, VALUE_LABEL]);
    for row in rows {
        table.add_row(vec![row.campo.as_str(), row.valor.as_str()]);
    }
    table
}

/// Interactive terminal chat against the same conversation loop as the web
/// UI. Tokens print raw as they stream; once the reply is complete, any
/// extracted record is rendered as a table.
pub async fn run_chat(client: LlmClient) -> Result<()> {
    println!("Cundi — asistente virtual PQRS de la CAR (modelo {})", client.model());
    println!("Escribe tu mensaje. Inicia con PQRS: para procesar un PQRS.");
    println!("Comandos: /reset borra el historial, /salir termina la sesión.\n");

    let mut session = ChatSession::new();
    let stdin = io::stdin();

    loop {
        print!("tú> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/salir" | "/exit" => break,
            "/reset" => {
                session.reset();
                info!("Session history cleared");
                println!("Historial borrado.\n");
                continue;
            }
            _ => {}
        }

        let (tx, mut rx) = mpsc::channel::<TokenEvent>(64);
        let printer = tokio::spawn(async move {
            let mut streamed_any = false;
            while let Some(event) = rx.recv().await {
                match event {
                    TokenEvent::Token { text } => {
                        streamed_any = true;
                        print!("{text}");
                        let _ = io::stdout().flush();
                    }
                    TokenEvent::Error { error } => {
                        eprintln!("Error generando la respuesta: {error}");
                    }
                    TokenEvent::Start | TokenEvent::Done => {}
                }
            }
            streamed_any
        });

        let reply = send_message(&client, &mut session, input, tx).await;
        let streamed_any = printer.await.context("token printer task failed")?;
        println!();

        match render_response(&reply) {
            Render::Table { prose, rows } => {
                if let Some(prose) = prose {
                    println!("{prose}\n");
                }
                println!("Información PQRS");
                println!("{}", record_table(&rows));
            }
            Render::Text { text } => {
                // Already on screen unless the stream never produced tokens
                // (the apology path).
                if !streamed_any {
                    println!("{text}");
                }
            }
        }
        println!();
    }

    Ok(())
}
