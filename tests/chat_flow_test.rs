// Conversation-loop tests against a mocked completion endpoint.

use serde_json::Value;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cundi::chat::send_message;
use cundi::constants::APOLOGY;
use cundi::llm::{LlmClient, TokenEvent};
use cundi::session::{ChatSession, Role};
use cundi::table::extract_table_data;

fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let payload = serde_json::json!({"choices": [{"delta": {"content": chunk}}]});
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mock_completion(server: &MockServer, chunks: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(chunks), "text/event-stream"),
        )
        .mount(server)
        .await;
}

fn test_client(server: &MockServer) -> LlmClient {
    LlmClient::new(server.uri(), "test-api-key", "gpt-4o")
}

fn drain(rx: &mut mpsc::Receiver<TokenEvent>) -> Vec<TokenEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test_log::test(tokio::test)]
async fn test_reply_streams_and_both_turns_are_appended() {
    let server = MockServer::start().await;
    mock_completion(&server, &["Hola, ", "soy Cundi."]).await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    let (tx, mut rx) = mpsc::channel(64);

    let reply = send_message(&client, &mut session, "hola", tx).await;
    assert_eq!(reply, "Hola, soy Cundi.");

    let turns = session.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "hola");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Hola, soy Cundi.");

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&TokenEvent::Start));
    assert_eq!(events.last(), Some(&TokenEvent::Done));
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            TokenEvent::Token { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, reply);
}

#[tokio::test]
async fn test_request_carries_system_prompt_and_stripped_marker() {
    let server = MockServer::start().await;
    mock_completion(&server, &["ok"]).await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    let (tx, _rx) = mpsc::channel(64);

    let input = "PQRS: Juan Pérez solicita información sobre permiso de vertimientos en Soacha";
    send_message(&client, &mut session, input, tx).await;

    // The transcript keeps the marker; the request does not.
    assert_eq!(session.turns()[0].content, input);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["stream"], true);
    let temperature = body["temperature"].as_f64().unwrap();
    assert!((temperature - 0.3).abs() < 1e-6);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains("Direcciones CAR"));
    let last = messages.last().unwrap();
    assert_eq!(last["role"], "user");
    assert_eq!(
        last["content"],
        "Juan Pérez solicita información sobre permiso de vertimientos en Soacha"
    );
}

#[tokio::test]
async fn test_model_context_is_bounded_to_last_three_turns() {
    let server = MockServer::start().await;
    mock_completion(&server, &["ok"]).await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    for i in 0..4 {
        session.push_user(format!("pregunta {i}"));
        session.push_assistant(format!("respuesta {i}"));
    }

    let (tx, _rx) = mpsc::channel(64);
    send_message(&client, &mut session, "última pregunta", tx).await;

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();

    // system + 3 trailing history turns + the new submission
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[1]["content"], "respuesta 2");
    assert_eq!(messages[2]["content"], "pregunta 3");
    assert_eq!(messages[3]["content"], "respuesta 3");
    assert_eq!(messages[4]["content"], "última pregunta");
}

#[tokio::test]
async fn test_reset_clears_model_context() {
    let server = MockServer::start().await;
    mock_completion(&server, &["ok"]).await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    session.push_user("pregunta vieja");
    session.push_assistant("respuesta vieja");

    session.reset();

    let (tx, _rx) = mpsc::channel(64);
    send_message(&client, &mut session, "nueva pregunta", tx).await;

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2); // system + the new submission only
}

#[tokio::test]
async fn test_connection_failure_substitutes_apology_turn() {
    // Nothing listens here; the request fails at connect time.
    let client = LlmClient::new("http://127.0.0.1:1", "test-api-key", "gpt-4o");
    let mut session = ChatSession::new();
    let (tx, mut rx) = mpsc::channel(64);

    let reply = send_message(&client, &mut session, "hola", tx).await;
    assert_eq!(reply, APOLOGY);

    // Exactly one new assistant turn, containing the apology.
    let turns = session.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, APOLOGY);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, TokenEvent::Error { .. })));
}

#[tokio::test]
async fn test_error_status_substitutes_apology_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    let (tx, _rx) = mpsc::channel(64);

    let reply = send_message(&client, &mut session, "hola", tx).await;
    assert_eq!(reply, APOLOGY);
    assert_eq!(session.turns().len(), 2);
}

#[tokio::test]
async fn test_pqrs_reply_roundtrips_through_the_extractor() {
    let server = MockServer::start().await;
    mock_completion(
        &server,
        &[
            "Aquí está el desglose de la PQRS:\n\n",
            "| Campo | Valor |\n",
            "|---|---|\n",
            "| Nombre | Juan Pérez |\n",
            "| Municipio | Soacha |\n",
            "| Dirección Asignada | Dirección de Evaluación, Seguimiento y Control Ambiental |\n",
        ],
    )
    .await;

    let client = test_client(&server);
    let mut session = ChatSession::new();
    let (tx, _rx) = mpsc::channel(64);

    let input = "PQRS: Juan Pérez solicita información sobre permiso de vertimientos en Soacha";
    let reply = send_message(&client, &mut session, input, tx).await;

    let table = extract_table_data(&reply).table.expect("reply should contain a table");
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0].campo, "Nombre");
    assert_eq!(table.rows[0].valor, "Juan Pérez");
    assert_eq!(table.rows[1].campo, "Municipio");
    assert_eq!(table.rows[1].valor, "Soacha");
    assert_eq!(table.rows[2].campo, "Dirección Asignada");
    assert_eq!(
        table.rows[2].valor,
        "Dirección de Evaluación, Seguimiento y Control Ambiental"
    );
}
