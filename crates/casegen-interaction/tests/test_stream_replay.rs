use casegen_core::chat::ChatMessage;
use casegen_core::error::CasegenError;
use casegen_core::generation::{
    ConversationBody, FormatKind, GenerationBody, OutboundRequest, StreamTransport,
};
use casegen_interaction::{ChannelTransport, GenerationSession, SessionEvent, SessionState};

/// A generation response as the service writes it.
const GENERATION_WIRE: &str = concat!(
    "data: {\"chunk\": \"Scénario 1 : connexion réussie\\n\"}\n\n",
    "data: {\"chunk\": \"Étapes : saisir l’e-mail ✓\\n\"}\n\n",
    "data: {\"chunk\": \"Résultat attendu : tableau de bord affiché\"}\n\n",
    "data: [DONE]\n\n",
);

const GENERATED_TEXT: &str = "Scénario 1 : connexion réussie\nÉtapes : saisir l’e-mail ✓\nRésultat attendu : tableau de bord affiché";

fn generation_request() -> OutboundRequest {
    OutboundRequest::Generate(GenerationBody {
        requirements: "Users log in with e-mail and password".into(),
        format_type: FormatKind::Default,
        context: "Online banking".into(),
        example_case: None,
        project_id: "bank".into(),
    })
}

fn conversation_request() -> OutboundRequest {
    OutboundRequest::Converse(ConversationBody {
        message: "Ajoute un cas négatif".into(),
        project_id: "bank".into(),
        test_cases: "Scénario 1".into(),
        requirement_id: "login".into(),
        requirement_title: "Login".into(),
        requirements: "Users log in".into(),
        chat_history: vec![ChatMessage::user("Bonjour")],
        direct_mode: true,
        active_history_id: Some("v1".into()),
    })
}

async fn replay(
    transport: &dyn StreamTransport,
    request: &OutboundRequest,
) -> (GenerationSession, Vec<SessionEvent>) {
    let mut session = GenerationSession::new();
    session.start(transport, request).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = session.next_event().await {
        events.push(event);
    }
    (session, events)
}

#[tokio::test]
async fn test_generation_replay_in_odd_sized_fragments() {
    for fragment_size in [1, 3, 7, 64, GENERATION_WIRE.len()] {
        let transport = ChannelTransport::new();
        let feeder = transport.push_stream();
        for fragment in GENERATION_WIRE.as_bytes().chunks(fragment_size) {
            feeder.send(fragment.to_vec());
        }
        drop(feeder);

        let (session, events) = replay(&transport, &generation_request()).await;

        assert_eq!(session.state(), SessionState::Completed, "size {fragment_size}");
        assert_eq!(session.accumulated_text(), GENERATED_TEXT, "size {fragment_size}");
        assert_eq!(events.len(), 4, "size {fragment_size}");
        assert_eq!(events.last(), Some(&SessionEvent::Completed));
    }
}

#[tokio::test]
async fn test_conversation_replay_with_directive() {
    let wire = concat!(
        "data: {\"chunk\": \"J'ajoute le cas.\"}\n\n",
        "data: {\"updated_test_cases\": \"Scénario 1\\nScénario 2 : mot de passe erroné\", ",
        "\"confirmation\": \"Modifications appliquées.\"}\n\n",
        "data: [DONE]\n\n",
    );
    let transport = ChannelTransport::new();
    let feeder = transport.push_stream();
    let (head, tail) = wire.as_bytes().split_at(wire.len() / 2);
    feeder.send(head.to_vec());
    feeder.send(tail.to_vec());
    drop(feeder);

    let (session, events) = replay(&transport, &conversation_request()).await;

    assert_eq!(
        events,
        vec![
            SessionEvent::Chunk("J'ajoute le cas.".into()),
            SessionEvent::Directive {
                updated_document: "Scénario 1\nScénario 2 : mot de passe erroné".into(),
                note: Some("Modifications appliquées.".into()),
            },
            SessionEvent::Completed,
        ]
    );
    assert!(session.directive_received());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].to_json().unwrap();
    assert_eq!(requests[0].endpoint(), "chat_with_assistant");
    assert_eq!(body["chat_history"][0]["role"], "user");
    assert_eq!(body["chat_history"][0]["content"], "Bonjour");
    assert_eq!(body["active_history_id"], "v1");
}

#[tokio::test]
async fn test_replay_survives_garbage_between_frames() {
    let wire = concat!(
        "data: {\"chunk\": \"first \"}\n\n",
        ": keep-alive comment\n\n",
        "data: {\"chunk\": \"broken\n\n",
        "data: {\"chunk\": \"second\"}\n\n",
        "data: [DONE]\n\n",
    );
    let transport = ChannelTransport::new();
    let feeder = transport.push_stream();
    feeder.send(wire);
    drop(feeder);

    let (session, _) = replay(&transport, &generation_request()).await;

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.accumulated_text(), "first second");
}

#[tokio::test]
async fn test_replay_of_rejected_request() {
    let transport = ChannelTransport::new();
    let feeder = transport.push_stream();
    feeder.send("data: {\"error\": \"No requirements provided\"}\n\n");
    drop(feeder);

    let (session, events) = replay(&transport, &generation_request()).await;

    assert_eq!(
        events,
        vec![SessionEvent::Failed(CasegenError::producer(
            "No requirements provided"
        ))]
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.accumulated_text(), "");
}
