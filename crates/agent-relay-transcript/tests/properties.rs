//! Transcript properties and the full relay pipeline.
//!
//! Run with: `cargo test -p agent-relay-transcript --test properties`

use bytes::Bytes;
use futures::StreamExt;
use proptest::prelude::*;

use agent_relay_core::config::ToolNaming;
use agent_relay_normalizer::{encode_frames, normalize};
use agent_relay_transcript::{
    DisplayMessage, NormalizedEvent, Role, Strictness, ToolState, Transcript, Turn, TurnOutcome,
    decode_frames, run_turn,
};

fn arb_event() -> impl Strategy<Value = NormalizedEvent> {
    prop_oneof![
        2 => Just(NormalizedEvent::tool_use("tavily")),
        3 => "[a-z ]{1,8}".prop_map(|t| NormalizedEvent::text(t)),
        1 => Just(NormalizedEvent::text("")),
    ]
}

fn reduce(events: &[NormalizedEvent]) -> Transcript {
    let mut transcript = Transcript::new();
    let mut turn = Turn::begin(&mut transcript, "question").with_strictness(Strictness::Strict);
    for event in events {
        turn.apply(event.clone()).expect("well-formed turn");
    }
    transcript
}

fn all_text(events: &[NormalizedEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            NormalizedEvent::Text { data } => Some(data.as_str()),
            NormalizedEvent::ToolUse { .. } => None,
        })
        .collect()
}

proptest! {
    /// Indicators never sit next to each other, and only the last message
    /// of a turn may still be pending.
    #[test]
    fn prop_indicators_well_formed(events in prop::collection::vec(arb_event(), 0..30)) {
        let transcript = reduce(&events);
        let messages = transcript.messages();

        for pair in messages.windows(2) {
            prop_assert!(!(pair[0].is_tool_indicator() && pair[1].is_tool_indicator()));
        }
        for (i, m) in messages.iter().enumerate() {
            if m.tool_state == ToolState::Pending {
                prop_assert_eq!(i, messages.len() - 1);
            }
            if m.is_tool_indicator() {
                prop_assert_eq!(m.role, Role::Assistant);
                prop_assert!(m.content.is_empty());
            }
        }
    }

    /// Text is never lost or reordered: the plain assistant messages
    /// concatenate to the concatenation of every text event.
    #[test]
    fn prop_text_preserved(events in prop::collection::vec(arb_event(), 0..30)) {
        let transcript = reduce(&events);
        let rendered: String = transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant && !m.is_tool_indicator())
            .map(|m| m.content.as_str())
            .collect();
        prop_assert_eq!(rendered, all_text(&events));
    }

    /// Adjacent text events always land in the same message.
    #[test]
    fn prop_text_runs_accumulate(parts in prop::collection::vec("[a-z]{1,5}", 1..10)) {
        let events: Vec<_> = parts.iter().map(|p| NormalizedEvent::text(p.as_str())).collect();
        let transcript = reduce(&events);
        prop_assert_eq!(transcript.len(), 2);
        prop_assert_eq!(&transcript.messages()[1].content, &parts.concat());
    }
}

#[test]
fn test_fragments_accumulate() {
    let transcript = reduce(&[
        NormalizedEvent::text("a"),
        NormalizedEvent::text("b"),
        NormalizedEvent::text("c"),
    ]);
    assert_eq!(
        transcript.messages(),
        &[DisplayMessage::user("question"), DisplayMessage::assistant("abc")]
    );
}

// --- Full pipeline: upstream body -> relay frames -> transcript ---

fn text_record(text: &str) -> String {
    let event = serde_json::json!({"event": {"contentBlockDelta": {"delta": {"text": text}}}});
    format!("data: {event}\n")
}

fn tool_record() -> String {
    "data: {\"event\":{\"contentBlockStart\":{\"start\":{\"toolUse\":{\"name\":\"tavily_search\"}}}}}\n"
        .to_string()
}

fn split_every(bytes: &[u8], size: usize) -> Vec<Bytes> {
    bytes.chunks(size).map(Bytes::copy_from_slice).collect()
}

/// Push an upstream body through the relay and rebuild the transcript
/// from the relay's frames, splitting both byte streams into `size`-byte
/// chunks.
async fn pipeline(body: Vec<Bytes>, failure: Option<&str>, size: usize) -> (Transcript, TurnOutcome) {
    let mut upstream: Vec<anyhow::Result<Bytes>> = body.into_iter().map(Ok).collect();
    if let Some(reason) = failure {
        upstream.push(Err(anyhow::anyhow!(reason.to_string())));
    }

    let frames: String = encode_frames(normalize(
        futures::stream::iter(upstream),
        ToolNaming::default(),
    ))
    .collect::<Vec<_>>()
    .await
    .concat();

    let relayed = futures::stream::iter(
        split_every(frames.as_bytes(), size)
            .into_iter()
            .map(Ok::<_, anyhow::Error>),
    );

    let mut transcript = Transcript::new();
    let outcome = run_turn(
        &mut transcript,
        "What is the weather?",
        decode_frames(relayed),
        Strictness::Strict,
        |_| {},
    )
    .await;
    (transcript, outcome)
}

fn assistant_view(transcript: &Transcript) -> Vec<(ToolState, String)> {
    transcript
        .messages()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| (m.tool_state, m.content.clone()))
        .collect()
}

#[tokio::test]
async fn test_pipeline_text_only() {
    let body = [text_record("Hello"), text_record(", world")].concat();
    for size in [1, 3, 7, 64] {
        let (transcript, outcome) = pipeline(split_every(body.as_bytes(), size), None, size).await;
        assert_eq!(outcome, TurnOutcome::Completed { events: 2 });
        assert_eq!(
            assistant_view(&transcript),
            vec![(ToolState::None, "Hello, world".to_string())]
        );
    }
}

#[tokio::test]
async fn test_pipeline_tool_then_text() {
    let body = [
        "data: {\"init_event_loop\":true}\n".to_string(),
        tool_record(),
        "data: \"tool output noise\"\n".to_string(),
        text_record("Sunny, "),
        text_record("22°C"),
    ]
    .concat();
    for size in [1, 2, 5, 128] {
        let (transcript, outcome) = pipeline(split_every(body.as_bytes(), size), None, size).await;
        assert_eq!(outcome, TurnOutcome::Completed { events: 3 });
        assert_eq!(
            assistant_view(&transcript),
            vec![
                (ToolState::Completed, String::new()),
                (ToolState::None, "Sunny, 22°C".to_string()),
            ]
        );
    }
}

#[tokio::test]
async fn test_pipeline_trailing_tool_stays_pending() {
    let body = [text_record("Searching. "), tool_record()].concat();
    let (transcript, outcome) = pipeline(split_every(body.as_bytes(), 4), None, 4).await;
    assert!(!outcome.is_failed());
    assert_eq!(
        assistant_view(&transcript),
        vec![
            (ToolState::None, "Searching. ".to_string()),
            (ToolState::Pending, String::new()),
        ]
    );
}

#[tokio::test]
async fn test_pipeline_upstream_failure() {
    let body = [tool_record(), text_record("partial")].concat();
    let (transcript, outcome) =
        pipeline(split_every(body.as_bytes(), 9), Some("connection reset"), 9).await;

    match &outcome {
        TurnOutcome::Failed { events, error } => {
            assert_eq!(*events, 2);
            assert!(error.contains("Failed to invoke agent"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let view = assistant_view(&transcript);
    assert_eq!(view.len(), 3);
    assert_eq!(view[0], (ToolState::Completed, String::new()));
    assert_eq!(view[1], (ToolState::None, "partial".to_string()));
    assert!(view[2].1.starts_with("An error occurred: "));
}
