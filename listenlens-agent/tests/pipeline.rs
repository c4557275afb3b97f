//! End-to-end turns through the orchestrator with scripted generators
//! and the real query tools over an in-memory fixture.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use listenlens_agent::{
    AgentConfig, FetchStatus, Intent, Orchestrator, Stage, FAILURE_MESSAGE,
};
use listenlens_core::LensError;
use listenlens_query::{toolset, ListeningHistory, Play};

use support::{ScriptedGenerator, StallingGenerator};

fn play(artist: &str, track: &str, ms: u64, date: (i32, u32, u32)) -> Play {
    Play {
        artist: artist.to_string(),
        track: track.to_string(),
        ms_played: ms,
        played_at: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(20, 15, 0)
            .unwrap(),
    }
}

fn history() -> Arc<ListeningHistory> {
    Arc::new(ListeningHistory::new(vec![
        play("Radiohead", "Weird Fishes", 240_000, (2025, 3, 1)),
        play("Radiohead", "Nude", 260_000, (2025, 3, 2)),
        play("Caribou", "Odessa", 215_000, (2025, 4, 10)),
        play("Caribou", "Sun", 230_000, (2025, 4, 11)),
        play("Floating Points", "Silhouettes", 420_000, (2025, 5, 5)),
    ]))
}

fn config() -> AgentConfig {
    AgentConfig {
        per_call_timeout: Duration::from_secs(2),
        aggregate_fetch_timeout: Duration::from_secs(5),
        ..AgentConfig::default()
    }
}

fn orchestrator(generator: Arc<ScriptedGenerator>) -> Orchestrator {
    Orchestrator::builder()
        .config(config())
        .generator(generator)
        .tools(toolset(history()))
        .build()
        .unwrap()
}

fn factual_plan() -> serde_json::Value {
    json!({
        "intent": "factual_query",
        "reasoning": "rank artists by listening time",
        "tool_plan": [
            { "name": "top_artists", "raw_args": { "limit": 2 }, "reasoning": "top artists" },
            { "name": "summary_stats", "raw_args": {}, "reasoning": "overall stats" }
        ]
    })
}

#[tokio::test]
async fn factual_query_runs_tools_and_synthesizes() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .structured_ok(factual_plan())
            .text_ok("Your top artist is Radiohead."),
    );
    let agent = orchestrator(Arc::clone(&generator));

    let state = agent
        .submit(None, "who are my top artists?", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.stage, Stage::Done);
    assert_eq!(state.intent, Some(Intent::FactualQuery));
    assert_eq!(state.tool_plan.len(), state.fetch_results.len());
    assert!(state.fetch_results.iter().all(|r| r.status == FetchStatus::Ok));
    assert!(state.fetch_results[0].payload.contains("Radiohead"));
    assert_eq!(
        state.final_response.as_deref(),
        Some("Your top artist is Radiohead.")
    );
    assert!(state.error_trace.is_empty());
    // One parse call; complete raw_args need no resolution round.
    assert_eq!(
        generator
            .structured_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn other_intent_skips_fetching_entirely() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .structured_ok(json!({ "intent": "other", "reasoning": "greeting" }))
            .text_ok("Hi! Ask me about your listening history."),
    );
    let agent = orchestrator(Arc::clone(&generator));

    let state = agent
        .submit(None, "hello!", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.stage, Stage::Done);
    assert_eq!(state.intent, Some(Intent::Other));
    assert!(state.tool_plan.is_empty());
    assert!(state.fetch_results.is_empty());
    assert!(state.final_response.is_some());
}

#[tokio::test]
async fn unparseable_intent_degrades_to_other() {
    let bad = || LensError::SchemaViolation {
        output: "{\"intent\":\"chitchat\"}".to_string(),
        reason: "unknown intent".to_string(),
    };
    // Default config: 2 retries after the first attempt, so 3 scripted
    // failures exhaust parsing.
    let generator = Arc::new(
        ScriptedGenerator::new()
            .structured_err(bad())
            .structured_err(bad())
            .structured_err(bad())
            .text_ok("I couldn't work out what you meant, but I can report listening stats."),
    );
    let agent = orchestrator(Arc::clone(&generator));

    let state = agent
        .submit(None, "???", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.stage, Stage::Done);
    assert_eq!(state.intent, Some(Intent::Other));
    assert!(state.fetch_results.is_empty());
    assert!(state.final_response.is_some());
    assert!(!state.error_trace.is_empty());
    assert_eq!(
        generator
            .structured_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        3
    );
}

#[tokio::test]
async fn unreachable_generator_fails_the_turn() {
    // Empty script: every call answers as unreachable.
    let agent = orchestrator(Arc::new(ScriptedGenerator::new()));

    let failure = agent
        .submit(None, "top artists?", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.message, FAILURE_MESSAGE);
    assert_eq!(failure.state.stage, Stage::Failed);
    assert!(failure.state.final_response.is_none());
    assert!(!failure.state.error_trace.is_empty());
}

#[tokio::test]
async fn unreachable_synthesis_fails_the_turn() {
    let generator = Arc::new(
        ScriptedGenerator::new().structured_ok(json!({ "intent": "other" })),
    );
    let agent = orchestrator(generator);

    let failure = agent
        .submit(None, "hello", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.message, FAILURE_MESSAGE);
    assert_eq!(failure.state.stage, Stage::Failed);
    assert!(failure.state.final_response.is_none());
}

#[tokio::test]
async fn identical_scripts_yield_identical_plans() {
    let mut plans = Vec::new();
    for _ in 0..2 {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .structured_ok(factual_plan())
                .text_ok("answer"),
        );
        let agent = orchestrator(generator);
        let state = agent
            .submit(None, "who are my top artists?", CancellationToken::new())
            .await
            .unwrap();
        plans.push((state.intent, state.tool_plan));
    }
    assert_eq!(plans[0], plans[1]);
}

#[tokio::test]
async fn cancelled_turn_produces_no_response() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .structured_ok(factual_plan())
            .text_ok("never emitted"),
    );
    let agent = orchestrator(Arc::clone(&generator));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let state = agent.submit(None, "top artists?", cancel).await.unwrap();

    assert_eq!(state.stage, Stage::Cancelled);
    assert!(state.final_response.is_none());
    assert_eq!(
        generator
            .structured_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn cancellation_mid_parse_stops_the_turn() {
    let agent = Orchestrator::builder()
        .config(config())
        .generator(Arc::new(StallingGenerator::new(Duration::from_secs(10))))
        .tools(toolset(history()))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let state = agent.submit(None, "top artists?", cancel).await.unwrap();

    assert_eq!(state.stage, Stage::Cancelled);
    assert!(state.final_response.is_none());
    // The in-flight generator call is abandoned, not waited out.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn second_turn_continues_the_conversation() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .structured_ok(json!({ "intent": "other" }))
            .structured_ok(factual_plan())
            .text_ok("Hi!")
            .text_ok("Radiohead, then Caribou."),
    );
    let agent = orchestrator(generator);

    let first = agent
        .submit(None, "hello", CancellationToken::new())
        .await
        .unwrap();
    let conversation = first.conversation_id;
    let transcript_len = first.messages.len();

    let second = agent
        .submit(Some(first), "and my top artists?", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.conversation_id, conversation);
    assert!(second.messages.len() > transcript_len);
    assert_eq!(
        second.final_response.as_deref(),
        Some("Radiohead, then Caribou.")
    );
    assert_eq!(second.stage, Stage::Done);
}
