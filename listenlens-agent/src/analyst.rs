use std::sync::Arc;

use listenlens_core::{LensError, Message, RetryPolicy, StructuredGenerator, TextRequest};

use crate::prompts;
use crate::state::{FetchResult, Intent};

/// Fixed synthesis voice, keyed by intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persona {
    FactChecker,
    MusicCriticAnalyst,
    RecommendationExpert,
    DirectResponder,
}

impl Persona {
    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::FactualQuery => Persona::FactChecker,
            Intent::InsightAnalysis => Persona::MusicCriticAnalyst,
            Intent::Recommendation => Persona::RecommendationExpert,
            Intent::Other => Persona::DirectResponder,
        }
    }
}

/// Turns intent + fetched results into the final answer. Reads fetch
/// results, never issues tool calls.
pub struct Analyst {
    model: String,
    retry: RetryPolicy,
}

impl Analyst {
    pub fn new(model: String, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub async fn synthesize(
        &self,
        generator: &Arc<dyn StructuredGenerator>,
        intent: Intent,
        analysis_focus: &str,
        user_query: &str,
        results: &[FetchResult],
    ) -> Result<String, LensError> {
        let persona = Persona::for_intent(intent);
        let messages = build_messages(persona, analysis_focus, user_query, results);
        tracing::debug!(?persona, results = results.len(), "synthesizing response");

        self.retry
            .run("synthesize", || {
                let generator = Arc::clone(generator);
                let request = TextRequest {
                    model: self.model.clone(),
                    messages: messages.clone(),
                };
                async move { generator.generate_text(request).await }
            })
            .await
    }
}

fn build_messages(
    persona: Persona,
    analysis_focus: &str,
    user_query: &str,
    results: &[FetchResult],
) -> Vec<Message> {
    let mut system = prompts::persona_system(persona, analysis_focus);

    let usable: Vec<&FetchResult> = results.iter().filter(|r| r.is_ok()).collect();
    let failed = results.len() - usable.len();

    if !results.is_empty() && usable.is_empty() {
        // Every retrieval failed: demand an explicit limitation answer
        // and give the model no data block to fabricate from.
        system.push_str(
            "\n\nEvery data retrieval for this request failed. State plainly that the \
             listening data could not be retrieved right now and suggest trying again. \
             Do not invent numbers, artists, or tracks.",
        );
    } else {
        if failed > 0 {
            system.push_str(
                "\n\nSome retrievals failed; answer from the data below and explicitly \
                 note which parts could not be retrieved.",
            );
        }
        if usable.iter().any(|r| r.truncated) {
            system.push_str(
                "\n\nSome results below were truncated to fit a size budget. Do not claim \
                 the answer is complete; note that it is based on partial data.",
            );
        }
    }

    let mut messages = vec![Message::system(system)];
    for result in &usable {
        messages.push(Message::tool(format!(
            "{}: {}",
            result.tool_name, result.payload
        )));
    }
    messages.push(Message::user(user_query.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FetchStatus;

    fn result(status: FetchStatus, truncated: bool) -> FetchResult {
        FetchResult {
            tool_name: "top_artists".to_string(),
            status,
            payload: "[]".to_string(),
            truncated,
        }
    }

    #[test]
    fn persona_follows_intent() {
        assert_eq!(
            Persona::for_intent(Intent::Recommendation),
            Persona::RecommendationExpert
        );
        assert_eq!(Persona::for_intent(Intent::Other), Persona::DirectResponder);
    }

    #[test]
    fn all_failed_omits_data_and_demands_limitation() {
        let results = vec![
            result(FetchStatus::Failed, false),
            result(FetchStatus::TimedOut, false),
        ];
        let messages = build_messages(Persona::FactChecker, "", "top artists?", &results);
        // System prompt plus the user query only; no tool observations.
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("could not be retrieved"));
    }

    #[test]
    fn truncated_results_forbid_completeness_claims() {
        let results = vec![result(FetchStatus::Ok, true)];
        let messages = build_messages(Persona::MusicCriticAnalyst, "trends", "how do I listen?", &results);
        assert!(messages[0].content.contains("partial data"));
        assert!(messages[0].content.contains("Focus: trends"));
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn partial_failure_keeps_successful_data() {
        let results = vec![
            result(FetchStatus::Ok, false),
            result(FetchStatus::Failed, false),
        ];
        let messages = build_messages(Persona::FactChecker, "", "stats?", &results);
        assert!(messages[0].content.contains("could not be retrieved"));
        assert!(messages
            .iter()
            .any(|m| m.content.starts_with("top_artists:")));
    }
}
