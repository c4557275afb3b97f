use chrono::NaiveDateTime;

use listenlens_core::ToolSpec;

use crate::analyst::Persona;

/// Shared so planner and argument resolver agree on relative ranges.
const TIME_CONVENTION: &str = "Relative time ranges resolve against the current date: \
     'last year' means the prior calendar year (January 1 through December 31), \
     'this year' means the current calendar year to date.";

pub fn intent_parser_system(specs: &[ToolSpec], now: NaiveDateTime) -> String {
    let mut catalog = String::new();
    for spec in specs {
        catalog.push_str(&format!("- {}: {}\n", spec.name, spec.description));
    }

    format!(
        "You are the orchestrator for a listening-history data assistant. Read the user's \
         request, classify its intent, and select the tools needed to answer it.\n\
         \n\
         Available tools:\n{catalog}\
         \n\
         Tool selection guidelines:\n\
         - Prefer the specific tools (top_artists, top_tracks, summary_stats) over \
         history_slice.\n\
         - For recommendation requests, fetch top_artists and top_tracks first as a taste \
         baseline.\n\
         - Provide only the tool name, a short reasoning, and any argument hints you already \
         know in raw_args; exact arguments are resolved downstream.\n\
         \n\
         Intent classification:\n\
         - factual_query: raw numbers, lists, or specific facts.\n\
         - insight_analysis: habits, trends, comparisons, why/how questions.\n\
         - recommendation: the user explicitly asks for new music suggestions.\n\
         - other: greetings or requests unrelated to listening data. Select no tools for \
         'other'; select at least one tool for everything else.\n\
         \n\
         {TIME_CONVENTION}\n\
         Current date and time: {now}."
    )
}

pub fn argument_resolution_system(spec: &ToolSpec, reasoning: &str, now: NaiveDateTime) -> String {
    format!(
        "You are resolving arguments for one tool call against the user's request.\n\
         Tool: {name}\n\
         Purpose: {description}\n\
         Planner's reasoning: {reasoning}\n\
         \n\
         Produce a JSON object matching the tool's parameter schema exactly. Dates are \
         YYYY-MM-DD. {TIME_CONVENTION}\n\
         Current date and time: {now}.",
        name = spec.name,
        description = spec.description,
    )
}

pub fn persona_system(persona: Persona, analysis_focus: &str) -> String {
    let preamble = match persona {
        Persona::FactChecker => {
            "You are a listening-history analytics assistant. The user wants a factual \
             answer. Be direct, use bullet points, and synthesize the fetched data into a \
             clear answer without commentary."
        }
        Persona::MusicCriticAnalyst => {
            "You are a music critic and data analyst. The user wants insight into their \
             listening habits. Interpret the fetched data, compare aspects, and tell a \
             short story about what it shows."
        }
        Persona::RecommendationExpert => {
            "You are a music recommendation expert. Based on the user's listening history \
             below, suggest new music they might like and explain each suggestion."
        }
        Persona::DirectResponder => {
            "You are a listening-history analytics assistant. Respond helpfully and \
             briefly; if the request is unrelated to listening data, say what you can do."
        }
    };

    if analysis_focus.is_empty() {
        preamble.to_string()
    } else {
        format!("{preamble}\nFocus: {analysis_focus}")
    }
}
