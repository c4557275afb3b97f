use std::sync::Arc;

use chrono::NaiveDate;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use listenlens_core::{QueryTool, ToolError, Value};

use crate::history::{DateRange, ListeningHistory, TrendBucket};

/// Result sets past this size tend to swamp the synthesis context.
const LIMIT_WARNING_THRESHOLD: usize = 15;

fn default_limit() -> usize {
    5
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).expect("schemars output serializes to JSON")
}

fn parse_date(field: &str, raw: &Option<String>) -> Result<Option<NaiveDate>, ToolError> {
    match raw {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ToolError::InvalidArgs(format!("{field} must be YYYY-MM-DD, got '{text}'"))
            }),
    }
}

fn check_limit(tool: &str, limit: usize) {
    if limit > LIMIT_WARNING_THRESHOLD {
        tracing::warn!(tool, limit, "large limit requested, result may swamp context");
    }
}

fn parse_args<T>(tool: &str, args: Value) -> Result<T, ToolError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(args)
        .map_err(|err| ToolError::InvalidArgs(format!("{tool}: {err}")))
}

/// Overall listening statistics: totals, date range, unique counts.
pub struct SummaryStatsTool {
    history: Arc<ListeningHistory>,
}

impl SummaryStatsTool {
    pub fn new(history: Arc<ListeningHistory>) -> Self {
        Self { history }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NoArgs {}

#[async_trait::async_trait]
impl QueryTool for SummaryStatsTool {
    fn name(&self) -> &str {
        "summary_stats"
    }

    fn description(&self) -> &str {
        "Get overall listening summary statistics: total records, total listening minutes, \
         date range, unique tracks and unique artists. Takes no parameters."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<NoArgs>()
    }

    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(serde_json::to_value(self.history.summary())?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TopArtistsArgs {
    /// Number of artists to return.
    #[serde(default = "default_limit")]
    limit: usize,
    /// Inclusive start date, YYYY-MM-DD.
    #[serde(default)]
    start_date: Option<String>,
    /// Inclusive end date, YYYY-MM-DD.
    #[serde(default)]
    end_date: Option<String>,
}

/// Top artists by listening time.
pub struct TopArtistsTool {
    history: Arc<ListeningHistory>,
}

impl TopArtistsTool {
    pub fn new(history: Arc<ListeningHistory>) -> Self {
        Self { history }
    }
}

#[async_trait::async_trait]
impl QueryTool for TopArtistsTool {
    fn name(&self) -> &str {
        "top_artists"
    }

    fn description(&self) -> &str {
        "Get top artists ranked by total listening time. Supports an optional date range \
         (start_date/end_date, YYYY-MM-DD) and a result limit (default 5)."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TopArtistsArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: TopArtistsArgs = parse_args(self.name(), args)?;
        check_limit(self.name(), args.limit);
        let range = DateRange {
            start: parse_date("start_date", &args.start_date)?,
            end: parse_date("end_date", &args.end_date)?,
        };
        Ok(serde_json::to_value(
            self.history.top_artists(args.limit, range),
        )?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TopTracksArgs {
    /// Number of tracks to return.
    #[serde(default = "default_limit")]
    limit: usize,
    /// Restrict to one artist (case-insensitive).
    #[serde(default)]
    artist: Option<String>,
    /// Inclusive start date, YYYY-MM-DD.
    #[serde(default)]
    start_date: Option<String>,
    /// Inclusive end date, YYYY-MM-DD.
    #[serde(default)]
    end_date: Option<String>,
}

/// Top tracks by play count.
pub struct TopTracksTool {
    history: Arc<ListeningHistory>,
}

impl TopTracksTool {
    pub fn new(history: Arc<ListeningHistory>) -> Self {
        Self { history }
    }
}

#[async_trait::async_trait]
impl QueryTool for TopTracksTool {
    fn name(&self) -> &str {
        "top_tracks"
    }

    fn description(&self) -> &str {
        "Get top tracks ranked by play count. Supports an optional artist filter, date range \
         (YYYY-MM-DD) and a result limit (default 5)."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TopTracksArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: TopTracksArgs = parse_args(self.name(), args)?;
        check_limit(self.name(), args.limit);
        let range = DateRange {
            start: parse_date("start_date", &args.start_date)?,
            end: parse_date("end_date", &args.end_date)?,
        };
        Ok(serde_json::to_value(self.history.top_tracks(
            args.limit,
            args.artist.as_deref(),
            range,
        ))?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListeningTrendArgs {
    /// Grouping bucket: "hour", "weekday" or "month".
    #[serde(default)]
    group_by: Option<String>,
}

/// Listening activity grouped by time bucket.
pub struct ListeningTrendTool {
    history: Arc<ListeningHistory>,
}

impl ListeningTrendTool {
    pub fn new(history: Arc<ListeningHistory>) -> Self {
        Self { history }
    }
}

#[async_trait::async_trait]
impl QueryTool for ListeningTrendTool {
    fn name(&self) -> &str {
        "listening_trend"
    }

    fn description(&self) -> &str {
        "Get listening activity grouped into time buckets: group_by one of 'hour', 'weekday' \
         or 'month'. Unknown groupings fall back to 'hour'."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ListeningTrendArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: ListeningTrendArgs = parse_args(self.name(), args)?;
        let bucket = match args.group_by.as_deref() {
            Some("weekday") => TrendBucket::Weekday,
            Some("month") => TrendBucket::Month,
            Some("hour") | None => TrendBucket::Hour,
            Some(other) => {
                tracing::warn!(tool = self.name(), group_by = other, "unknown bucket, using hour");
                TrendBucket::Hour
            }
        };
        Ok(serde_json::to_value(self.history.trend(bucket))?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct HistorySliceArgs {
    /// Inclusive start date, YYYY-MM-DD.
    #[serde(default)]
    start_date: Option<String>,
    /// Inclusive end date, YYYY-MM-DD.
    #[serde(default)]
    end_date: Option<String>,
    /// Restrict to one artist (case-insensitive).
    #[serde(default)]
    artist: Option<String>,
    /// Maximum rows to return, most recent first.
    #[serde(default = "default_limit")]
    limit: usize,
}

/// Raw playback rows in a window, most recent first.
pub struct HistorySliceTool {
    history: Arc<ListeningHistory>,
}

impl HistorySliceTool {
    pub fn new(history: Arc<ListeningHistory>) -> Self {
        Self { history }
    }
}

#[async_trait::async_trait]
impl QueryTool for HistorySliceTool {
    fn name(&self) -> &str {
        "history_slice"
    }

    fn description(&self) -> &str {
        "Fetch raw playback rows, most recent first. Supports date range (YYYY-MM-DD), an \
         optional artist filter and a row limit (default 5). Use only when the aggregate \
         tools cannot answer the question."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<HistorySliceArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: HistorySliceArgs = parse_args(self.name(), args)?;
        check_limit(self.name(), args.limit);
        let range = DateRange {
            start: parse_date("start_date", &args.start_date)?,
            end: parse_date("end_date", &args.end_date)?,
        };
        Ok(serde_json::to_value(self.history.slice(
            range,
            args.artist.as_deref(),
            args.limit,
        ))?)
    }
}

/// The full toolset bound over one shared history.
pub fn toolset(history: Arc<ListeningHistory>) -> Vec<Arc<dyn QueryTool>> {
    vec![
        Arc::new(SummaryStatsTool {
            history: Arc::clone(&history),
        }),
        Arc::new(TopArtistsTool {
            history: Arc::clone(&history),
        }),
        Arc::new(TopTracksTool {
            history: Arc::clone(&history),
        }),
        Arc::new(ListeningTrendTool {
            history: Arc::clone(&history),
        }),
        Arc::new(HistorySliceTool { history }),
    ]
}
