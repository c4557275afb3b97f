mod history;
mod tools;

pub use history::{
    ArtistRow, DateRange, ListeningHistory, Play, Summary, TrackRow, TrendBucket, TrendRow,
};
pub use tools::{
    toolset, HistorySliceTool, ListeningTrendTool, SummaryStatsTool, TopArtistsTool, TopTracksTool,
};
