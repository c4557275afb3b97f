use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One playback record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Play {
    pub artist: String,
    pub track: String,
    pub ms_played: u64,
    pub played_at: NaiveDateTime,
}

/// Inclusive date window; `None` bounds are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Summary {
    pub total_records: usize,
    pub total_minutes: u64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_tracks: usize,
    pub unique_artists: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ArtistRow {
    pub artist: String,
    pub hours_played: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TrackRow {
    pub track: String,
    pub artist: String,
    pub play_count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TrendRow {
    pub bucket: String,
    pub hours_played: u64,
    pub plays: usize,
}

/// How `listening_trend` groups plays.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendBucket {
    #[default]
    Hour,
    Weekday,
    Month,
}

/// Immutable in-memory listening history. Loaded once, queried many
/// times; all operations are pure reads over the record vector.
#[derive(Clone, Debug, Default)]
pub struct ListeningHistory {
    plays: Vec<Play>,
}

impl ListeningHistory {
    pub fn new(plays: Vec<Play>) -> Self {
        Self { plays }
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    fn filtered<'a>(
        &'a self,
        range: DateRange,
        artist: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Play> {
        self.plays.iter().filter(move |play| {
            if !range.contains(play.played_at.date()) {
                return false;
            }
            match artist {
                Some(name) => play.artist.eq_ignore_ascii_case(name),
                None => true,
            }
        })
    }

    pub fn summary(&self) -> Summary {
        let mut tracks = HashSet::new();
        let mut artists = HashSet::new();
        let mut total_ms: u64 = 0;
        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;

        for play in &self.plays {
            tracks.insert((play.artist.as_str(), play.track.as_str()));
            artists.insert(play.artist.as_str());
            total_ms += play.ms_played;
            let date = play.played_at.date();
            first = Some(first.map_or(date, |d| d.min(date)));
            last = Some(last.map_or(date, |d| d.max(date)));
        }

        Summary {
            total_records: self.plays.len(),
            total_minutes: total_ms / 60_000,
            first_date: first,
            last_date: last,
            unique_tracks: tracks.len(),
            unique_artists: artists.len(),
        }
    }

    /// Top artists by listening time, ties broken by name so output is
    /// stable.
    pub fn top_artists(&self, limit: usize, range: DateRange) -> Vec<ArtistRow> {
        let mut by_artist: BTreeMap<String, u64> = BTreeMap::new();
        for play in self.filtered(range, None) {
            *by_artist.entry(play.artist.clone()).or_default() += play.ms_played;
        }

        let mut rows: Vec<(String, u64)> = by_artist.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        rows.into_iter()
            .map(|(artist, total_ms)| ArtistRow {
                artist,
                hours_played: total_ms / 3_600_000,
            })
            .collect()
    }

    /// Top tracks by play count, optionally narrowed to one artist.
    pub fn top_tracks(
        &self,
        limit: usize,
        artist: Option<&str>,
        range: DateRange,
    ) -> Vec<TrackRow> {
        let mut by_track: BTreeMap<(String, String), usize> = BTreeMap::new();
        for play in self.filtered(range, artist) {
            *by_track
                .entry((play.track.clone(), play.artist.clone()))
                .or_default() += 1;
        }

        let mut rows: Vec<((String, String), usize)> = by_track.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        rows.into_iter()
            .map(|((track, artist), play_count)| TrackRow {
                track,
                artist,
                play_count,
            })
            .collect()
    }

    /// Listening activity grouped into time buckets, busiest first.
    pub fn trend(&self, bucket: TrendBucket) -> Vec<TrendRow> {
        let mut by_bucket: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        for play in &self.plays {
            let key = match bucket {
                TrendBucket::Hour => format!("{:02}:00", play.played_at.hour()),
                TrendBucket::Weekday => play.played_at.weekday().to_string(),
                TrendBucket::Month => {
                    format!("{}-{:02}", play.played_at.year(), play.played_at.month())
                }
            };
            let entry = by_bucket.entry(key).or_default();
            entry.0 += play.ms_played;
            entry.1 += 1;
        }

        let mut rows: Vec<(String, (u64, usize))> = by_bucket.into_iter().collect();
        rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
        rows.into_iter()
            .map(|(bucket, (total_ms, plays))| TrendRow {
                bucket,
                hours_played: total_ms / 3_600_000,
                plays,
            })
            .collect()
    }

    /// Raw rows in a window, most recent first.
    pub fn slice(&self, range: DateRange, artist: Option<&str>, limit: usize) -> Vec<Play> {
        let mut rows: Vec<Play> = self.filtered(range, artist).cloned().collect();
        rows.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        rows.truncate(limit);
        rows
    }
}
