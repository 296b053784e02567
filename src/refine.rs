//! Post-processing of looked-up records: season/episode narrowing for
//! series and the result orderings offered to clients.

use crate::errors::LookupError;
use crate::types::CachedRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Reverse;
use std::str::FromStr;

static SEASON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"S(\d+)").expect("valid season regex"));
static EPISODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"E(\d+)").expect("valid episode regex"));

/// Keeps only records whose title does not name another season/episode.
///
/// Titles without any season marker are kept. Two markers are read as an
/// inclusive pack range (`S01-S03`); any other count must contain the
/// wanted number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesFilter {
    pub season: u32,
    pub episode: u32,
}

impl SeriesFilter {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    pub fn apply(&self, records: Vec<CachedRecord>) -> Vec<CachedRecord> {
        let before = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|r| r.title().map_or(true, |t| self.matches(t)))
            .collect();
        log::info!(
            "Series filter S{:02}E{:02}: {} -> {} records",
            self.season,
            self.episode,
            before,
            kept.len()
        );
        kept
    }

    pub fn matches(&self, title: &str) -> bool {
        let upper = title.to_uppercase();
        let seasons = numbers(&SEASON_RE, &upper);
        if !marker_matches(&seasons, self.season) {
            return false;
        }
        if seasons.is_empty() {
            return true;
        }
        marker_matches(&numbers(&EPISODE_RE, &upper), self.episode)
    }
}

/// Every marker counts, even one too large for `u64`; it saturates.
fn numbers(re: &Regex, title: &str) -> Vec<u64> {
    re.captures_iter(title)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
        .collect()
}

fn marker_matches(found: &[u64], wanted: u32) -> bool {
    let wanted = u64::from(wanted);
    match found {
        [] => true,
        [a, b] => (*a.min(b)..=*a.max(b)).contains(&wanted),
        _ => found.contains(&wanted),
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Quality,
    SizeAsc,
    SizeDesc,
    QualityThenSize,
}

impl FromStr for SortOrder {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(SortOrder::Quality),
            "sizeasc" => Ok(SortOrder::SizeAsc),
            "sizedesc" => Ok(SortOrder::SizeDesc),
            "qualitythensize" => Ok(SortOrder::QualityThenSize),
            other => Err(LookupError::Config(format!("unknown sort order: {}", other))),
        }
    }
}

impl SortOrder {
    /// Stable sort of `records` in place.
    pub fn sort(&self, records: &mut [CachedRecord]) {
        match self {
            SortOrder::Quality => records.sort_by_key(quality_rank),
            SortOrder::SizeAsc => records.sort_by_key(size),
            SortOrder::SizeDesc => records.sort_by_key(|r| Reverse(size(r))),
            SortOrder::QualityThenSize => records.sort_by_key(|r| (quality_rank(r), Reverse(size(r)))),
        }
    }
}

/// Known qualities first, then unrecognised labels, then records without one.
fn quality_rank(record: &CachedRecord) -> (u8, bool) {
    match record.get("quality").and_then(Value::as_str) {
        Some(q) => {
            let rank = match q.to_ascii_lowercase().as_str() {
                "4k" => 0,
                "1080p" => 1,
                "720p" => 2,
                "480p" => 3,
                _ => u8::MAX,
            };
            (rank, false)
        }
        None => (u8::MAX, true),
    }
}

fn size(record: &CachedRecord) -> i64 {
    match record.get("size") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CachedRecord {
        match value {
            Value::Object(map) => CachedRecord::new(map),
            _ => panic!("record fixtures must be objects"),
        }
    }

    fn titles(records: &[CachedRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.title()).collect()
    }

    #[test]
    fn test_series_filter_single_markers() {
        let filter = SeriesFilter::new(2, 5);
        assert!(filter.matches("Show.S02E05.1080p"));
        assert!(filter.matches("show s02e05 720p"));
        assert!(!filter.matches("Show.S02E06.1080p"));
        assert!(!filter.matches("Show.S03E05.1080p"));
        // whole-season pack, no episode marker
        assert!(filter.matches("Show.S02.Complete"));
        // no season marker at all
        assert!(filter.matches("Show 2019 Documentary"));
    }

    #[test]
    fn test_series_filter_ranges() {
        let filter = SeriesFilter::new(2, 5);
        assert!(filter.matches("Show S01-S03 Pack"));
        assert!(filter.matches("Show S03-S01 Pack"));
        assert!(!filter.matches("Show S03-S05 Pack"));
        assert!(filter.matches("Show S02 E01-E10"));
        assert!(!filter.matches("Show S02 E06-E10"));
    }

    #[test]
    fn test_series_filter_oversized_markers_still_count() {
        let filter = SeriesFilter::new(2, 5);
        assert!(filter.matches("Show S01 to S99999999999999999999999 Pack"));
        assert!(!filter.matches("Show S99999999999999999999999 Only"));
        assert!(filter.matches("Show S02 E01-E4294967296"));
    }

    #[test]
    fn test_series_filter_keeps_untitled_records() {
        let records = vec![
            record(json!({"title": "Show.S02E05"})),
            record(json!({"title": "Show.S01E05"})),
            record(json!({"id": 3})),
        ];
        let kept = SeriesFilter::new(2, 5).apply(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(titles(&kept), vec!["Show.S02E05"]);
    }

    #[test]
    fn test_sort_by_quality() {
        let mut records = vec![
            record(json!({"title": "none"})),
            record(json!({"title": "odd", "quality": "hdcam"})),
            record(json!({"title": "sd", "quality": "480p"})),
            record(json!({"title": "uhd", "quality": "4K"})),
            record(json!({"title": "fhd", "quality": "1080p"})),
        ];
        SortOrder::Quality.sort(&mut records);
        assert_eq!(titles(&records), vec!["uhd", "fhd", "sd", "odd", "none"]);
    }

    #[test]
    fn test_sort_by_size() {
        let mut records = vec![
            record(json!({"title": "b", "size": "2000"})),
            record(json!({"title": "a", "size": 10})),
            record(json!({"title": "c"})),
        ];
        SortOrder::SizeAsc.sort(&mut records);
        assert_eq!(titles(&records), vec!["c", "a", "b"]);

        SortOrder::SizeDesc.sort(&mut records);
        assert_eq!(titles(&records), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_quality_then_size() {
        let mut records = vec![
            record(json!({"title": "small-hd", "quality": "1080p", "size": 1})),
            record(json!({"title": "sd", "quality": "480p", "size": 99})),
            record(json!({"title": "big-hd", "quality": "1080p", "size": 5})),
        ];
        SortOrder::QualityThenSize.sort(&mut records);
        assert_eq!(titles(&records), vec!["big-hd", "small-hd", "sd"]);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("qualitythensize".parse::<SortOrder>().unwrap(), SortOrder::QualityThenSize);
        assert_eq!("SizeDesc".parse::<SortOrder>().unwrap(), SortOrder::SizeDesc);
        assert!("alphabetical".parse::<SortOrder>().is_err());
    }
}
