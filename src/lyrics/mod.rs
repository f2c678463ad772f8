//! LRC lyric model.
//!
//! Accepts the line-synchronized `[mm:ss.ff]text` format. Lines without a timestamp
//! (metadata tags such as `[ar:Artist]`, blank lines, prose) are skipped with a warning
//! rather than failing the whole file; only a file with no usable line at all is an error.

use log::{info, warn};
use serde::Serialize;

use crate::error::LyricsError;

/// One timed lyric line. `time` is in seconds from the start of the song.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricLine {
    pub time: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self { time, text: text.into() }
    }

    /// Words of the line as they are laid out on screen (split on single spaces).
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split(' ')
    }
}

/// A parsed lyric file: time-sorted lines plus the length of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricTrack {
    lines: Vec<LyricLine>,
    total_time: f64,
}

impl LyricTrack {
    pub fn parse(src: &str, tail_seconds: f64) -> Result<Self, LyricsError> {
        parse_lrc(src).map(|lines| Self::from_lines(lines, tail_seconds))
    }

    /// Build from already-sorted lines. `lines` must not be empty.
    pub fn from_lines(lines: Vec<LyricLine>, tail_seconds: f64) -> Self {
        let last = lines.last().map(|l| l.time).unwrap_or(0.0);
        Self { lines, total_time: last + tail_seconds.max(0.0) }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn display_index(&self, current_time: f64) -> usize {
        display_index(&self.lines, current_time)
    }
}

/// Index of the line on screen at `current_time`: the last line whose time has been
/// reached, or the first line before any has.
pub fn display_index(lines: &[LyricLine], current_time: f64) -> usize {
    let upcoming = lines
        .iter()
        .position(|l| l.time > current_time)
        .unwrap_or(lines.len());
    upcoming.saturating_sub(1)
}

/// Parse LRC text into lines sorted by time (stable for equal timestamps).
pub fn parse_lrc(src: &str) -> Result<Vec<LyricLine>, LyricsError> {
    let mut lines = Vec::new();
    let mut skipped = 0usize;

    for raw in src.lines() {
        if raw.trim().is_empty() || !raw.contains('[') {
            continue;
        }
        match parse_line(raw) {
            Some(line) => lines.push(line),
            None => {
                skipped += 1;
                warn!("skipped invalid lyric line: {}", raw.trim());
            }
        }
    }

    if lines.is_empty() {
        log::error!("no valid timestamps found in lyric file");
        return Err(LyricsError::EmptyParseResult { skipped });
    }

    // `sort_by` is stable: equal timestamps keep their file order.
    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    info!("parsed {} lyric lines ({} skipped)", lines.len(), skipped);
    Ok(lines)
}

/// First `[m:s.f]` timestamp anywhere in the line; the rest of the line is the text.
fn parse_line(line: &str) -> Option<LyricLine> {
    line.match_indices('[').find_map(|(start, _)| {
        let (consumed, time) = parse_timestamp(&line[start..])?;
        let text = line[start + consumed..].trim();
        Some(LyricLine::new(time, text))
    })
}

/// Parse `[<digits>:<digits>.<digits>]` at the start of `src`.
/// Returns the number of bytes consumed and the time in seconds.
fn parse_timestamp(src: &str) -> Option<(usize, f64)> {
    let body = src.strip_prefix('[')?;
    let close = body.find(']')?;
    let stamp = &body[..close];
    let (minutes, seconds) = stamp.split_once(':')?;
    let (whole, fraction) = seconds.split_once('.')?;

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(minutes) || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let minutes: f64 = minutes.parse::<u64>().ok()? as f64;
    let seconds: f64 = seconds.parse().ok()?;
    Some((close + 2, minutes * 60.0 + seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("[00:01.00]x"), Some((10, 1.0)));
        assert_eq!(parse_timestamp("[01:10.5]"), Some((9, 70.5)));
        assert_eq!(parse_timestamp("[123:00.250]"), Some((12, 7380.25)));
        assert_eq!(parse_timestamp("[00:01]"), None);
        assert_eq!(parse_timestamp("[ar:Artist]"), None);
        assert_eq!(parse_timestamp("[00:01.]"), None);
        assert_eq!(parse_timestamp("[-1:01.00]"), None);
        assert_eq!(parse_timestamp("00:01.00]"), None);
    }

    #[test]
    fn test_parse_line_trims_text_and_finds_stamp_anywhere() {
        let line = parse_line("  [00:03.50]  World \r").unwrap();
        assert_eq!(line, LyricLine::new(3.5, "World"));

        let prefixed = parse_line("[ti:Song] [00:02.00]Hi").unwrap();
        assert_eq!(prefixed.time, 2.0);
        assert_eq!(prefixed.text, "Hi");
    }

    #[test]
    fn test_parse_line_allows_empty_text() {
        let line = parse_line("[00:07.00]").unwrap();
        assert_eq!(line.text, "");
    }

    #[test]
    fn test_scenario_hello_world() {
        let track = LyricTrack::parse("[00:01.00]Hello\n[00:03.50]World", 5.0).unwrap();
        assert_eq!(
            track.lines(),
            &[LyricLine::new(1.0, "Hello"), LyricLine::new(3.5, "World")]
        );
        assert!((track.total_time() - 8.5).abs() < 1e-9);
        assert_eq!(track.display_index(2.0), 0);
        assert_eq!(track.display_index(5.0), 1);
    }

    #[test]
    fn test_metadata_and_garbage_are_skipped() {
        let src = "[ti:Title]\n[ar:Someone]\nplain prose\n\n[00:05.00]Second\n[00:00.50]First\n";
        let lines = parse_lrc(src).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "First");
        assert_eq!(lines[1].text, "Second");
    }

    #[test]
    fn test_empty_parse_reports_skipped_count() {
        let err = parse_lrc("[ti:Title]\n[ar:Artist]\nno stamps here").unwrap_err();
        assert_eq!(err, LyricsError::EmptyParseResult { skipped: 2 });
        assert!(parse_lrc("").is_err());
    }

    #[test]
    fn test_equal_timestamps_keep_file_order() {
        let lines = parse_lrc("[00:02.00]b\n[00:01.00]a1\n[00:01.00]a2\n[00:01.00]a3").unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["a1", "a2", "a3", "b"]);
    }

    #[test]
    fn test_display_index_before_first_line_and_at_boundaries() {
        let lines = parse_lrc("[00:02.00]a\n[00:04.00]b\n[00:06.00]c").unwrap();
        assert_eq!(display_index(&lines, 0.0), 0);
        assert_eq!(display_index(&lines, 2.0), 0);
        assert_eq!(display_index(&lines, 3.99), 0);
        assert_eq!(display_index(&lines, 4.0), 1);
        assert_eq!(display_index(&lines, 100.0), 2);
        assert_eq!(display_index(&[], 3.0), 0);
    }

    #[test]
    fn test_words_split_on_spaces() {
        let line = LyricLine::new(0.0, "la la  land");
        let words: Vec<&str> = line.words().collect();
        assert_eq!(words, ["la", "la", "", "land"]);
    }
}
