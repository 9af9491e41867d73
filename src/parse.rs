//! Extract show name, season and episode numbers from TV episode file names.
//!
//! Two marker forms are recognised, case-insensitively:
//! `S<season>E<episode>[E<episode>...]` and `<season>x<episode>[x<episode>...]`.
//! Additional episodes may also be separated with `_` or `-`,
//! so a file name produced by this crate parses back to the same numbers.

use std::path::Path;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::{Captures, Regex};

use crate::error::ParseError;
use crate::types::FileClassification;

static RE_SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)s(\d+)e(\d+)((?:[e_-]\d+)*)").expect("Failed to create regex pattern for season and episode")
});

// The season is limited to two digits so video resolutions like 1920x1080 are not taken as episodes.
static RE_NUMBER_X: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(\d{1,2})x(\d+)((?:[x_-]\d+)*)")
        .expect("Failed to create regex pattern for NxM episode")
});

static RE_EPISODE_WITHOUT_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\de\d+").expect("Failed to create regex pattern for bare episode"));

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Failed to create regex pattern for number"));

/// One episode marker found in a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EpisodeMarker {
    /// Byte offset where the marker starts.
    start: usize,
    season: u32,
    /// Sorted and deduplicated episode numbers.
    episodes: Vec<u32>,
}

/// Parse the file name of the given path into a [`FileClassification`].
///
/// # Errors
/// Returns a [`ParseError`] describing why the name is not a recognisable TV episode.
pub fn parse_file_name(path: &Path) -> Result<FileClassification, ParseError> {
    let (stem, _) = crate::get_normalized_file_name_and_extension(path).map_err(|_| ParseError::MissingEpisode)?;

    let markers = find_markers(&stem);
    let Some(first) = markers.first() else {
        if RE_EPISODE_WITHOUT_SEASON.is_match(&stem) {
            return Err(ParseError::MissingSeason);
        }
        return Err(ParseError::MissingEpisode);
    };

    let distinct = markers
        .iter()
        .map(|marker| (marker.season, marker.episodes.clone()))
        .unique()
        .count();
    if distinct != 1 {
        return Err(ParseError::MultipleEpisodes);
    }

    let start = markers.iter().map(|marker| marker.start).min().unwrap_or(first.start);
    let show_token = show_token(&stem[..start]);
    if show_token.is_empty() {
        return Err(ParseError::MissingShowName);
    }

    let (episode, multi_part_episodes) = split_multi_part(&first.episodes);

    Ok(FileClassification {
        source_path: path.to_path_buf(),
        show_token,
        season: first.season,
        episode,
        multi_part_episodes,
    })
}

/// Collect every episode marker of both supported forms.
/// Check if the text holds a season and episode marker in either form.
#[must_use]
pub fn contains_episode_marker(text: &str) -> bool {
    !find_markers(text).is_empty()
}

fn find_markers(name: &str) -> Vec<EpisodeMarker> {
    let season_episode = RE_SEASON_EPISODE
        .captures_iter(name)
        .filter_map(|caps| marker_from_captures(&caps, true));
    let number_x = RE_NUMBER_X
        .captures_iter(name)
        .filter_map(|caps| marker_from_captures(&caps, false));
    season_episode
        .chain(number_x)
        .sorted_by_key(|marker| marker.start)
        .collect()
}

/// Build a marker from regex captures: season, first episode and the optional extra episodes.
///
/// For the `S` form the marker starts at the prefix letter,
/// for the NxM form at the season digits after the boundary character.
fn marker_from_captures(caps: &Captures, season_prefixed: bool) -> Option<EpisodeMarker> {
    let season_match = caps.get(1)?;
    let season = season_match.as_str().parse::<u32>().ok()?;
    let start = if season_prefixed {
        caps.get(0)?.start()
    } else {
        season_match.start()
    };
    let mut episodes = vec![caps.get(2)?.as_str().parse::<u32>().ok()?];
    if let Some(rest) = caps.get(3) {
        for number in RE_NUMBER.find_iter(rest.as_str()) {
            episodes.push(number.as_str().parse::<u32>().ok()?);
        }
    }
    episodes.sort_unstable();
    episodes.dedup();
    Some(EpisodeMarker {
        start,
        season,
        episodes,
    })
}

/// Split sorted episode numbers into the primary episode and the consecutive parts after it.
///
/// The scan stops at the first gap.
fn split_multi_part(episodes: &[u32]) -> (u32, Vec<u32>) {
    let primary = episodes.first().copied().unwrap_or_default();
    let mut previous = primary;
    let mut parts = Vec::new();
    for &number in episodes.iter().skip(1) {
        if number != previous + 1 {
            break;
        }
        parts.push(number);
        previous = number;
    }
    (primary, parts)
}

/// Lowercase lookup key from the text preceding the episode marker.
fn show_token(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '_' | '-'));
    crate::strip_special_characters(&trimmed.to_lowercase(), true)
}
