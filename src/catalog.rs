//! TV show catalog lookups.
//!
//! The default catalog is epguides.com: a daily cached list of all shows
//! and a per-show episode list, fetched once per show and kept for the run.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use itertools::Itertools;
use regex::Regex;

use crate::console::Logger;
use crate::fuzzy;

const ALL_SHOWS_URL: &str = "http://epguides.com/common/allshows.txt";
const EPISODE_LOOKUP_URL: &str = "http://epguides.com/common/exportToCSV.asp";
const ID_COLUMN: &str = "tvrage";
const SHOW_LIST_PREFIX: &str = "_epguides_";

static RE_PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre>(.*?)</pre>").expect("Failed to create regex pattern for pre block"));

static RE_SHOW_LIST_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^_epguides_\d{8}\.csv$").expect("Failed to create regex pattern for show list file")
});

/// Show and episode metadata provider.
pub trait Catalog {
    /// Canonical show titles that best match the query.
    fn find_show_candidates(&mut self, query: &str, log: &Logger) -> Result<Vec<String>>;

    /// Episode title for a canonical show name, if the catalog has one.
    fn find_episode_title(&mut self, show_name: &str, season: u32, episode: u32, log: &Logger)
    -> Result<Option<String>>;
}

/// HTTP GET returning the response body.
pub trait WebLookup {
    fn get(&mut self, url: &str) -> Result<String>;
}

/// Blocking HTTP client.
pub struct HttpLookup {
    client: reqwest::blocking::Client,
}

/// epguides.com catalog.
pub struct EpGuides<W: WebLookup = HttpLookup> {
    web: W,
    cache_dir: PathBuf,
    shows: Option<Vec<ShowEntry>>,
    episodes: HashMap<String, Vec<EpisodeEntry>>,
}

/// One row of the all shows list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowEntry {
    pub title: String,
    pub id: String,
}

/// One row of a show's episode list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeEntry {
    pub season: u32,
    pub episode: u32,
    pub title: String,
}

impl HttpLookup {
    /// Create the HTTP client.
    ///
    /// # Errors
    /// Returns an error if the client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl WebLookup for HttpLookup {
    fn get(&mut self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .with_context(|| format!("Request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Request returned error status: {url}"))?
            .text()
            .with_context(|| format!("Failed to read response body: {url}"))
    }
}

impl EpGuides<HttpLookup> {
    /// epguides.com catalog over HTTP, caching the show list in `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        Ok(Self::with_lookup(HttpLookup::new()?, cache_dir))
    }
}

impl<W: WebLookup> EpGuides<W> {
    pub fn with_lookup(web: W, cache_dir: PathBuf) -> Self {
        Self {
            web,
            cache_dir,
            shows: None,
            episodes: HashMap::new(),
        }
    }

    /// All shows, loaded on first use.
    fn shows(&mut self, log: &Logger) -> Result<&[ShowEntry]> {
        if self.shows.is_none() {
            let text = self.all_shows_text(log)?;
            self.shows = Some(parse_show_list(&text)?);
        }
        Ok(self.shows.as_deref().unwrap_or_default())
    }

    /// Read today's show list from the cache dir or download it.
    fn all_shows_text(&mut self, log: &Logger) -> Result<String> {
        let file_name = format!("{SHOW_LIST_PREFIX}{}.csv", Local::now().format("%Y%m%d"));
        let path = self.cache_dir.join(&file_name);
        if path.is_file() {
            log.verbose(&format!("Using cached show list: {}", path.display()));
            return fs::read_to_string(&path)
                .with_context(|| format!("Failed to read show list: {}", path.display()));
        }

        log.verbose(&format!("Downloading show list: {ALL_SHOWS_URL}"));
        let text = self.web.get(ALL_SHOWS_URL)?;
        parse_show_list(&text).context("Downloaded show list is invalid")?;

        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.cache_dir.display()))?;
        fs::write(&path, &text).with_context(|| format!("Failed to write show list: {}", path.display()))?;

        for entry in fs::read_dir(&self.cache_dir)?.filter_map(Result::ok) {
            let name = crate::os_str_to_string(&entry.file_name());
            if name != file_name && RE_SHOW_LIST_FILE.is_match(&name) {
                log.verbose(&format!("Removing old show list: {name}"));
                fs::remove_file(entry.path())
                    .with_context(|| format!("Failed to remove old show list: {}", entry.path().display()))?;
            }
        }

        Ok(text)
    }

    /// Episode list for a show id, fetched once per run.
    fn episodes(&mut self, show_id: &str, log: &Logger) -> Result<&[EpisodeEntry]> {
        if !self.episodes.contains_key(show_id) {
            log.verbose(&format!("Looking up episodes for show id {show_id}"));
            let html = self.web.get(&format!("{EPISODE_LOOKUP_URL}?rage={show_id}"))?;
            let episodes = parse_episode_list(extract_pre_block(&html)?)?;
            self.episodes.insert(show_id.to_string(), episodes);
        } else {
            log.verbose(&format!("Reusing episode list for show id {show_id}"));
        }
        Ok(self.episodes.get(show_id).map(Vec::as_slice).unwrap_or_default())
    }
}

impl<W: WebLookup> Catalog for EpGuides<W> {
    fn find_show_candidates(&mut self, query: &str, log: &Logger) -> Result<Vec<String>> {
        let titles: Vec<&str> = self.shows(log)?.iter().map(|show| show.title.as_str()).collect();
        Ok(fuzzy::best_matches(query, &titles).into_iter().unique().collect())
    }

    fn find_episode_title(
        &mut self,
        show_name: &str,
        season: u32,
        episode: u32,
        log: &Logger,
    ) -> Result<Option<String>> {
        let show_id = self
            .shows(log)?
            .iter()
            .find(|show| show.title == show_name && !show.id.is_empty())
            .map(|show| show.id.clone());

        let Some(show_id) = show_id else {
            log.warning(&format!("No catalog id found for show: {show_name}"));
            return Ok(None);
        };

        Ok(self
            .episodes(&show_id, log)?
            .iter()
            .find(|entry| entry.season == season && entry.episode == episode)
            .map(|entry| entry.title.clone()))
    }
}

/// Parse the all shows CSV, which must have `title` and `tvrage` columns.
///
/// # Errors
/// Returns an error if a required column is missing or the CSV is malformed.
pub fn parse_show_list(text: &str) -> Result<Vec<ShowEntry>> {
    let mut reader = csv_reader(text);
    let headers = reader.headers().context("Failed to read show list header")?.clone();
    let title_index = column_index(&headers, "title")?;
    let id_index = column_index(&headers, ID_COLUMN)?;

    let mut shows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read show list row")?;
        if let Some(title) = record.get(title_index).filter(|title| !title.is_empty()) {
            shows.push(ShowEntry {
                title: title.to_string(),
                id: record.get(id_index).unwrap_or_default().to_string(),
            });
        }
    }
    Ok(shows)
}

/// Parse a show's episode CSV with `season`, `episode` and `title` columns.
///
/// Rows where season or episode is not a number are skipped.
///
/// # Errors
/// Returns an error if a required column is missing or the CSV is malformed.
pub fn parse_episode_list(text: &str) -> Result<Vec<EpisodeEntry>> {
    let mut reader = csv_reader(text);
    let headers = reader.headers().context("Failed to read episode list header")?.clone();
    let season_index = column_index(&headers, "season")?;
    let episode_index = column_index(&headers, "episode")?;
    let title_index = column_index(&headers, "title")?;

    let mut episodes = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read episode list row")?;
        let season = record.get(season_index).and_then(|value| value.parse::<u32>().ok());
        let episode = record.get(episode_index).and_then(|value| value.parse::<u32>().ok());
        if let (Some(season), Some(episode)) = (season, episode) {
            episodes.push(EpisodeEntry {
                season,
                episode,
                title: record.get(title_index).unwrap_or_default().to_string(),
            });
        }
    }
    Ok(episodes)
}

/// Get the contents of the `<pre>` block from an HTML page.
///
/// # Errors
/// Returns an error if the page has no `<pre>` block.
pub fn extract_pre_block(html: &str) -> Result<&str> {
    RE_PRE_BLOCK
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|block| block.as_str().trim())
        .context("No <pre> block found in episode page")
}

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
        .with_context(|| format!("Missing required column '{name}'"))
}

#[cfg(test)]
mod catalog_tests {
    use super::*;

    use tempfile::tempdir;

    const SHOW_LIST: &str = "title,directory,tvrage,TVmaze,start date\n\
        The Office (US),OfficeUS,6061,526,Mar 2005\n\
        The Office (UK),Office,3629,1244,Jul 2001\n\
        Lost,Lost,4284,123,Sep 2004\n";

    const EPISODE_PAGE: &str = "<html><body><pre>\n\
        number,season,episode,airdate,title,tvmaze link\n\
        1,1,1,24 Mar 05,Pilot,http://example.com/1\n\
        7,2,1,20 Sep 05,The Dundies,http://example.com/7\n\
        8,2,2,27 Sep 05,\"Sexual Harassment\",http://example.com/8\n\
        S,Special,,01 Jan 06,Special Episode,http://example.com/s\n\
        </pre></body></html>";

    #[derive(Default)]
    struct MockWeb {
        requests: Vec<String>,
    }

    impl WebLookup for MockWeb {
        fn get(&mut self, url: &str) -> Result<String> {
            self.requests.push(url.to_string());
            if url == ALL_SHOWS_URL {
                Ok(SHOW_LIST.to_string())
            } else if url.ends_with("rage=6061") {
                Ok(EPISODE_PAGE.to_string())
            } else {
                anyhow::bail!("unexpected url {url}")
            }
        }
    }

    #[test]
    fn show_list_requires_columns() {
        let shows = parse_show_list(SHOW_LIST).unwrap();
        assert_eq!(shows.len(), 3);
        assert_eq!(
            shows[0],
            ShowEntry {
                title: "The Office (US)".to_string(),
                id: "6061".to_string()
            }
        );
        assert!(parse_show_list("name,tvrage\nLost,4284\n").is_err());
        assert!(parse_show_list("title,tvmaze\nLost,123\n").is_err());
    }

    #[test]
    fn episode_list_skips_non_numeric_rows() {
        let episodes = parse_episode_list(extract_pre_block(EPISODE_PAGE).unwrap()).unwrap();
        assert_eq!(episodes.len(), 3);
        assert_eq!(episodes[1].title, "The Dundies");
        assert_eq!(episodes[2].title, "Sexual Harassment");
    }

    #[test]
    fn missing_pre_block_is_an_error() {
        assert!(extract_pre_block("<html>nothing here</html>").is_err());
    }

    #[test]
    fn candidates_use_fuzzy_matching() {
        let dir = tempdir().unwrap();
        let mut guide = EpGuides::with_lookup(MockWeb::default(), dir.path().to_path_buf());
        let log = Logger::default();
        assert_eq!(
            guide.find_show_candidates("theoffice", &log).unwrap(),
            vec!["The Office (US)", "The Office (UK)"]
        );
        assert_eq!(guide.find_show_candidates("lost", &log).unwrap(), vec!["Lost"]);
        assert_eq!(guide.web.requests.len(), 1);
    }

    #[test]
    fn show_list_is_cached_for_the_day() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("_epguides_20000101.csv"), SHOW_LIST).unwrap();
        fs::write(dir.path().join("other.csv"), "keep").unwrap();

        let mut guide = EpGuides::with_lookup(MockWeb::default(), dir.path().to_path_buf());
        guide.find_show_candidates("lost", &Logger::default()).unwrap();

        let today = format!("_epguides_{}.csv", Local::now().format("%Y%m%d"));
        assert!(dir.path().join(&today).is_file());
        assert!(!dir.path().join("_epguides_20000101.csv").exists());
        assert!(dir.path().join("other.csv").exists());

        let mut guide = EpGuides::with_lookup(MockWeb::default(), dir.path().to_path_buf());
        assert_eq!(guide.find_show_candidates("lost", &Logger::default()).unwrap(), vec!["Lost"]);
        assert!(guide.web.requests.is_empty());
    }

    #[test]
    fn episode_titles_are_fetched_once_per_show() {
        let dir = tempdir().unwrap();
        let mut guide = EpGuides::with_lookup(MockWeb::default(), dir.path().to_path_buf());
        let log = Logger::default();

        let title = guide.find_episode_title("The Office (US)", 2, 1, &log).unwrap();
        assert_eq!(title.as_deref(), Some("The Dundies"));
        let title = guide.find_episode_title("The Office (US)", 1, 1, &log).unwrap();
        assert_eq!(title.as_deref(), Some("Pilot"));
        let title = guide.find_episode_title("The Office (US)", 9, 9, &log).unwrap();
        assert_eq!(title, None);

        let episode_requests = guide
            .web
            .requests
            .iter()
            .filter(|url| url.starts_with(EPISODE_LOOKUP_URL))
            .count();
        assert_eq!(episode_requests, 1);
    }

    #[test]
    fn unknown_show_has_no_episode_title() {
        let dir = tempdir().unwrap();
        let mut guide = EpGuides::with_lookup(MockWeb::default(), dir.path().to_path_buf());
        let title = guide.find_episode_title("Unknown", 1, 1, &Logger::default()).unwrap();
        assert_eq!(title, None);
    }
}
