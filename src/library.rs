//! Place a resolved show into the TV library directory tree.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::console::{Logger, SelectOptions, Selection, UserInput};
use crate::database::Database;
use crate::fuzzy;
use crate::types::{EpisodeRecord, LibraryPlacement, ShowIdentity};

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Failed to create regex pattern for number"));

const SHOW_DIR_COMMENT: &str = "enter 'ls' to list all items in TV library directory";
const SEASON_DIR_COMMENT: &str = "enter 'ls' to list all items in show directory";

/// Finds show and season directories inside the library root and remembers them in the database.
pub struct LibraryResolver<'a> {
    database: &'a Database,
    input: &'a mut UserInput,
    library_dir: &'a Path,
}

impl<'a> LibraryResolver<'a> {
    pub fn new(database: &'a Database, input: &'a mut UserInput, library_dir: &'a Path) -> Self {
        Self {
            database,
            input,
            library_dir,
        }
    }

    /// Resolve show and season directories for the given show season.
    ///
    /// Returns `None` if the user skips either directory.
    ///
    /// # Errors
    /// Filesystem and database errors, and [`crate::error::FatalError`] for conflicts or user exit.
    pub fn resolve(&mut self, show: &ShowIdentity, season: u32, log: &Logger) -> Result<Option<LibraryPlacement>> {
        log.info(&format!("Looking up library directory for show: {}", show.name));
        let log = log.nested();

        let Some(show_dir) = self.resolve_show_dir(show, &log)? else {
            return Ok(None);
        };
        let show_path = self.library_dir.join(&show_dir);
        let Some(season_dir) = self.resolve_season_dir(show.id, &show_path, season, &log)? else {
            return Ok(None);
        };

        Ok(Some(LibraryPlacement {
            show_dir,
            season_dir: (!season_dir.is_empty()).then_some(season_dir),
        }))
    }

    fn resolve_show_dir(&mut self, show: &ShowIdentity, log: &Logger) -> Result<Option<String>> {
        if let Some(show_dir) = self.database.show_dir(show.id)? {
            log.verbose(&format!("Show directory from database: {show_dir}"));
            return Ok(Some(show_dir));
        }

        log.info(&format!(
            "No show directory in database, looking for best match in: {}",
            self.library_dir.display()
        ));
        let entries = crate::list_subdirectories(self.library_dir)?;
        let show_dir = if entries.is_empty() {
            log.info("TV library directory is empty");
            self.create_new_show_dir(&show.name, log)?
        } else {
            let mut matches = fuzzy::best_matches(&show.name, &entries);
            let mut prompt_only = false;
            loop {
                let options = SelectOptions {
                    comment: Some(SHOW_DIR_COMMENT),
                    prompt_only,
                    skip_label: "to create new show directory",
                    ..SelectOptions::default()
                };
                prompt_only = false;
                match self.input.select(log, &matches, &options)? {
                    Selection::Accepted(dir) => break Some(dir),
                    Selection::Abandoned => break self.create_new_show_dir(&show.name, log)?,
                    Selection::Lookup(text) if text.eq_ignore_ascii_case("ls") => {
                        log.info(&format!("TV library directory contains: {}", entries.join(", ")));
                        prompt_only = true;
                    }
                    Selection::Lookup(text) => matches = fuzzy::best_matches(&text, &entries),
                }
            }
        };

        let Some(show_dir) = show_dir else {
            log.info("Show directory skipped");
            return Ok(None);
        };
        self.database.set_show_dir(show.id, &show_dir)?;
        Ok(Some(show_dir))
    }

    /// Suggest the show name without special characters as the directory name.
    fn create_new_show_dir(&mut self, show_name: &str, log: &Logger) -> Result<Option<String>> {
        let suggested = crate::strip_special_characters(show_name, false);
        log.info(&format!("Suggested show directory name: '{suggested}'"));
        let response = self.input.ask(
            log,
            "Enter 'y' to accept this directory, 'x' to skip this show or enter a new directory to use: ",
            "y",
        )?;
        Ok(match response.to_lowercase().as_str() {
            "x" => None,
            "y" => Some(suggested),
            _ => Some(response),
        })
    }

    /// Resolve the season directory. An empty name means the show directory itself.
    fn resolve_season_dir(
        &mut self,
        show_id: i64,
        show_path: &Path,
        season: u32,
        log: &Logger,
    ) -> Result<Option<String>> {
        log.info(&format!("Looking up season {season} directory"));
        let log = log.nested();

        if let Some(season_dir) = self.database.season_dir(show_id, season)? {
            log.verbose(&format!("Season directory from database: '{season_dir}'"));
            return Ok(Some(season_dir));
        }

        let season_dir = if show_path.is_dir() {
            let entries = crate::list_subdirectories(show_path)?;
            let mut matches: Vec<String> = entries
                .iter()
                .filter(|name| is_season_dir(name, season))
                .cloned()
                .collect();
            let mut prompt_only = false;
            loop {
                let options = SelectOptions {
                    comment: Some(SEASON_DIR_COMMENT),
                    prompt_only,
                    skip_label: "to create new season directory",
                    ..SelectOptions::default()
                };
                prompt_only = false;
                match self.input.select(&log, &matches, &options)? {
                    Selection::Accepted(dir) => break Some(dir),
                    Selection::Abandoned => break self.create_new_season_dir(season, &log)?,
                    Selection::Lookup(text) if text.eq_ignore_ascii_case("ls") => {
                        if entries.is_empty() {
                            log.info("Show directory is empty");
                        } else {
                            log.info(&format!("Show directory contains: {}", entries.join(", ")));
                        }
                        prompt_only = true;
                    }
                    Selection::Lookup(text) => matches = fuzzy::best_matches(&text, &entries),
                }
            }
        } else {
            log.info(&format!("Show directory does not exist yet: {}", show_path.display()));
            self.create_new_season_dir(season, &log)?
        };

        let Some(season_dir) = season_dir else {
            log.info("Season directory skipped");
            return Ok(None);
        };
        self.database.add_season_dir(show_id, season, &season_dir)?;
        Ok(Some(season_dir))
    }

    /// Suggest `Season <N>`. 'b' places files in the show directory.
    fn create_new_season_dir(&mut self, season: u32, log: &Logger) -> Result<Option<String>> {
        let suggested = format!("Season {season}");
        log.info(&format!("Generated directory name: '{suggested}'"));
        let response = self.input.ask(
            log,
            "Enter 'y' to accept this directory, 'b' to use base show directory, \
             'x' to skip this file or enter a new directory name to use: ",
            "y",
        )?;
        Ok(match response.to_lowercase().as_str() {
            "b" => Some(String::new()),
            "y" => Some(suggested),
            "x" => None,
            _ => Some(response),
        })
    }
}

/// Check if a directory name looks like the directory for the given season:
/// it contains "Season" and exactly one distinct number, which equals the season.
#[must_use]
pub fn is_season_dir(name: &str, season: u32) -> bool {
    if !name.contains("Season") {
        return false;
    }
    let numbers: HashSet<u32> = RE_NUMBER
        .find_iter(name)
        .filter_map(|number| number.as_str().parse::<u32>().ok())
        .collect();
    numbers.len() == 1 && numbers.contains(&season)
}

/// Normalized file name `<show>.S<ss>E<ee>[_<nn>...].<title><ext>`.
///
/// Returns `None` when the episode title is unknown.
#[must_use]
pub fn compose_file_name(record: &EpisodeRecord, extension: &str) -> Option<String> {
    let title = record.title.as_deref()?;
    let mut episode = format!("S{:02}E{:02}", record.season, record.episode);
    for part in &record.multi_part_episodes {
        episode.push_str(&format!("_{part:02}"));
    }
    let name = format!("{}.{episode}.{title}{extension}", record.show.name);
    Some(crate::strip_special_characters(&name, false))
}

#[cfg(test)]
mod library_tests {
    use super::*;

    use std::fs;

    use tempfile::tempdir;

    fn record(title: Option<&str>, multi_part_episodes: Vec<u32>) -> EpisodeRecord {
        EpisodeRecord {
            show: ShowIdentity {
                id: 1,
                name: "The Office (US)".to_string(),
            },
            season: 2,
            episode: 1,
            multi_part_episodes,
            title: title.map(ToString::to_string),
        }
    }

    #[test]
    fn file_name_format() {
        assert_eq!(
            compose_file_name(&record(Some("The Dundies"), vec![]), ".avi").as_deref(),
            Some("The Office (US).S02E01.The Dundies.avi")
        );
        assert_eq!(
            compose_file_name(&record(Some("Pilot"), vec![2, 3]), ".mkv").as_deref(),
            Some("The Office (US).S02E01_02_03.Pilot.mkv")
        );
    }

    #[test]
    fn file_name_strips_special_characters() {
        assert_eq!(
            compose_file_name(&record(Some("Who's There?  Me & You"), vec![]), ".mp4").as_deref(),
            Some("The Office (US).S02E01.Who's There Me and You.mp4")
        );
    }

    #[test]
    fn file_name_requires_title() {
        assert_eq!(compose_file_name(&record(None, vec![]), ".avi"), None);
    }

    #[test]
    fn season_dir_detection() {
        assert!(is_season_dir("Season 2", 2));
        assert!(is_season_dir("Season 02", 2));
        assert!(is_season_dir("The Office - Season 2", 2));
        assert!(!is_season_dir("Season 3", 2));
        assert!(!is_season_dir("Season 2 (2006)", 2));
        assert!(!is_season_dir("season 2", 2));
        assert!(!is_season_dir("Extras", 2));
    }

    #[test]
    fn automated_placement_synthesizes_season() {
        let library = tempdir().unwrap();
        fs::create_dir(library.path().join("The Office (US)")).unwrap();
        fs::create_dir(library.path().join("Lost")).unwrap();

        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("The Office (US)").unwrap();
        let mut input = UserInput::automated();

        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 2, &Logger::default())
            .unwrap()
            .unwrap();

        assert_eq!(placement.show_dir, "The Office (US)");
        assert_eq!(placement.season_dir.as_deref(), Some("Season 2"));
        assert_eq!(
            placement.directory(library.path()),
            library.path().join("The Office (US)").join("Season 2")
        );
        assert_eq!(database.show_dir(show.id).unwrap().as_deref(), Some("The Office (US)"));
        assert_eq!(database.season_dir(show.id, 2).unwrap().as_deref(), Some("Season 2"));
    }

    #[test]
    fn automated_placement_uses_existing_season_dir() {
        let library = tempdir().unwrap();
        fs::create_dir_all(library.path().join("Lost").join("Season 04")).unwrap();
        fs::create_dir_all(library.path().join("Lost").join("Season 05")).unwrap();

        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Lost").unwrap();
        let mut input = UserInput::automated();

        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 4, &Logger::default())
            .unwrap()
            .unwrap();
        assert_eq!(placement.season_dir.as_deref(), Some("Season 04"));
    }

    #[test]
    fn database_bindings_skip_prompts() {
        let library = tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Lost").unwrap();
        database.set_show_dir(show.id, "LOST").unwrap();
        database.add_season_dir(show.id, 1, "S1").unwrap();

        let mut input = UserInput::scripted(Vec::<String>::new());
        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 1, &Logger::default())
            .unwrap();
        assert_eq!(
            placement,
            Some(LibraryPlacement {
                show_dir: "LOST".to_string(),
                season_dir: Some("S1".to_string()),
            })
        );
    }

    #[test]
    fn base_dir_answer_stores_empty_season_dir() {
        let library = tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Sherlock").unwrap();

        // Empty library: create show dir with the suggested name, then use the base directory.
        let mut input = UserInput::scripted(["y", "b"]);
        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 1, &Logger::default())
            .unwrap()
            .unwrap();

        assert_eq!(placement.show_dir, "Sherlock");
        assert_eq!(placement.season_dir, None);
        assert_eq!(database.season_dir(show.id, 1).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn custom_directory_names() {
        let library = tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Sherlock").unwrap();

        let mut input = UserInput::scripted(["Sherlock (2010)", "Series One"]);
        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 1, &Logger::default())
            .unwrap()
            .unwrap();

        assert_eq!(placement.show_dir, "Sherlock (2010)");
        assert_eq!(placement.season_dir.as_deref(), Some("Series One"));
    }

    #[test]
    fn list_then_look_up_season_dir() {
        let library = tempdir().unwrap();
        fs::create_dir_all(library.path().join("Lost").join("S2")).unwrap();
        fs::create_dir_all(library.path().join("Lost").join("Extras")).unwrap();

        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Lost").unwrap();
        database.set_show_dir(show.id, "Lost").unwrap();

        let mut input = UserInput::scripted(["ls", "s2", "y"]);
        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 2, &Logger::default())
            .unwrap()
            .unwrap();
        assert_eq!(placement.season_dir.as_deref(), Some("S2"));
    }

    #[test]
    fn skipping_show_dir_persists_nothing() {
        let library = tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        let show = database.add_show("Sherlock").unwrap();

        let mut input = UserInput::scripted(["x"]);
        let placement = LibraryResolver::new(&database, &mut input, library.path())
            .resolve(&show, 1, &Logger::default())
            .unwrap();

        assert_eq!(placement, None);
        assert_eq!(database.show_dir(show.id).unwrap(), None);
    }
}
