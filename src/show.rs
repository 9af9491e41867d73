//! Resolve a raw show token from a file name to a canonical show.
//!
//! The lookup goes database, catalog, user confirmation. A string typed by the
//! user starts a new lookup round, but the binding is always written for the
//! original token so the next file with the same token resolves from the database.

use anyhow::Result;

use crate::catalog::Catalog;
use crate::console::{Logger, SelectOptions, Selection, UserInput};
use crate::database::Database;
use crate::error::FatalError;
use crate::fuzzy;
use crate::types::ShowIdentity;

/// Show lookup state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LookupState {
    /// Looking up this search string.
    AwaitingCandidate(String),
    /// A catalog title was picked.
    Accepted(String),
    Abandoned,
}

pub struct ShowResolver<'a> {
    database: &'a Database,
    catalog: &'a mut dyn Catalog,
    input: &'a mut UserInput,
}

impl<'a> ShowResolver<'a> {
    pub fn new(database: &'a Database, catalog: &'a mut dyn Catalog, input: &'a mut UserInput) -> Self {
        Self {
            database,
            catalog,
            input,
        }
    }

    /// Resolve the raw show token to a show in the TV library.
    ///
    /// Returns `None` if the user or the automatic selection skips the show.
    ///
    /// # Errors
    /// Catalog and database errors, and [`FatalError`] for conflicts or user exit.
    pub fn resolve(&mut self, raw_token: &str, log: &Logger) -> Result<Option<ShowIdentity>> {
        log.info(&format!("Looking up show for: {raw_token}"));
        let log = log.nested();

        let mut state = LookupState::AwaitingCandidate(raw_token.to_string());
        loop {
            state = match state {
                LookupState::AwaitingCandidate(search) => {
                    if let Some(show) = self.cached_show(&search)? {
                        log.info(&format!("Match found in database: {show}"));
                        if search != raw_token {
                            self.database.add_file_name(raw_token, show.id)?;
                        }
                        return Ok(Some(show));
                    }
                    log.verbose(&format!("No database match for '{search}'"));
                    let candidates = self.catalog.find_show_candidates(&search, &log)?;
                    match self.input.select(&log, &candidates, &SelectOptions::default())? {
                        Selection::Accepted(title) => LookupState::Accepted(title),
                        Selection::Lookup(text) => LookupState::AwaitingCandidate(text),
                        Selection::Abandoned => LookupState::Abandoned,
                    }
                }
                LookupState::Accepted(title) => {
                    let Some(show) = self.bind_library_show(&title, &log)? else {
                        return Ok(None);
                    };
                    self.database.add_file_name(raw_token, show.id)?;
                    log.info(&format!("Resolved show: {show}"));
                    return Ok(Some(show));
                }
                LookupState::Abandoned => {
                    log.info("Show skipped");
                    return Ok(None);
                }
            };
        }
    }

    fn cached_show(&self, search: &str) -> Result<Option<ShowIdentity>> {
        let Some(show_id) = self.database.search_file_name(search)? else {
            return Ok(None);
        };
        match self.database.show_by_id(show_id)? {
            Some(show) => Ok(Some(show)),
            None => Err(FatalError::CacheCorruption(format!(
                "file name '{search}' points to missing show id {show_id}"
            ))
            .into()),
        }
    }

    /// Find the catalog title in the TV library, or register it as a new show.
    ///
    /// If the user says it is not a new show, pick one of the existing shows instead.
    fn bind_library_show(&mut self, title: &str, log: &Logger) -> Result<Option<ShowIdentity>> {
        if let Some(show) = self.database.show_by_name(title)? {
            return Ok(Some(show));
        }

        log.info(&format!("No show named '{title}' in TV library database"));
        let known: Vec<String> = self.database.all_shows()?.into_iter().map(|show| show.name).collect();

        let mut answer = self.input.choose(
            log,
            "Is this a new show? Enter 'y' (yes), 'n' (no) or 'ls' (list existing shows): ",
            &["y", "n", "ls"],
            "y",
        )?;
        if answer == "ls" {
            if known.is_empty() {
                log.info("TV library is empty");
                answer = "y".to_string();
            } else {
                log.info(&format!("Existing shows in database: {}", known.join(", ")));
                answer = self.input.choose(log, "Is this a new show? [y/n]: ", &["y", "n"], "y")?;
            }
        }

        if answer == "y" {
            let show = self.database.add_show(title)?;
            log.info(&format!("Added new show: {show}"));
            return Ok(Some(show));
        }

        if known.is_empty() {
            log.info("No existing show to match, TV library is empty");
            return Ok(None);
        }

        let mut search = title.to_string();
        loop {
            let matches = fuzzy::best_matches(&search, &known);
            match self.input.select(log, &matches, &SelectOptions::default())? {
                Selection::Accepted(name) => return self.database.show_by_name(&name),
                Selection::Lookup(text) => search = text,
                Selection::Abandoned => {
                    log.info("Could not match to an existing show");
                    return Ok(None);
                }
            }
        }
    }
}
