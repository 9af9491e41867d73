//! File processing pipeline.
//!
//! Files are handled one at a time: parse the name, resolve the show,
//! look up the episode title, resolve the library placement and move the file.
//! Only [`FatalError`] stops the run; everything else is recorded per file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use walkdir::WalkDir;

use crate::catalog::{Catalog, EpGuides};
use crate::config::RenameConfig;
use crate::console::{Logger, UserInput};
use crate::database::Database;
use crate::error::FatalError;
use crate::library::{self, LibraryResolver};
use crate::parse;
use crate::show::ShowResolver;
use crate::transfer::FileTransfer;
use crate::types::{EpisodeRecord, ShowIdentity, SkipReason, TransferOutcome};

/// Outcome for one processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Moved(PathBuf),
    /// Renamed in the source directory instead of moving to the library.
    RenamedInPlace(PathBuf),
    Skipped(SkipReason),
}

/// Processed files grouped by outcome.
#[derive(Debug, Default)]
pub struct RunSummary {
    moved: Vec<(PathBuf, PathBuf)>,
    renamed_in_place: Vec<(PathBuf, PathBuf)>,
    skipped: Vec<(PathBuf, SkipReason)>,
}

/// Sorts TV episode files into the library.
pub struct TvSort {
    config: RenameConfig,
    database: Database,
    catalog: Box<dyn Catalog>,
    input: UserInput,
    transfer: FileTransfer,
    log: Logger,
    /// Show resolution results by raw show token for this run.
    shows: HashMap<String, Option<ShowIdentity>>,
}

impl TvSort {
    /// Open the database and catalog configured in `config`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the HTTP client cannot be created.
    pub fn new(config: RenameConfig) -> Result<Self> {
        let database = Database::open(&config.database)?;
        let catalog = EpGuides::new(config.cache_dir.clone())?;
        let input = if config.no_input {
            UserInput::automated()
        } else {
            UserInput::interactive()
        };
        Ok(Self::with_parts(config, database, Box::new(catalog), input))
    }

    #[must_use]
    pub fn with_parts(config: RenameConfig, database: Database, catalog: Box<dyn Catalog>, input: UserInput) -> Self {
        let transfer = FileTransfer::new(config.copy, config.archive_dir.clone());
        let log = Logger::new(config.verbose);
        Self {
            config,
            database,
            catalog,
            input,
            transfer,
            log,
            shows: HashMap::new(),
        }
    }

    /// Process all supported files under the source path.
    ///
    /// # Errors
    /// Returns an error if the source cannot be scanned, and [`FatalError`]
    /// for database conflicts or user exit.
    pub fn run(&mut self) -> Result<RunSummary> {
        if !self.config.in_place && self.config.library_dir.is_none() {
            anyhow::bail!("TV library directory not set, use --library or set library_dir in config");
        }

        let source = self.config.source.clone();
        let files = collect_supported_files(&source, &self.config.supported_formats, &self.config.ignored_dirs)?;
        let root = if source.is_file() {
            source.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            source.clone()
        };

        if files.is_empty() {
            self.log.info(&format!("No supported files found in {}", source.display()));
        }

        let mut summary = RunSummary::default();
        let total = files.len();
        for (index, path) in files.into_iter().enumerate() {
            self.log.separator();
            self.log.info(&format!(
                "[{}/{total}] {}",
                index + 1,
                crate::get_relative_path_or_filename(&path, &root).bold()
            ));
            let status = match self.process_file(&path, &root) {
                Ok(status) => status,
                Err(error) if FatalError::is_fatal(&error) => return Err(error),
                Err(error) => {
                    self.log.nested().error(&format!("{error:#}"));
                    FileStatus::Skipped(SkipReason::Failed(format!("{error:#}")))
                }
            };
            summary.add(path, status);
        }

        Ok(summary)
    }

    fn process_file(&mut self, path: &Path, root: &Path) -> Result<FileStatus> {
        let log = self.log.nested();

        let file = match parse::parse_file_name(path) {
            Ok(file) => file,
            Err(reason) => {
                log.info(&format!("Incompatible file name: {reason}"));
                return Ok(FileStatus::Skipped(SkipReason::Incompatible(reason)));
            }
        };
        log.verbose(&format!("Parsed: {file}"));

        let Some(show) = self.resolve_show(&file.show_token, &log)? else {
            return Ok(FileStatus::Skipped(SkipReason::ShowNotResolved));
        };

        let title = self
            .catalog
            .find_episode_title(&show.name, file.season, file.episode, &log)?;
        let record = EpisodeRecord::new(show, &file, title);
        let Some(file_name) = library::compose_file_name(&record, &file.extension()) else {
            log.warning(&format!(
                "Episode title not found: {} S{}E{}",
                record.show.name,
                file.season_string(),
                file.episode_string()
            ));
            return Ok(FileStatus::Skipped(SkipReason::MissingEpisodeTitle));
        };

        let target_dir = if self.config.in_place {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            let library_dir = self
                .config
                .library_dir
                .as_deref()
                .context("TV library directory not set")?;
            match LibraryResolver::new(&self.database, &mut self.input, library_dir).resolve(
                &record.show,
                record.season,
                &log,
            )? {
                Some(placement) => placement.directory(library_dir),
                None => return Ok(FileStatus::Skipped(SkipReason::PlacementNotResolved)),
            }
        };
        let target = target_dir.join(&file_name);

        if target == path {
            log.info("No rename required");
            return Ok(FileStatus::Skipped(SkipReason::NoRenameRequired));
        }
        if target.exists() {
            log.warning(&format!("Target already exists: {}", target.display()));
            return Ok(FileStatus::Skipped(SkipReason::TargetExists));
        }

        if self.config.dryrun {
            log.info(&"Dry run, file would be moved:".bold().to_string());
            crate::show_diff(&crate::path_to_string(path), &crate::path_to_string(&target));
            return Ok(FileStatus::Skipped(SkipReason::DryRun));
        }

        match self.transfer.transfer(path, &target, &log) {
            TransferOutcome::Moved(destination) => {
                log.info(&format!("Moved to: {}", destination.display()));
                if let Some(parent) = path.parent()
                    && let Err(error) = crate::remove_empty_parents(parent, root)
                {
                    log.warning(&format!("{error:#}"));
                }
                Ok(FileStatus::Moved(destination))
            }
            TransferOutcome::RenamedInPlace(destination) => {
                log.warning(&format!(
                    "Not moved to library, use --copy to copy across filesystems: {}",
                    destination.display()
                ));
                Ok(FileStatus::RenamedInPlace(destination))
            }
            TransferOutcome::Skipped => Ok(FileStatus::Skipped(SkipReason::TargetExists)),
            TransferOutcome::Failed(error) => Ok(FileStatus::Skipped(SkipReason::Failed(error))),
        }
    }

    /// Resolve each raw show token once per run, including skipped shows.
    fn resolve_show(&mut self, show_token: &str, log: &Logger) -> Result<Option<ShowIdentity>> {
        if let Some(show) = self.shows.get(show_token) {
            match show {
                Some(show) => log.verbose(&format!("Show already resolved: {show}")),
                None => log.info("Show was skipped earlier in this run"),
            }
            return Ok(show.clone());
        }
        let show = ShowResolver::new(&self.database, self.catalog.as_mut(), &mut self.input).resolve(show_token, log)?;
        self.shows.insert(show_token.to_string(), show.clone());
        Ok(show)
    }
}

/// Collect files with a supported extension, recursively and sorted.
///
/// Hidden entries and directories in `ignored_dirs` are skipped.
/// A file path is returned as is.
///
/// # Errors
/// Returns an error if the root does not exist.
pub fn collect_supported_files(root: &Path, formats: &[String], ignored_dirs: &[String]) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        anyhow::bail!("Source directory does not exist: {}", root.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(crate::is_hidden(entry)
                    || entry.file_type().is_dir()
                        && ignored_dirs.contains(&crate::os_str_to_string(entry.file_name())))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| formats.contains(&crate::path_to_file_extension_string(entry.path())))
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    Ok(files)
}

impl RunSummary {
    pub fn add(&mut self, path: PathBuf, status: FileStatus) {
        match status {
            FileStatus::Moved(target) => self.moved.push((path, target)),
            FileStatus::RenamedInPlace(target) => self.renamed_in_place.push((path, target)),
            FileStatus::Skipped(reason) => self.skipped.push((path, reason)),
        }
    }

    /// Moved files as (source, target) pairs.
    #[must_use]
    pub fn moved(&self) -> &[(PathBuf, PathBuf)] {
        &self.moved
    }

    /// Files renamed next to the source instead of moving to another filesystem, as (source, new path) pairs.
    #[must_use]
    pub fn renamed_in_place(&self) -> &[(PathBuf, PathBuf)] {
        &self.renamed_in_place
    }

    /// Files left in place with the reason, excluding incompatible file names and failures.
    #[must_use]
    pub fn skipped(&self) -> Vec<(&Path, &SkipReason)> {
        self.filter_skipped(|reason| !matches!(reason, SkipReason::Incompatible(_) | SkipReason::Failed(_)))
    }

    #[must_use]
    pub fn incompatible(&self) -> Vec<(&Path, &SkipReason)> {
        self.filter_skipped(|reason| matches!(reason, SkipReason::Incompatible(_)))
    }

    #[must_use]
    pub fn failed(&self) -> Vec<(&Path, &SkipReason)> {
        self.filter_skipped(|reason| matches!(reason, SkipReason::Failed(_)))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.moved.len() + self.renamed_in_place.len() + self.skipped.len()
    }

    /// Print files grouped by outcome and reason.
    pub fn print(&self) {
        println!("\n{}", format!("Processed {} files", self.total()).bold());

        if !self.moved.is_empty() {
            println!("{}", format!("Moved ({}):", self.moved.len()).green().bold());
            for (source, target) in &self.moved {
                println!("  {}", crate::path_to_filename_string(source));
                println!("  {} {}", "->".green(), target.display());
            }
        }

        if !self.renamed_in_place.is_empty() {
            println!(
                "{}",
                format!("Renamed in place, not moved to library ({}):", self.renamed_in_place.len())
                    .yellow()
                    .bold()
            );
            for (source, target) in &self.renamed_in_place {
                println!("  {}", crate::path_to_filename_string(source));
                println!("  {} {}", "->".yellow(), target.display());
            }
        }

        Self::print_group("Skipped", &self.skipped(), |text| text.yellow());
        Self::print_group("Incompatible", &self.incompatible(), |text| text.yellow());
        Self::print_group("Failed", &self.failed(), |text| text.red());
    }

    fn print_group(title: &str, files: &[(&Path, &SkipReason)], color: fn(&str) -> colored::ColoredString) {
        if files.is_empty() {
            return;
        }
        println!("{}", color(&format!("{title} ({}):", files.len())).bold());
        let mut by_reason: BTreeMap<String, Vec<&Path>> = BTreeMap::new();
        for (path, reason) in files {
            by_reason.entry(reason.to_string()).or_default().push(path);
        }
        for (reason, paths) in by_reason {
            println!("  {}", color(&reason));
            for path in paths {
                println!("    {}", crate::path_to_filename_string(path));
            }
        }
    }

    fn filter_skipped(&self, predicate: impl Fn(&SkipReason) -> bool) -> Vec<(&Path, &SkipReason)> {
        self.skipped
            .iter()
            .filter(|(_, reason)| predicate(reason))
            .map(|(path, reason)| (path.as_path(), reason))
            .collect()
    }
}
