use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ParseError;

/// Show, season and episode information extracted from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileClassification {
    /// Original file path.
    pub source_path: PathBuf,
    /// Show name from the file, lowercase with separators and special characters removed.
    pub show_token: String,
    pub season: u32,
    /// Lowest episode number found in the file name.
    pub episode: u32,
    /// Additional episodes directly following `episode` in the same file.
    pub multi_part_episodes: Vec<u32>,
}

/// Canonical show identity stored in the TV library table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShowIdentity {
    pub id: i64,
    pub name: String,
}

/// Catalog information for one episode of a resolved show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub show: ShowIdentity,
    pub season: u32,
    pub episode: u32,
    pub multi_part_episodes: Vec<u32>,
    pub title: Option<String>,
}

/// Resolved directories for a show season inside the library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPlacement {
    pub show_dir: String,
    /// `None` places files directly in the show directory.
    pub season_dir: Option<String>,
}

/// Result of moving a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Moved to the target path.
    Moved(PathBuf),
    /// Renamed next to the source because the target is on another filesystem.
    RenamedInPlace(PathBuf),
    Skipped,
    Failed(String),
}

/// Why a file was left where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Incompatible(ParseError),
    ShowNotResolved,
    MissingEpisodeTitle,
    PlacementNotResolved,
    NoRenameRequired,
    TargetExists,
    DryRun,
    Failed(String),
}

impl FileClassification {
    /// Zero-padded season number.
    #[must_use]
    pub fn season_string(&self) -> String {
        format!("{:02}", self.season)
    }

    /// Zero-padded primary episode number.
    #[must_use]
    pub fn episode_string(&self) -> String {
        format!("{:02}", self.episode)
    }

    /// Zero-padded multi-part episode numbers.
    #[must_use]
    pub fn multi_part_strings(&self) -> Vec<String> {
        self.multi_part_episodes.iter().map(|n| format!("{n:02}")).collect()
    }

    /// File extension including the leading dot, or an empty string.
    #[must_use]
    pub fn extension(&self) -> String {
        crate::episode_file_extension(&self.source_path)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default()
    }
}

impl EpisodeRecord {
    #[must_use]
    pub fn new(show: ShowIdentity, file: &FileClassification, title: Option<String>) -> Self {
        Self {
            show,
            season: file.season,
            episode: file.episode,
            multi_part_episodes: file.multi_part_episodes.clone(),
            title,
        }
    }
}

impl LibraryPlacement {
    /// Join the placement directories under the given library root.
    #[must_use]
    pub fn directory(&self, library_dir: &Path) -> PathBuf {
        let show_path = library_dir.join(&self.show_dir);
        match &self.season_dir {
            Some(season_dir) => show_path.join(season_dir),
            None => show_path,
        }
    }
}

impl fmt::Display for ShowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)
    }
}

impl fmt::Display for FileClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} S{}E{}",
            self.show_token,
            self.season_string(),
            self.episode_string()
        )?;
        for part in self.multi_part_strings() {
            write!(f, "_{part}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incompatible(error) => write!(f, "{error}"),
            Self::ShowNotResolved => write!(f, "show not resolved"),
            Self::MissingEpisodeTitle => write!(f, "missing episode name"),
            Self::PlacementNotResolved => write!(f, "failed to create new file path"),
            Self::NoRenameRequired => write!(f, "no rename required"),
            Self::TargetExists => write!(f, "target already exists"),
            Self::DryRun => write!(f, "dry run"),
            Self::Failed(error) => write!(f, "{error}"),
        }
    }
}
