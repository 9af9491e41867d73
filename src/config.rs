use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{fmt, fs};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// Video file extensions processed when none are configured.
pub const DEFAULT_FORMATS: [&str; 7] = ["mkv", "mp4", "avi", "m4v", "mov", "wmv", "mpg"];

/// Directory name for originals after a cross-filesystem copy.
pub const DEFAULT_ARCHIVE_DIR: &str = "PROCESSED";

/// Path to the user config file: `$HOME/.config/tv-sort.toml`
///
/// Returns `None` if the home directory cannot be determined.
pub static CONFIG_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    let home_dir = dirs::home_dir()?;
    Some(home_dir.join(".config").join(format!("{PROJECT_NAME}.toml")))
});

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct TvSortConfig {
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub library_dir: Option<PathBuf>,
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub ignored_dirs: Vec<String>,
    #[serde(default)]
    pub archive_dir: Option<String>,
    #[serde(default)]
    pub copy: bool,
    #[serde(default)]
    pub in_place: bool,
    #[serde(default)]
    pub no_input: bool,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Wrapper needed for parsing the config section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    tvsort: TvSortConfig,
}

/// Final config created from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct RenameConfig {
    /// Directory or single file to process.
    pub source: PathBuf,
    /// Root of the TV library. Not needed for in-place renaming.
    pub library_dir: Option<PathBuf>,
    /// Lowercase extensions without the leading dot.
    pub supported_formats: Vec<String>,
    /// Directory names skipped when scanning. Always contains the archive directory.
    pub ignored_dirs: Vec<String>,
    pub archive_dir: String,
    pub copy: bool,
    pub in_place: bool,
    pub no_input: bool,
    pub dryrun: bool,
    pub verbose: bool,
    pub debug: bool,
    pub database: PathBuf,
    pub cache_dir: PathBuf,
}

impl TvSortConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub fn get_user_config() -> Result<Self> {
        let Some(path) = CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };
        Self::from_file(path)
    }

    /// Read config from the given file. A missing file gives the default config.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.tvsort)
            .with_context(|| "Failed to parse config TOML")
    }
}

impl RenameConfig {
    /// Config with default values for everything except the directories.
    ///
    /// # Errors
    /// Returns an error if the default database or cache location cannot be determined.
    pub fn new(source: PathBuf, library_dir: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            source,
            library_dir,
            supported_formats: normalize_formats(DEFAULT_FORMATS),
            ignored_dirs: vec![DEFAULT_ARCHIVE_DIR.to_string()],
            archive_dir: DEFAULT_ARCHIVE_DIR.to_string(),
            copy: false,
            in_place: false,
            no_input: false,
            dryrun: false,
            verbose: false,
            debug: false,
            database: crate::database::Database::database_path(),
            cache_dir: default_cache_dir()?,
        })
    }
}

/// Lowercase file extensions without a leading dot, de-duplicated.
pub fn normalize_formats<I, S>(formats: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    formats
        .into_iter()
        .map(|format| format.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|format| !format.is_empty())
        .unique()
        .collect()
}

/// Directory for downloaded catalog listings.
///
/// # Errors
/// Returns an error if the platform cache directory cannot be determined.
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(PROJECT_NAME))
        .context("Failed to determine cache directory")
}

impl fmt::Display for RenameConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let library = self
            .library_dir
            .as_ref()
            .map_or_else(|| "none".to_string(), |dir| dir.display().to_string());
        writeln!(f, "Config:")?;
        writeln!(f, "  source:     {}", self.source.display())?;
        writeln!(f, "  library:    {library}")?;
        writeln!(f, "  formats:    [{}]", self.supported_formats.join(", "))?;
        writeln!(f, "  ignored:    [{}]", self.ignored_dirs.join(", "))?;
        writeln!(f, "  archive:    {}", self.archive_dir)?;
        writeln!(f, "  database:   {}", self.database.display())?;
        writeln!(f, "  cache:      {}", self.cache_dir.display())?;
        writeln!(f, "  copy:       {}", crate::colorize_bool(self.copy))?;
        writeln!(f, "  in place:   {}", crate::colorize_bool(self.in_place))?;
        writeln!(f, "  no input:   {}", crate::colorize_bool(self.no_input))?;
        writeln!(f, "  dryrun:     {}", crate::colorize_bool(self.dryrun))?;
        writeln!(f, "  debug:      {}", crate::colorize_bool(self.debug))?;
        write!(f, "  verbose:    {}", crate::colorize_bool(self.verbose))
    }
}
