use std::iter;

use anyhow::Result;
use itertools::Itertools;

use tv_sort::config::{DEFAULT_ARCHIVE_DIR, DEFAULT_FORMATS, RenameConfig, TvSortConfig};
use tv_sort::database::Database;

use crate::Args;

/// Final config combined from CLI arguments and user config file.
#[derive(Debug)]
pub struct CliConfig {
    pub(crate) rename: RenameConfig,
    pub(crate) print_db: bool,
    pub(crate) reset_db: bool,
}

impl CliConfig {
    /// Create config from given command line args and user config file.
    ///
    /// # Errors
    /// Returns an error if the user config is invalid or a configured directory does not exist.
    pub fn from_args(args: Args) -> Result<Self> {
        let user_config = TvSortConfig::get_user_config()?;
        Self::from_parts(args, user_config)
    }

    fn from_parts(args: Args, user_config: TvSortConfig) -> Result<Self> {
        let source = tv_sort::resolve_input_path(args.path.as_deref().or(user_config.source_dir.as_deref()))?;
        let in_place = args.in_place || user_config.in_place;

        let library_dir = args.library.or(user_config.library_dir);
        if !in_place
            && !args.print_db
            && !args.reset_db
            && let Some(dir) = &library_dir
            && !dir.is_dir()
        {
            anyhow::bail!("TV library directory does not exist: {}", dir.display());
        }

        let archive_dir = user_config
            .archive_dir
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_DIR.to_string());

        let formats: Vec<String> = user_config.supported_formats.into_iter().chain(args.format).collect();
        let supported_formats = if formats.is_empty() {
            tv_sort::config::normalize_formats(DEFAULT_FORMATS)
        } else {
            tv_sort::config::normalize_formats(formats)
        };

        let ignored_dirs: Vec<String> = user_config
            .ignored_dirs
            .into_iter()
            .chain(args.ignore)
            .chain(iter::once(archive_dir.clone()))
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty())
            .unique()
            .collect();

        let database = args
            .database
            .or(user_config.database)
            .unwrap_or_else(Database::database_path);
        let cache_dir = match user_config.cache_dir {
            Some(dir) => dir,
            None => tv_sort::config::default_cache_dir()?,
        };

        Ok(Self {
            rename: RenameConfig {
                source,
                library_dir,
                supported_formats,
                ignored_dirs,
                archive_dir,
                copy: args.copy || user_config.copy,
                in_place,
                no_input: args.no_input || user_config.no_input,
                dryrun: args.print || user_config.dryrun,
                verbose: args.verbose || user_config.verbose,
                debug: args.debug || user_config.debug,
                database,
                cache_dir,
            },
            print_db: args.print_db,
            reset_db: args.reset_db,
        })
    }
}
