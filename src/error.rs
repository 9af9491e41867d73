//! Error types that need to be told apart from ordinary `anyhow` failures.

use thiserror::Error;

/// Conditions that abort the whole run instead of skipping a single file.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The user answered `exit` to a prompt.
    #[error("Program terminated by user 'exit'")]
    UserExit,

    /// A persisted binding disagrees with a freshly resolved value.
    #[error("Database conflict in {table} for {key}: stored '{existing}', new '{new}'")]
    CacheConflict {
        table: &'static str,
        key: String,
        existing: String,
        new: String,
    },

    /// The database contents are inconsistent with each other.
    #[error("Database corrupted: {0}")]
    CacheCorruption(String),
}

/// Reasons a file name could not be classified as a TV episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing episode")]
    MissingEpisode,
    #[error("missing season")]
    MissingSeason,
    #[error("multiple different episodes")]
    MultipleEpisodes,
    #[error("missing show name")]
    MissingShowName,
}

impl FatalError {
    /// Check if the given error chain contains a fatal error.
    #[must_use]
    pub fn is_fatal(error: &anyhow::Error) -> bool {
        error.downcast_ref::<Self>().is_some()
    }

    /// Check if the given error chain is a user requested exit.
    #[must_use]
    pub fn is_user_exit(error: &anyhow::Error) -> bool {
        matches!(error.downcast_ref::<Self>(), Some(Self::UserExit))
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn fatal_error_survives_context() {
        let error = anyhow::Error::new(FatalError::UserExit).context("while resolving show");
        assert!(FatalError::is_fatal(&error));
        assert!(FatalError::is_user_exit(&error));
    }

    #[test]
    fn ordinary_error_is_not_fatal() {
        let error = anyhow::anyhow!("connection refused");
        assert!(!FatalError::is_fatal(&error));
        assert!(!FatalError::is_user_exit(&error));
    }

    #[test]
    fn conflict_message_names_both_values() {
        let error = FatalError::CacheConflict {
            table: "season_dir",
            key: "show 3 season 5".to_string(),
            existing: "Season 5".to_string(),
            new: "Season Five".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("Season 5"));
        assert!(message.contains("Season Five"));
    }

    #[test]
    fn parse_error_reason_tags() {
        assert_eq!(ParseError::MissingShowName.to_string(), "missing show name");
        assert_eq!(ParseError::MissingEpisode.to_string(), "missing episode");
    }
}
