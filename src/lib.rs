pub mod catalog;
pub mod config;
pub mod console;
pub mod database;
pub mod error;
pub mod fuzzy;
pub mod library;
pub mod parse;
pub mod renamer;
pub mod show;
pub mod transfer;
pub mod types;

use std::cmp::Ordering;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use clap::Command;
use clap_complete::Shell;
use colored::{ColoredString, Colorize};
use difference::{Changeset, Difference};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

static RE_SPECIAL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[@#$%^&*{};:,/<>?\\|`~=+±§£]")
        .expect("Failed to create regex pattern for special characters")
});

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Failed to create regex pattern for whitespace"));

static RE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._-]").expect("Failed to create regex pattern for separators"));

/// Format bool value as a coloured string.
#[must_use]
pub fn colorize_bool(value: bool) -> ColoredString {
    if value { "true".green() } else { "false".red() }
}

/// Remove characters that are not wanted in file and directory names.
///
/// `&` is spelled out as "and" and repeated whitespace is collapsed.
/// With `strip_all`, whitespace and `.`, `_`, `-` separators are removed as well,
/// which gives a lookup key that ignores formatting differences.
///
/// ```rust
/// use tv_sort::strip_special_characters;
///
/// assert_eq!(strip_special_characters("Law & Order: SVU ", false), "Law and Order SVU");
/// assert_eq!(strip_special_characters("Law & Order: S.V.U.", true), "LawandOrderSVU");
/// ```
#[must_use]
pub fn strip_special_characters(name: &str, strip_all: bool) -> String {
    let name = name.trim().replace('&', "and");
    let name = RE_SPECIAL_CHARACTERS.replace_all(&name, "");
    let name = RE_WHITESPACE.replace_all(&name, " ");
    if strip_all {
        RE_SEPARATORS.replace_all(&name, "").into_owned()
    } else {
        name.trim().to_string()
    }
}

/// Get filename from Path with special characters retained instead of decomposed.
///
/// A trailing episode marker is kept in the name, see [`episode_file_extension`].
pub fn get_normalized_file_name_and_extension(path: &Path) -> Result<(String, String)> {
    let (file_stem, file_extension) = match episode_file_extension(path) {
        Some(extension) => (os_str_to_string(path.file_stem().context("Failed to get file stem")?), extension),
        None => (os_str_to_string(path.file_name().context("Failed to get file name")?), String::new()),
    };

    // Paths from macOS filesystems can be in NFD form,
    // where "å" is stored as "a\u{30a}" and would not match the NFC text from the catalog.
    Ok((
        file_stem.nfc().collect::<String>(),
        file_extension.nfc().collect::<String>(),
    ))
}

/// File extension of an episode file without the leading dot.
///
/// A trailing part holding the episode marker, as in `Show.S01E01`, belongs to the name and is not an extension.
#[must_use]
pub fn episode_file_extension(path: &Path) -> Option<String> {
    let extension = os_str_to_string(path.extension()?);
    (!parse::contains_episode_marker(&extension)).then_some(extension)
}

/// Get the normalized directory name from a Path with special characters retained.
pub fn get_normalized_dir_name(path: &Path) -> Result<String> {
    let dir_name = os_str_to_string(path.file_name().context("Failed to get directory name")?);

    Ok(dir_name.nfc().collect::<String>())
}

/// List the names of the immediate subdirectories, sorted.
///
/// Hidden directories are skipped.
/// A missing directory gives an empty list.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            let name = get_normalized_dir_name(&path)?;
            if !name.starts_with('.') {
                names.push(name);
            }
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Check if entry is a hidden file or directory (starts with '.')
#[must_use]
pub fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    let name_bytes = entry.file_name().as_encoded_bytes();
    !name_bytes.is_empty() && name_bytes[0] == b'.'
}

/// Check if directory is empty (contains no files or subdirectories)
pub fn is_directory_empty(dir: &Path) -> bool {
    for entry in WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
        if entry.path() != dir {
            return false;
        }
    }
    true
}

/// Remove empty directories from `dir` upwards, stopping at `root`.
///
/// The root directory itself is never removed.
pub fn remove_empty_parents(dir: &Path, root: &Path) -> Result<()> {
    let mut current = dir;
    while current != root && current.starts_with(root) && current.is_dir() && is_directory_empty(current) {
        fs::remove_dir(current).with_context(|| format!("Failed to remove empty directory: {}", current.display()))?;
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(())
}

/// Insert a suffix before the file extension.
///
/// Takes a path and inserts the given suffix string between the file stem and the file extension.
/// If the file has no extension, the suffix is appended to the end.
///
/// ```rust
/// use std::path::Path;
/// use tv_sort::insert_suffix_before_extension;
///
/// let path = Path::new("Show.S01E01.Pilot.mkv");
/// let result = insert_suffix_before_extension(path, "_1");
/// assert_eq!(result.to_str().unwrap(), "Show.S01E01.Pilot_1.mkv");
///
/// let path = Path::new("downloads/Show.S01E01.mkv");
/// let result = insert_suffix_before_extension(path, "_2");
/// assert_eq!(result, Path::new("downloads/Show.S01E01_2.mkv"));
///
/// let path = Path::new("README");
/// let result = insert_suffix_before_extension(path, "_1");
/// assert_eq!(result.to_str().unwrap(), "README_1");
/// ```
#[must_use]
pub fn insert_suffix_before_extension(path: &Path, suffix: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    let new_name = if extension.is_empty() {
        format!("{stem}{suffix}")
    } else {
        format!("{stem}{suffix}.{extension}")
    };

    if parent.as_os_str().is_empty() {
        PathBuf::from(new_name)
    } else {
        parent.join(new_name)
    }
}

/// Resolves the provided input path to a directory or file to an absolute path.
///
/// If `path` is `None`, the current working directory is used.
/// The function verifies that the provided path exists and is accessible,
/// returning an error if it does not.
#[inline]
pub fn resolve_input_path(path: Option<&Path>) -> Result<PathBuf> {
    let input_path = path
        .map(|p| p.to_str().unwrap_or(""))
        .unwrap_or_default()
        .trim()
        .to_string();

    let filepath = if input_path.is_empty() {
        env::current_dir().context("Failed to get current working directory")?
    } else {
        PathBuf::from(input_path)
    };
    if !filepath.exists() {
        anyhow::bail!(
            "Input path does not exist or is not accessible: '{}'",
            filepath.display()
        );
    }

    let absolute_input_path = dunce::canonicalize(&filepath)?;

    // Canonicalize fails for network drives on Windows :(
    if path_to_string(&absolute_input_path).starts_with(r"\\?") && !path_to_string(&filepath).starts_with(r"\\?") {
        Ok(filepath)
    } else {
        Ok(absolute_input_path)
    }
}

/// Gets the relative path or filename from a full path based on a root directory.
///
/// If the full path is within the root directory, the function returns the relative path.
/// Otherwise, it returns just the filename. If the filename cannot be determined, the
/// full path is returned.
///
/// ```rust
/// use std::path::Path;
/// use tv_sort::get_relative_path_or_filename;
///
/// let root = Path::new("/downloads");
/// let full_path = root.join("Show/Show.S01E01.mkv");
/// assert_eq!(get_relative_path_or_filename(&full_path, root), "Show/Show.S01E01.mkv");
///
/// let outside_path = Path::new("/library/Show/Season 1/Show.S01E01.mkv");
/// assert_eq!(get_relative_path_or_filename(outside_path, root), "Show.S01E01.mkv");
/// ```
#[must_use]
pub fn get_relative_path_or_filename(full_path: &Path, root: &Path) -> String {
    if full_path == root {
        return full_path.file_name().unwrap_or_default().to_string_lossy().to_string();
    }
    full_path.strip_prefix(root).map_or_else(
        |_| {
            full_path.file_name().map_or_else(
                || full_path.display().to_string(),
                |name| name.to_string_lossy().to_string(),
            )
        },
        |relative_path| relative_path.display().to_string(),
    )
}

/// Convert `OsStr` to String with invalid Unicode handling.
pub fn os_str_to_string(name: &OsStr) -> String {
    name.to_str().map_or_else(
        || name.to_string_lossy().replace('\u{FFFD}', ""),
        std::string::ToString::to_string,
    )
}

/// Convert given path to string with invalid Unicode handling.
pub fn path_to_string(path: &Path) -> String {
    path.to_str().map_or_else(
        || path.to_string_lossy().to_string().replace('\u{FFFD}', ""),
        std::string::ToString::to_string,
    )
}

/// Convert given path to filename string with invalid Unicode handling.
#[must_use]
pub fn path_to_filename_string(path: &Path) -> String {
    os_str_to_string(path.file_name().unwrap_or_default())
}

/// Convert given path to file extension lowercase string with invalid Unicode handling.
#[must_use]
pub fn path_to_file_extension_string(path: &Path) -> String {
    os_str_to_string(path.extension().unwrap_or_default()).to_lowercase()
}

#[inline]
pub fn print_error(message: &str) {
    eprintln!("{}", format!("Error: {message}").red());
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::print_error(&format!($($arg)*))
    };
}

#[inline]
pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow());
}

#[macro_export]
macro_rules! print_warning {
    ($($arg:tt)*) => {
        $crate::print_warning(&format!($($arg)*))
    };
}

/// Create a coloured diff for the given strings.
pub fn color_diff(old: &str, new: &str, stacked: bool) -> (String, String) {
    let changeset = Changeset::new(old, new, "");
    let mut old_diff = String::new();
    let mut new_diff = String::new();

    if stacked {
        // Pad so that the first longer common run lines up, for example:
        //   the.office.us.s02e01.avi
        //   The Office (US).S02E01.The Dundies.avi
        for diff in &changeset.diffs {
            if let Difference::Same(x) = diff {
                if x.chars().all(char::is_whitespace) || x.chars().count() < 3 {
                    continue;
                }
                if let (Some(old_index), Some(new_index)) = (old.find(x), new.find(x)) {
                    match old_index.cmp(&new_index) {
                        Ordering::Greater => {
                            new_diff = " ".repeat(old_index.saturating_sub(new_index));
                        }
                        Ordering::Less => {
                            old_diff = " ".repeat(new_index.saturating_sub(old_index));
                        }
                        Ordering::Equal => {}
                    }
                    break;
                }
            }
        }
    }

    for diff in changeset.diffs {
        match diff {
            Difference::Same(ref x) => {
                old_diff.push_str(x);
                new_diff.push_str(x);
            }
            Difference::Add(ref x) => {
                if x.chars().all(char::is_whitespace) {
                    new_diff.push_str(&x.on_green().to_string());
                } else {
                    new_diff.push_str(&x.green().to_string());
                }
            }
            Difference::Rem(ref x) => {
                if x.chars().all(char::is_whitespace) {
                    old_diff.push_str(&x.on_red().to_string());
                } else {
                    old_diff.push_str(&x.red().to_string());
                }
            }
        }
    }

    (old_diff, new_diff)
}

/// Print a stacked diff of the changes.
pub fn show_diff(old: &str, new: &str) {
    let (old_diff, new_diff) = color_diff(old, new, true);
    println!("{old_diff}");
    if old_diff != new_diff {
        println!("{new_diff}");
    }
}

/// Generate a shell completion script for the given shell.
pub fn generate_shell_completion(shell: Shell, mut command: Command, install: bool, command_name: &str) -> Result<()> {
    if install {
        let out_dir = get_shell_completion_dir(shell, command_name)?;
        let path = clap_complete::generate_to(shell, &mut command, command_name, out_dir)?;
        println!("Completion file generated to: {}", path.display());
    } else {
        clap_complete::generate(shell, &mut command, command_name, &mut std::io::stdout());
    }
    Ok(())
}

/// Determine the appropriate directory for storing shell completions.
///
/// First checks if the user-specific directory exists,
/// then checks for the global directory.
/// If neither exist, creates and uses the user-specific dir.
fn get_shell_completion_dir(shell: Shell, name: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;

    // Special handling for oh-my-zsh.
    // Create custom "plugin", which will then have to be loaded in .zshrc
    if shell == Shell::Zsh {
        let omz_plugins = home.join(".oh-my-zsh/custom/plugins");
        if omz_plugins.exists() {
            let plugin_dir = omz_plugins.join(name);
            fs::create_dir_all(&plugin_dir)?;
            return Ok(plugin_dir);
        }
    }

    let user_dir = match shell {
        Shell::PowerShell => {
            if cfg!(windows) {
                home.join(r"Documents\PowerShell\completions")
            } else {
                home.join(".config/powershell/completions")
            }
        }
        Shell::Bash => home.join(".bash_completion.d"),
        Shell::Elvish => home.join(".elvish"),
        Shell::Fish => home.join(".config/fish/completions"),
        Shell::Zsh => home.join(".zsh/completions"),
        _ => anyhow::bail!("Unsupported shell"),
    };

    if user_dir.exists() {
        return Ok(user_dir);
    }

    let global_dir = match shell {
        Shell::PowerShell => user_dir.clone(),
        Shell::Bash => PathBuf::from("/etc/bash_completion.d"),
        Shell::Fish => PathBuf::from("/usr/share/fish/completions"),
        Shell::Zsh => PathBuf::from("/usr/share/zsh/site-functions"),
        _ => anyhow::bail!("Unsupported shell"),
    };

    if global_dir.exists() {
        return Ok(global_dir);
    }

    fs::create_dir_all(&user_dir)?;
    Ok(user_dir)
}

/// Helper method to assert floating point equality in test cases.
#[inline]
pub fn assert_f64_eq(a: f64, b: f64) {
    let epsilon = f64::EPSILON;
    assert!(
        (a - b).abs() <= epsilon,
        "Values are not equal: {a} and {b} (epsilon = {epsilon})"
    );
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    use std::fs::File;

    use tempfile::tempdir;

    #[test]
    fn episode_marker_is_not_an_extension() {
        assert_eq!(episode_file_extension(Path::new("Show.S01E01.mkv")), Some("mkv".to_string()));
        assert_eq!(episode_file_extension(Path::new("Show.S01E01")), None);
        assert_eq!(episode_file_extension(Path::new("Show.2x05")), None);
        assert_eq!(episode_file_extension(Path::new("README")), None);

        let (stem, extension) = get_normalized_file_name_and_extension(Path::new("/tv/Show.S01E01")).unwrap();
        assert_eq!(stem, "Show.S01E01");
        assert_eq!(extension, "");

        let (stem, extension) = get_normalized_file_name_and_extension(Path::new("/tv/Show.S01E01.mkv")).unwrap();
        assert_eq!(stem, "Show.S01E01");
        assert_eq!(extension, "mkv");
    }

    #[test]
    fn test_is_hidden_file() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        File::create(dir.path().join("visible")).unwrap();

        let find = |name: &str| {
            WalkDir::new(dir.path())
                .into_iter()
                .filter_map(Result::ok)
                .find(|e| e.file_name().to_string_lossy().eq(name))
                .unwrap()
        };

        assert!(is_hidden(&find(".hidden")));
        assert!(!is_hidden(&find("visible")));
    }

    #[test]
    fn test_resolve_input_path_nonexistent() {
        let resolved = resolve_input_path(Some(Path::new("nonexistent")));
        assert!(resolved.is_err());
    }

    #[test]
    fn test_resolve_input_path_default() {
        let resolved = resolve_input_path(None);
        assert_eq!(resolved.unwrap(), env::current_dir().unwrap());
    }

    #[test]
    fn test_strip_special_characters_keeps_separators() {
        assert_eq!(strip_special_characters("  The Office (US)  ", false), "The Office (US)");
        assert_eq!(strip_special_characters("Marvel's Agents of S.H.I.E.L.D.", false), "Marvel's Agents of S.H.I.E.L.D.");
        assert_eq!(strip_special_characters("What? Why: Who", false), "What Why Who");
        assert_eq!(strip_special_characters("Tom  &  Jerry", false), "Tom and Jerry");
    }

    #[test]
    fn test_strip_special_characters_strip_all() {
        assert_eq!(strip_special_characters("The.Office.US", true), "TheOfficeUS");
        assert_eq!(strip_special_characters("the_office - us", true), "theofficeus");
        assert_eq!(strip_special_characters("", true), "");
    }

    #[test]
    fn test_list_subdirectories_sorted_without_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Season 2")).unwrap();
        fs::create_dir(dir.path().join("Season 1")).unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        let names = list_subdirectories(dir.path()).unwrap();
        assert_eq!(names, vec!["Season 1", "Season 2"]);
        assert!(list_subdirectories(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_remove_empty_parents_stops_at_root() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        File::create(root.path().join("a").join("keep.txt")).unwrap();

        remove_empty_parents(&nested, root.path()).unwrap();
        assert!(!nested.exists());
        assert!(root.path().join("a").exists());

        fs::remove_file(root.path().join("a").join("keep.txt")).unwrap();
        remove_empty_parents(&root.path().join("a"), root.path()).unwrap();
        assert!(!root.path().join("a").exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_insert_suffix_before_extension() {
        let result = insert_suffix_before_extension(Path::new("dir/file.mkv"), "_3");
        assert_eq!(result, Path::new("dir/file_3.mkv"));
    }

    #[test]
    fn test_relative_path_for_root() {
        let root = Path::new("/downloads/tv");
        assert_eq!(get_relative_path_or_filename(root, root), "tv");
    }
}
