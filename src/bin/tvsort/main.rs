mod config;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;

use tv_sort::console::{Logger, UserInput};
use tv_sort::database::Database;
use tv_sort::error::FatalError;
use tv_sort::renamer::TvSort;
use tv_sort::{print_error, print_warning};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Rename TV episode files with catalog titles and move them into the TV library"
)]
struct Args {
    /// Optional input directory or file
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    path: Option<PathBuf>,

    /// TV library root directory
    #[arg(short = 't', long = "library", name = "LIBRARY", value_hint = clap::ValueHint::DirPath)]
    library: Option<PathBuf>,

    /// Supported file extension
    #[arg(short = 'f', long = "format", num_args = 1, action = clap::ArgAction::Append, name = "FORMAT")]
    format: Vec<String>,

    /// Directory name to skip when scanning
    #[arg(short = 'e', long = "ignore", num_args = 1, action = clap::ArgAction::Append, name = "IGNORE")]
    ignore: Vec<String>,

    /// Copy files to the library when it is on another filesystem
    #[arg(short, long)]
    copy: bool,

    /// Rename files in their current directory instead of moving them to the library
    #[arg(short, long)]
    in_place: bool,

    /// Never ask for input, only accept unambiguous matches
    #[arg(short, long)]
    no_input: bool,

    /// Only print changes without moving files
    #[arg(short, long)]
    print: bool,

    /// Print debug information
    #[arg(short = 'D', long)]
    debug: bool,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Database file to use instead of the default location
    #[arg(long, name = "DATABASE", value_hint = clap::ValueHint::FilePath)]
    database: Option<PathBuf>,

    /// Print database contents and exit
    #[arg(long)]
    print_db: bool,

    /// Delete the database file and exit
    #[arg(long)]
    reset_db: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Some(ref shell) = args.completion {
        return tv_sort::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"));
    }

    let config = CliConfig::from_args(args)?;
    if config.rename.debug {
        println!("{}", config.rename);
    }

    match run(config) {
        Err(error) if FatalError::is_user_exit(&error) => {
            print_warning!("{error}");
            Ok(())
        }
        Err(error) if FatalError::is_fatal(&error) => {
            print_error!("{error:#}");
            std::process::exit(1);
        }
        result => result,
    }
}

fn run(config: CliConfig) -> anyhow::Result<()> {
    let CliConfig {
        rename,
        print_db,
        reset_db,
    } = config;

    if reset_db {
        return reset_database(&rename.database);
    }
    if print_db {
        return Database::open(&rename.database)?.print_tables();
    }

    let summary = TvSort::new(rename)?.run()?;
    summary.print();
    Ok(())
}

/// Delete the database file after confirmation.
fn reset_database(path: &std::path::Path) -> anyhow::Result<()> {
    if !path.exists() {
        print_warning!("Database does not exist: {}", path.display());
        return Ok(());
    }
    let log = Logger::default();
    let answer = UserInput::interactive().choose(
        &log,
        &format!("Delete database {}? [y/n]: ", path.display()),
        &["y", "n"],
        "n",
    )?;
    if answer == "y" {
        for file in Database::remove_files(path)? {
            println!("{}", format!("Deleted: {}", file.display()).green());
        }
    } else {
        println!("Database kept");
    }
    Ok(())
}
