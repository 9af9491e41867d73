//! Console output and user input.
//!
//! [`Logger`] carries its own nesting depth so each resolution step can indent
//! its output without shared state.
//! [`UserInput`] implements the confirmation protocol on top of a [`Prompt`],
//! which reads lines from stdin or replays a scripted list of answers.

use std::collections::VecDeque;
use std::io::{self, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::error::FatalError;

/// Indented console logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    depth: usize,
    verbose: bool,
}

/// Source of user input lines.
pub trait Prompt {
    /// Show the prompt text and read one line of input, without the trailing newline.
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

/// Replays a fixed list of answers.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    responses: VecDeque<String>,
    prompts: Vec<String>,
}

/// Outcome of asking the user to pick from a list of candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One of the candidates was picked.
    Accepted(String),
    /// The user typed a new string to look up instead.
    Lookup(String),
    /// The user skipped the selection.
    Abandoned,
}

/// Prompt variations for [`UserInput::select`].
#[derive(Debug, Clone, Copy)]
pub struct SelectOptions<'a> {
    /// Allow free text to be returned as a new lookup string.
    pub allow_lookup: bool,
    /// Extra text appended to the prompt in parentheses.
    pub comment: Option<&'a str>,
    /// Do not announce an empty candidate list.
    pub prompt_only: bool,
    /// Description of what 'x' does.
    pub skip_label: &'a str,
}

/// User input with the confirmation protocol.
///
/// In automated mode nothing is read:
/// a single candidate is accepted, anything else is abandoned,
/// and free text questions get their default answer.
pub struct UserInput {
    prompt: Box<dyn Prompt>,
    automated: bool,
}

impl Logger {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { depth: 0, verbose }
    }

    /// Logger for a nested step, indented one level deeper.
    #[must_use]
    pub const fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            verbose: self.verbose,
        }
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub fn info(&self, message: &str) {
        println!("{}{message}", self.indent());
    }

    /// Only printed in verbose mode.
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            println!("{}{}", self.indent(), message.dimmed());
        }
    }

    pub fn warning(&self, message: &str) {
        println!("{}{}", self.indent(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}{}", self.indent(), format!("Error: {message}").red());
    }

    pub fn separator(&self) {
        println!("{}", "-".repeat(60).dimmed());
    }

    /// Prompt text with the current indentation.
    #[must_use]
    pub fn prompt_text(&self, text: &str) -> String {
        format!("{}{text}", self.indent())
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }
}

impl Prompt for StdinPrompt {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt.magenta());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input).context("Failed to read input")?;
        Ok(input.trim().to_string())
    }
}

impl ScriptedPrompt {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Prompt for ScriptedPrompt {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        let response = self
            .responses
            .pop_front()
            .with_context(|| format!("No scripted response left for prompt: {prompt}"))?;
        println!("{}{}", prompt.magenta(), response);
        Ok(response.trim().to_string())
    }
}

impl Default for SelectOptions<'_> {
    fn default() -> Self {
        Self {
            allow_lookup: true,
            comment: None,
            prompt_only: false,
            skip_label: "to skip this selection",
        }
    }
}

impl UserInput {
    #[must_use]
    pub fn new(prompt: Box<dyn Prompt>, automated: bool) -> Self {
        Self { prompt, automated }
    }

    /// Read answers from stdin.
    #[must_use]
    pub fn interactive() -> Self {
        Self::new(Box::new(StdinPrompt), false)
    }

    /// Never ask anything.
    #[must_use]
    pub fn automated() -> Self {
        Self::new(Box::new(StdinPrompt), true)
    }

    /// Replay the given answers in order.
    #[must_use]
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Box::new(ScriptedPrompt::new(responses)), false)
    }

    #[must_use]
    pub const fn is_automated(&self) -> bool {
        self.automated
    }

    /// Ask the user to pick one of the candidates, look up something else, or skip.
    ///
    /// 'y' accepts a single candidate, typing a candidate name accepts it,
    /// 'x' abandons and any other text is a new lookup if allowed.
    ///
    /// # Errors
    /// Returns [`FatalError::UserExit`] if the user enters 'exit'.
    pub fn select(&mut self, log: &Logger, candidates: &[String], options: &SelectOptions) -> Result<Selection> {
        let mut prompt = match candidates {
            [single] => {
                log.info(&format!("Match found: {single}"));
                "Enter 'y' to accept this match or e".to_string()
            }
            [] => {
                if !options.prompt_only {
                    log.info("No match found");
                }
                if !options.allow_lookup || self.automated {
                    return Ok(Selection::Abandoned);
                }
                "E".to_string()
            }
            _ => {
                log.info(&format!("Multiple possible matches found: {}", candidates.join(", ")));
                "Enter correct match from list or e".to_string()
            }
        };

        if self.automated {
            return Ok(match candidates {
                [single] => {
                    log.info(&format!("Automatic selection: {single}"));
                    Selection::Accepted(single.clone())
                }
                _ => {
                    log.info("Skipped: no automatic selection possible");
                    Selection::Abandoned
                }
            });
        }

        if options.allow_lookup {
            prompt.push_str("nter a different string to look up or e");
        }
        prompt.push_str(&format!(
            "nter 'x' {} or enter 'exit' to quit this program",
            options.skip_label
        ));
        match options.comment {
            Some(comment) => prompt.push_str(&format!(" ({comment}): ")),
            None => prompt.push_str(": "),
        }

        loop {
            let response = self.read(log, &prompt)?;
            let lower = response.to_lowercase();
            if lower == "x" {
                return Ok(Selection::Abandoned);
            }
            if lower == "y"
                && let [single] = candidates
            {
                return Ok(Selection::Accepted(single.clone()));
            }
            if let Some(candidate) = candidates.iter().find(|c| c.to_lowercase() == lower) {
                return Ok(Selection::Accepted(candidate.clone()));
            }
            if response.is_empty() {
                continue;
            }
            if options.allow_lookup {
                return Ok(Selection::Lookup(response));
            }
            log.warning("Unknown response, enter one of the listed matches");
        }
    }

    /// Ask for free text, re-prompting on an empty answer.
    ///
    /// Returns `default` in automated mode.
    ///
    /// # Errors
    /// Returns [`FatalError::UserExit`] if the user enters 'exit'.
    pub fn ask(&mut self, log: &Logger, prompt: &str, default: &str) -> Result<String> {
        if self.automated {
            return Ok(default.to_string());
        }
        let mut response = self.read(log, prompt)?;
        while response.is_empty() {
            response = self.read(log, "An empty response was detected, please enter a valid response: ")?;
        }
        Ok(response)
    }

    /// Ask until one of the given answers is entered. The answer is returned in lowercase.
    ///
    /// Returns `default` in automated mode.
    ///
    /// # Errors
    /// Returns [`FatalError::UserExit`] if the user enters 'exit'.
    pub fn choose(&mut self, log: &Logger, prompt: &str, answers: &[&str], default: &str) -> Result<String> {
        if self.automated {
            return Ok(default.to_string());
        }
        let mut response = self.read(log, prompt)?.to_lowercase();
        while !answers.contains(&response.as_str()) {
            let retry = format!("Unknown response, please enter one of [{}]: ", answers.join("/"));
            response = self.read(log, &retry)?.to_lowercase();
        }
        Ok(response)
    }

    /// Read one line. 'exit' terminates the run.
    fn read(&mut self, log: &Logger, prompt: &str) -> Result<String> {
        let response = self.prompt.read_line(&log.prompt_text(prompt))?;
        if response.eq_ignore_ascii_case("exit") {
            return Err(FatalError::UserExit.into());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod console_tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn nested_logger_increases_depth() {
        let log = Logger::new(false);
        assert_eq!(log.depth(), 0);
        assert_eq!(log.nested().nested().depth(), 2);
        assert_eq!(log.nested().prompt_text("Enter: "), "  Enter: ");
    }

    #[test]
    fn y_accepts_single_candidate() {
        let mut input = UserInput::scripted(["y"]);
        let selection = input
            .select(&Logger::default(), &names(&["The Office (US)"]), &SelectOptions::default())
            .unwrap();
        assert_eq!(selection, Selection::Accepted("The Office (US)".to_string()));
    }

    #[test]
    fn y_with_many_candidates_is_a_lookup() {
        let mut input = UserInput::scripted(["y"]);
        let selection = input
            .select(&Logger::default(), &names(&["A", "B"]), &SelectOptions::default())
            .unwrap();
        assert_eq!(selection, Selection::Lookup("y".to_string()));
    }

    #[test]
    fn candidate_name_is_accepted_case_insensitively() {
        let mut input = UserInput::scripted(["the office (uk)"]);
        let candidates = names(&["The Office (US)", "The Office (UK)"]);
        let selection = input
            .select(&Logger::default(), &candidates, &SelectOptions::default())
            .unwrap();
        assert_eq!(selection, Selection::Accepted("The Office (UK)".to_string()));
    }

    #[test]
    fn free_text_is_lookup_after_empty_answer() {
        let mut input = UserInput::scripted(["", "office"]);
        let selection = input.select(&Logger::default(), &[], &SelectOptions::default()).unwrap();
        assert_eq!(selection, Selection::Lookup("office".to_string()));
    }

    #[test]
    fn x_abandons() {
        let mut input = UserInput::scripted(["X"]);
        let selection = input
            .select(&Logger::default(), &names(&["Lost"]), &SelectOptions::default())
            .unwrap();
        assert_eq!(selection, Selection::Abandoned);
    }

    #[test]
    fn exit_is_fatal() {
        let mut input = UserInput::scripted(["exit"]);
        let error = input
            .select(&Logger::default(), &names(&["Lost"]), &SelectOptions::default())
            .unwrap_err();
        assert!(FatalError::is_user_exit(&error));

        let mut input = UserInput::scripted(["EXIT"]);
        let error = input.ask(&Logger::default(), "Name: ", "default").unwrap_err();
        assert!(FatalError::is_user_exit(&error));
    }

    #[test]
    fn no_candidates_without_lookup_abandons_without_asking() {
        let mut input = UserInput::scripted(Vec::<String>::new());
        let options = SelectOptions {
            allow_lookup: false,
            ..SelectOptions::default()
        };
        let selection = input.select(&Logger::default(), &[], &options).unwrap();
        assert_eq!(selection, Selection::Abandoned);
    }

    #[test]
    fn without_lookup_unknown_text_asks_again() {
        let mut input = UserInput::scripted(["something", "b"]);
        let options = SelectOptions {
            allow_lookup: false,
            ..SelectOptions::default()
        };
        let selection = input.select(&Logger::default(), &names(&["A", "B"]), &options).unwrap();
        assert_eq!(selection, Selection::Accepted("B".to_string()));
    }

    #[test]
    fn automated_accepts_only_single_candidate() {
        let mut input = UserInput::automated();
        let log = Logger::default();
        let options = SelectOptions::default();
        assert_eq!(
            input.select(&log, &names(&["Lost"]), &options).unwrap(),
            Selection::Accepted("Lost".to_string())
        );
        assert_eq!(
            input.select(&log, &names(&["A", "B"]), &options).unwrap(),
            Selection::Abandoned
        );
        assert_eq!(input.select(&log, &[], &options).unwrap(), Selection::Abandoned);
    }

    #[test]
    fn automated_questions_use_default() {
        let mut input = UserInput::automated();
        let log = Logger::default();
        assert_eq!(input.ask(&log, "Directory: ", "y").unwrap(), "y");
        assert_eq!(input.choose(&log, "New show? ", &["y", "n"], "y").unwrap(), "y");
    }

    #[test]
    fn choose_repeats_until_valid() {
        let mut input = UserInput::scripted(["maybe", "LS"]);
        let answer = input
            .choose(&Logger::default(), "New show? ", &["y", "n", "ls"], "y")
            .unwrap();
        assert_eq!(answer, "ls");
    }

    #[test]
    fn ask_repeats_on_empty() {
        let mut input = UserInput::scripted(["", "  ", "Season 01"]);
        assert_eq!(input.ask(&Logger::default(), "Name: ", "y").unwrap(), "Season 01");
    }

    #[test]
    fn scripted_prompt_records_prompts() {
        let mut prompt = ScriptedPrompt::new(["first"]);
        assert_eq!(prompt.read_line("Question: ").unwrap(), "first");
        assert_eq!(prompt.prompts(), ["Question: "]);
        assert!(prompt.read_line("Again: ").is_err());
    }
}
