//! Scripted `ProcessRunner` for operation tests.
//!
//! Rules match a contiguous run of argv tokens; the longest matching pattern
//! wins. Each rule replays its queued replies in order and repeats the last
//! one forever. Every call is recorded, including ones no rule matches.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cli::runner::{redact_argv, CommandResult, ProcessRunner};
use crate::error::QlikError;

#[derive(Clone)]
enum Reply {
    Stdout(String),
    Fail(QlikError),
}

struct Rule {
    pattern: Vec<String>,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn matches(&self, argv: &[String]) -> bool {
        !self.pattern.is_empty()
            && argv
                .windows(self.pattern.len())
                .any(|window| window == self.pattern.as_slice())
    }

    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(|| Reply::Stdout(String::new()))
        } else {
            self.replies
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::Stdout(String::new()))
        }
    }
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
    redacted: Mutex<Vec<bool>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedRunner::default())
    }

    fn push(&self, pattern: &[&str], reply: Reply) {
        let pattern: Vec<String> = pattern.iter().map(|s| s.to_string()).collect();
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|rule| rule.pattern == pattern) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                pattern,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Answer calls containing `pattern` with a successful `stdout`.
    pub fn on(&self, pattern: &[&str], stdout: &str) -> &Self {
        self.push(pattern, Reply::Stdout(stdout.to_string()));
        self
    }

    /// Answer calls containing `pattern` with an error.
    pub fn fail(&self, pattern: &[&str], error: QlikError) -> &Self {
        self.push(pattern, Reply::Fail(error));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of recorded calls containing `pattern`.
    pub fn count_matching(&self, pattern: &[&str]) -> usize {
        let pattern: Vec<String> = pattern.iter().map(|s| s.to_string()).collect();
        self.calls()
            .iter()
            .filter(|argv| argv.windows(pattern.len()).any(|w| w == pattern.as_slice()))
            .count()
    }

    /// Redaction flag passed with each recorded call.
    pub fn redaction_flags(&self) -> Vec<bool> {
        self.redacted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        argv: &[String],
        _timeout: Duration,
        redact_secret_args: bool,
    ) -> crate::Result<CommandResult> {
        self.calls.lock().unwrap().push(argv.to_vec());
        self.redacted.lock().unwrap().push(redact_secret_args);

        let command = if redact_secret_args {
            redact_argv(argv).join(" ")
        } else {
            argv.join(" ")
        };

        let reply = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .filter(|rule| rule.matches(argv))
                .max_by_key(|rule| rule.pattern.len())
                .map(Rule::next_reply)
        };

        match reply {
            Some(Reply::Stdout(stdout)) => Ok(CommandResult::ok(command, stdout)),
            Some(Reply::Fail(error)) => Err(error),
            None => Err(QlikError::ExternalTool(format!(
                "{} failed with code 1: unscripted command",
                command
            ))),
        }
    }
}
