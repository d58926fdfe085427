//! Scripted runner for tests.
//!
//! Records every invocation and answers through a handler, so tests can
//! assert on the exact argument vectors without spawning processes. The
//! handler can also play the instrument's part, e.g. write a metrics dump to
//! the path passed in `--aggregates_yaml_path`.

use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    /// Token following `flag`, if the flag is present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

type Handler = dyn Fn(&Invocation) -> Result<CommandOutput> + Send + Sync;

pub struct MockRunner {
    calls: Mutex<Vec<Invocation>>,
    handler: Box<Handler>,
}

impl std::fmt::Debug for MockRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRunner")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

/// A successful, instant result carrying `text`.
pub fn ok_output(text: impl Into<String>) -> CommandOutput {
    CommandOutput {
        output: text.into(),
        exit_code: Some(0),
        duration: Duration::ZERO,
    }
}

impl MockRunner {
    /// Every call succeeds with empty output.
    pub fn new() -> Self {
        Self::with_handler(|_| Ok(ok_output("")))
    }

    /// Every call succeeds with `text` as output.
    pub fn with_output(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_handler(move |_| Ok(ok_output(text.clone())))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    pub fn last(&self) -> Option<Invocation> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Invocation>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let invocation = Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
            timeout,
        };
        self.lock().push(invocation.clone());
        (self.handler)(&invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BitsError;

    #[test]
    fn test_records_calls_in_order() {
        let runner = MockRunner::with_output("ok");
        let a = vec!["--name".to_string(), "a".to_string()];
        let b = vec!["--name".to_string(), "b".to_string()];
        runner.run(Path::new("bits"), &a, Duration::from_secs(1)).unwrap();
        let out = runner.run(Path::new("bits"), &b, Duration::from_secs(2)).unwrap();
        assert_eq!(out.output, "ok");

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].value_of("--name"), Some("a"));
        assert_eq!(calls[1].timeout, Duration::from_secs(2));
        assert_eq!(runner.last().unwrap().args, b);
    }

    #[test]
    fn test_handler_errors_propagate_and_are_recorded() {
        let runner = MockRunner::with_handler(|inv| {
            Err(BitsError::Timeout {
                program: inv.program.display().to_string(),
                timeout: inv.timeout,
                pid: 0,
            })
        });
        let err = runner
            .run(Path::new("bits"), &[], Duration::from_millis(5))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn test_value_of_missing_flag() {
        let inv = Invocation {
            program: PathBuf::from("bits"),
            args: vec!["--stop".to_string()],
            timeout: Duration::ZERO,
        };
        assert_eq!(inv.value_of("--stop"), None);
        assert!(inv.has_flag("--stop"));
        assert!(!inv.has_flag("--name"));
    }
}
