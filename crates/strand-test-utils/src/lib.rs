use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use strand_exec::{ExecutionResult, ExecutionService};

/// One recorded call to the scripted service.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub at: Instant,
}

struct Rule {
    pattern: String,
    responses: VecDeque<ExecutionResult>,
}

/// ExecutionService double for tests: commands are matched against substring
/// rules in registration order and answered from a per-rule queue. Every
/// invocation is recorded for assertions. Unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub struct ScriptedExecutionService {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<Invocation>>,
}

fn relock<T>(guard: std::sync::LockResult<std::sync::MutexGuard<'_, T>>) -> std::sync::MutexGuard<'_, T> {
    guard.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `response` for the next command containing `pattern`. Multiple
    /// registrations for the same pattern answer successive calls in order;
    /// when a rule's queue is exhausted its last response keeps answering.
    pub fn on(&self, pattern: &str, response: ExecutionResult) {
        let mut rules = relock(self.rules.lock());
        if let Some(rule) = rules.iter_mut().find(|r| r.pattern == pattern) {
            rule.responses.push_back(response);
        } else {
            rules.push(Rule {
                pattern: pattern.to_string(),
                responses: VecDeque::from([response]),
            });
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        relock(self.log.lock()).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        relock(self.log.lock())
            .iter()
            .map(|i| i.command.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        relock(self.log.lock()).len()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        relock(self.log.lock())
            .iter()
            .filter(|i| i.command.contains(pattern))
            .count()
    }
}

impl ExecutionService for ScriptedExecutionService {
    fn execute(&self, command: &str, working_dir: Option<&Path>) -> ExecutionResult {
        relock(self.log.lock()).push(Invocation {
            command: command.to_string(),
            working_dir: working_dir.map(Path::to_path_buf),
            at: Instant::now(),
        });

        let mut rules = relock(self.rules.lock());
        for rule in rules.iter_mut() {
            if command.contains(&rule.pattern) {
                return if rule.responses.len() > 1 {
                    rule.responses
                        .pop_front()
                        .unwrap_or_else(|| success(&[]))
                } else {
                    rule.responses.front().cloned().unwrap_or_else(|| success(&[]))
                };
            }
        }
        success(&[])
    }

    fn host(&self) -> &str {
        "scripted"
    }
}

pub fn success(stdout: &[&str]) -> ExecutionResult {
    ExecutionResult {
        exit_code: 0,
        stdout: stdout.iter().map(|s| s.to_string()).collect(),
        stderr: Vec::new(),
    }
}

pub fn failure(exit_code: i32, stderr: &[&str]) -> ExecutionResult {
    ExecutionResult {
        exit_code,
        stdout: Vec::new(),
        stderr: stderr.iter().map(|s| s.to_string()).collect(),
    }
}
