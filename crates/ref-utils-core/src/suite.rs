//! Registry for environment and submission tests.
//!
//! Environment tests verify the exercise container is sane; submission tests
//! grade the student's work. Submission tests only run once every
//! environment test passed, and each group stops at its first failure.

use crate::output::{print_err, print_ok};

type TestFn = Box<dyn Fn() -> bool>;

/// Ordered collection of tests for one exercise
#[derive(Default)]
pub struct TestSuite {
    environment: Vec<TestFn>,
    submission: Vec<TestFn>,
}

impl std::fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSuite")
            .field("environment", &self.environment.len())
            .field("submission", &self.submission.len())
            .finish()
    }
}

impl TestSuite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test of the exercise environment
    pub fn add_environment_test(&mut self, test: impl Fn() -> bool + 'static) -> &mut Self {
        self.environment.push(Box::new(test));
        self
    }

    /// Register a test of the student's submission
    pub fn add_submission_test(&mut self, test: impl Fn() -> bool + 'static) -> &mut Self {
        self.submission.push(Box::new(test));
        self
    }

    /// Run every registered test and report the overall verdict
    pub fn run(&self) -> bool {
        print_ok("[+] Running tests..");

        print_ok("[+] Testing environment..");
        let mut passed = run_group("Environment", &self.environment);
        if passed {
            print_ok("[+] Environment tests passed :-)\n");
            print_ok("[+] Testing submission...");
            passed = run_group("Submission", &self.submission);
        }

        if !passed {
            print_err(
                "[!] Some tests failed! Please review your submission to avoid penalties during grading.",
            );
        }
        tracing::info!(passed, "test suite finished");
        passed
    }
}

fn run_group(kind: &str, tests: &[TestFn]) -> bool {
    for (i, test) in tests.iter().enumerate() {
        print_ok(format!("[+] {kind} test {} of {}", i + 1, tests.len()));
        if !test() {
            tracing::debug!(kind, index = i + 1, "test failed");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting(counter: &Rc<Cell<u32>>, result: bool) -> impl Fn() -> bool + 'static {
        let counter = Rc::clone(counter);
        move || {
            counter.set(counter.get() + 1);
            result
        }
    }

    #[test]
    fn empty_suite_passes() {
        assert!(TestSuite::new().run());
    }

    #[test]
    fn all_tests_run_when_passing() {
        let calls = Rc::new(Cell::new(0));
        let mut suite = TestSuite::new();
        suite
            .add_environment_test(counting(&calls, true))
            .add_submission_test(counting(&calls, true))
            .add_submission_test(counting(&calls, true));

        assert!(suite.run());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn environment_failure_skips_submission() {
        let env_calls = Rc::new(Cell::new(0));
        let sub_calls = Rc::new(Cell::new(0));
        let mut suite = TestSuite::new();
        suite
            .add_environment_test(counting(&env_calls, false))
            .add_environment_test(counting(&env_calls, true))
            .add_submission_test(counting(&sub_calls, true));

        assert!(!suite.run());
        assert_eq!(env_calls.get(), 1);
        assert_eq!(sub_calls.get(), 0);
    }

    #[test]
    fn submission_failure_stops_the_group() {
        let calls = Rc::new(Cell::new(0));
        let mut suite = TestSuite::new();
        suite
            .add_submission_test(counting(&calls, false))
            .add_submission_test(counting(&calls, true));

        assert!(!suite.run());
        assert_eq!(calls.get(), 1);
    }
}
