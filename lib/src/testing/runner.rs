// Executes one test closure and logs its verdict.

use crate::klog_info;
use crate::testing::TestResult;

/// Run a single named test and log the outcome.
///
/// Failure details are logged by the assertion macros at the point of
/// failure; this only reports the final verdict.
pub fn run_single_test<F: FnOnce() -> TestResult>(name: &str, test: F) -> TestResult {
    let result = test();
    match result {
        TestResult::Pass => klog_info!("[PASS] {}", name),
        TestResult::Skipped => klog_info!("[SKIP] {}", name),
        TestResult::Fail | TestResult::Panic => klog_info!("[FAIL] {}", name),
    }
    result
}
