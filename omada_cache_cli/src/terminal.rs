//! Terminal detection utilities

use is_terminal::IsTerminal;
use std::env;
use std::io::stdout;

/// Check if stdout is connected to an interactive terminal
pub fn is_interactive() -> bool {
    if !stdout().is_terminal() {
        return false;
    }

    // CI runners may allocate a TTY but nobody reads it
    !is_ci_environment()
}

/// Check if colored output should be used
pub fn supports_color() -> bool {
    if !is_interactive() || env::var_os("NO_COLOR").is_some() {
        return false;
    }

    let term = env::var("TERM").unwrap_or_default();
    term != "dumb"
}

const CI_VARS: [&str; 7] = [
    "CI",
    "CONTINUOUS_INTEGRATION",
    "JENKINS_URL",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "TF_BUILD", // Azure DevOps
];

/// Detect if running in a CI environment
fn is_ci_environment() -> bool {
    CI_VARS.iter().any(|var| env::var(var).is_ok())
}
