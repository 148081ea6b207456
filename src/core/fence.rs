//! Collision-free markdown fencing of the assembled answer.

const MIN_RUN: usize = 3;

/// Length of the longest run of consecutive backticks in `content`.
pub fn longest_backtick_run(content: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Wraps `content` unmodified in a `markdown` fence one backtick longer than any inner run.
pub fn wrap(content: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(content).max(MIN_RUN) + 1);
    format!("{fence}markdown\n{content}\n{fence}")
}
