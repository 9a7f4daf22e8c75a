//! Answer verification.

use regex::Regex;
use std::sync::LazyLock;

static QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*\+\s*(\d+)").expect("question pattern is valid")
});

/// Recompute the correct answer from a challenge message.
///
/// Only line 1 is read, so digits elsewhere (e.g. in a display name) cannot
/// forge the question.
pub fn expected_answer(message_text: &str) -> Option<u32> {
    let line = message_text.lines().nth(1)?;
    let caps = QUESTION.captures(line)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    a.checked_add(b)
}
