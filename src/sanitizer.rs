//! Comment and log-statement removal.
//!
//! Rules operate on raw text, not on a syntax tree. A comment marker inside
//! a string literal (`"http://example.com"`) is treated as a real comment
//! and removed along with the rest of the line.

use crate::language::LanguageId;
use crate::patterns::{self, Rule};
use tracing::trace;

/// Removes comments, then log statements, from `text`.
///
/// Each rule runs over the output of the previous one. Comment rules run
/// first so a log call that only existed inside a comment is gone before
/// the log rules see the text. Apart from the deleted spans the text is
/// returned unchanged, including its line endings.
///
/// # Examples
///
/// ```
/// use code_cleaner::{sanitize, LanguageId};
///
/// let cleaned = sanitize("let x = 1; // note\nconsole.log(x);\n", LanguageId::JavaScript);
/// assert_eq!(cleaned, "let x = 1; \n;\n");
/// ```
#[must_use]
pub fn sanitize(text: &str, language: LanguageId) -> String {
    let set = patterns::lookup(language);

    let without_comments = apply(text, &set.comment_rules);
    apply(&without_comments, &set.log_rules)
}

fn apply(text: &str, rules: &[Rule]) -> String {
    rules.iter().fold(text.to_owned(), |current, rule| {
        let next = rule.strip(&current);
        if next.len() != current.len() {
            trace!(
                pattern = rule.pattern(),
                removed = current.len() - next.len(),
                "Rule matched"
            );
        }
        next
    })
}
