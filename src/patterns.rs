//! Per-language removal rules.
//!
//! The registry is plain data: one row per language holding its comment
//! rules and its log-statement rules, in application order. Adding a
//! language means adding a row here and an extension in [`crate::language`].
//!
//! Every rule is compiled in multi-line mode, so `$` stops at the end of
//! each line. Block rules use `[\s\S]*?` to cross newlines while matching
//! the shortest span, which keeps adjacent block comments separate.

use crate::language::LanguageId;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

const LINE_SLASH: &str = r"//.*?$";
const LINE_HASH: &str = r"#.*?$";
const BLOCK_C: &str = r"/\*[\s\S]*?\*/";
const TRIPLE_DOUBLE: &str = r#""""[\s\S]*?""""#;
const TRIPLE_SINGLE: &str = r"'''[\s\S]*?'''";

const C_STYLE: &[&str] = &[LINE_SLASH, BLOCK_C];

/// Log rules applied to languages without a dedicated list, and to `unknown`.
const GENERIC_LOGS: &[&str] = &[
    r"console\.\w+\s*\(.*?\)",
    r"print\s*\(.*?\)",
    r"System\.out\.\w+\s*\(.*?\)",
    r"echo\s+.*?$",
];

/// `(language, comment rules, log rules)`; `None` log rules fall back to
/// [`GENERIC_LOGS`].
type RuleRow = (LanguageId, &'static [&'static str], Option<&'static [&'static str]>);

const TABLE: &[RuleRow] = &[
    (
        LanguageId::Python,
        &[LINE_HASH, TRIPLE_DOUBLE, TRIPLE_SINGLE],
        Some(&[r"print\s*\(.*?\)", r"logging\.\w+\s*\(.*?\)"]),
    ),
    (
        LanguageId::JavaScript,
        C_STYLE,
        Some(&[r"console\.\w+\s*\(.*?\)", r"alert\s*\(.*?\)"]),
    ),
    (
        LanguageId::Java,
        C_STYLE,
        Some(&[
            r"System\.out\.\w+\s*\(.*?\)",
            r"System\.err\.\w+\s*\(.*?\)",
            r"logger\.\w+\s*\(.*?\)",
        ]),
    ),
    (
        LanguageId::C,
        C_STYLE,
        Some(&[r"printf\s*\(.*?\)", r"fprintf\s*\(.*?\)"]),
    ),
    (
        LanguageId::Cpp,
        C_STYLE,
        Some(&[r"std::cout.*?<<", r"std::cerr.*?<<"]),
    ),
    (
        LanguageId::CSharp,
        C_STYLE,
        Some(&[r"Console\.\w+\s*\(.*?\)", r"Debug\.\w+\s*\(.*?\)"]),
    ),
    (
        LanguageId::Go,
        C_STYLE,
        Some(&[r"fmt\.\w+\s*\(.*?\)", r"log\.\w+\s*\(.*?\)"]),
    ),
    (
        LanguageId::Ruby,
        &[LINE_HASH, r"=begin[\s\S]*?=end"],
        Some(&[r"puts\s+.*?$", r"print\s+.*?$", r"p\s+.*?$"]),
    ),
    (
        LanguageId::Php,
        &[LINE_SLASH, LINE_HASH, BLOCK_C],
        Some(&[r"echo\s+.*?;", r"print\s+.*?;", r"var_dump\s*\(.*?\)"]),
    ),
    (
        LanguageId::Swift,
        C_STYLE,
        Some(&[r"print\s*\(.*?\)", r"NSLog\s*\(.*?\)"]),
    ),
    (
        LanguageId::TypeScript,
        C_STYLE,
        Some(&[r"console\.\w+\s*\(.*?\)"]),
    ),
    (LanguageId::Html, &[r"<!--[\s\S]*?-->"], None),
    (LanguageId::Css, &[BLOCK_C], None),
    (LanguageId::Shell, &[LINE_HASH], Some(&[r"echo\s+.*?$"])),
    (
        LanguageId::Perl,
        &[LINE_HASH, r"=pod[\s\S]*?=cut"],
        Some(&[r"print\s+.*?;"]),
    ),
    (LanguageId::Kotlin, C_STYLE, Some(&[r"println\s*\(.*?\)"])),
    (
        LanguageId::Rust,
        C_STYLE,
        Some(&[r"println!\s*\(.*?\)", r"print!\s*\(.*?\)"]),
    ),
    (
        LanguageId::Unknown,
        &[LINE_SLASH, BLOCK_C, LINE_HASH, TRIPLE_DOUBLE, TRIPLE_SINGLE],
        Some(GENERIC_LOGS),
    ),
];

/// A compiled pattern whose matches are deleted.
#[derive(Debug, Clone)]
pub struct Rule {
    regex: Regex,
}

impl Rule {
    fn compile(pattern: &str) -> Self {
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .unwrap_or_else(|e| panic!("built-in pattern {pattern:?} must compile: {e}"));
        Self { regex }
    }

    /// Source text of the pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Deletes every non-overlapping match from `text`.
    #[must_use]
    pub fn strip(&self, text: &str) -> String {
        self.regex.replace_all(text, "").into_owned()
    }
}

/// Ordered comment and log rules for one language.
#[derive(Debug, Clone)]
pub struct PatternSet {
    /// Applied first, in order.
    pub comment_rules: Vec<Rule>,
    /// Applied to the comment-free text, in order.
    pub log_rules: Vec<Rule>,
}

impl PatternSet {
    fn compile(comments: &[&str], logs: &[&str]) -> Self {
        Self {
            comment_rules: comments.iter().map(|p| Rule::compile(p)).collect(),
            log_rules: logs.iter().map(|p| Rule::compile(p)).collect(),
        }
    }
}

static REGISTRY: Lazy<HashMap<LanguageId, PatternSet>> = Lazy::new(|| {
    TABLE
        .iter()
        .map(|&(language, comments, logs)| {
            (
                language,
                PatternSet::compile(comments, logs.unwrap_or(GENERIC_LOGS)),
            )
        })
        .collect()
});

/// Returns the pattern set for `language`.
///
/// Never fails: a language without a row resolves to the `unknown` set.
#[must_use]
pub fn lookup(language: LanguageId) -> &'static PatternSet {
    REGISTRY
        .get(&language)
        .or_else(|| REGISTRY.get(&LanguageId::Unknown))
        .unwrap_or_else(|| unreachable!("the unknown row is part of the static table"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_language_has_a_row() {
        for language in LanguageId::ALL {
            assert!(TABLE.iter().any(|(l, _, _)| *l == language), "{language}");
        }
        assert_eq!(TABLE.len(), LanguageId::ALL.len());
    }

    #[test]
    fn test_all_patterns_compile() {
        for language in LanguageId::ALL {
            let set = lookup(language);
            assert!(!set.comment_rules.is_empty());
            assert!(!set.log_rules.is_empty());
        }
    }

    #[test]
    fn test_markup_falls_back_to_generic_logs() {
        let html = lookup(LanguageId::Html);
        let generic: Vec<_> = GENERIC_LOGS.iter().map(|p| p.to_string()).collect();
        let actual: Vec<_> = html.log_rules.iter().map(|r| r.pattern().to_string()).collect();
        assert_eq!(actual, generic);
    }

    #[test]
    fn test_line_rule_stops_at_newline() {
        let rule = Rule::compile(LINE_SLASH);
        assert_eq!(rule.strip("a // one\nb // two\nc"), "a \nb \nc");
    }

    #[test]
    fn test_block_rule_is_not_greedy() {
        let rule = Rule::compile(BLOCK_C);
        assert_eq!(rule.strip("/* a */ keep /* b\n c */"), " keep ");
    }

    #[test]
    fn test_python_rule_order() {
        let set = lookup(LanguageId::Python);
        let patterns: Vec<_> = set.comment_rules.iter().map(Rule::pattern).collect();
        assert_eq!(patterns, vec![LINE_HASH, TRIPLE_DOUBLE, TRIPLE_SINGLE]);
    }
}
