//! Language identification by file extension.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Closed set of languages the cleaner has rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    /// `.py`
    Python,
    /// `.js`
    JavaScript,
    /// `.java`
    Java,
    /// `.c`
    C,
    /// `.cpp`
    Cpp,
    /// `.cs`
    CSharp,
    /// `.go`
    Go,
    /// `.rb`
    Ruby,
    /// `.php`
    Php,
    /// `.swift`
    Swift,
    /// `.ts`
    TypeScript,
    /// `.html`
    Html,
    /// `.css`
    Css,
    /// `.sh`
    Shell,
    /// `.pl`
    Perl,
    /// `.kt`
    Kotlin,
    /// `.rs`
    Rust,
    /// Anything else, including files without an extension.
    Unknown,
}

static EXTENSIONS: Lazy<HashMap<&'static str, LanguageId>> = Lazy::new(|| {
    [
        ("py", LanguageId::Python),
        ("js", LanguageId::JavaScript),
        ("java", LanguageId::Java),
        ("c", LanguageId::C),
        ("cpp", LanguageId::Cpp),
        ("cs", LanguageId::CSharp),
        ("go", LanguageId::Go),
        ("rb", LanguageId::Ruby),
        ("php", LanguageId::Php),
        ("swift", LanguageId::Swift),
        ("ts", LanguageId::TypeScript),
        ("html", LanguageId::Html),
        ("css", LanguageId::Css),
        ("sh", LanguageId::Shell),
        ("pl", LanguageId::Perl),
        ("kt", LanguageId::Kotlin),
        ("rs", LanguageId::Rust),
    ]
    .into_iter()
    .collect()
});

impl LanguageId {
    /// Every identifier, `Unknown` last.
    pub const ALL: [Self; 18] = [
        Self::Python,
        Self::JavaScript,
        Self::Java,
        Self::C,
        Self::Cpp,
        Self::CSharp,
        Self::Go,
        Self::Ruby,
        Self::Php,
        Self::Swift,
        Self::TypeScript,
        Self::Html,
        Self::Css,
        Self::Shell,
        Self::Perl,
        Self::Kotlin,
        Self::Rust,
        Self::Unknown,
    ];

    /// Detects the language of `path` from its extension (case-insensitive).
    ///
    /// Pure function of the path: file content is never consulted.
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| EXTENSIONS.get(ext.to_ascii_lowercase().as_str()))
            .copied()
            .unwrap_or(Self::Unknown)
    }

    /// Returns the lowercase identifier used in reports and prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Go => "go",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::TypeScript => "typescript",
            Self::Html => "html",
            Self::Css => "css",
            Self::Shell => "shell",
            Self::Perl => "perl",
            Self::Kotlin => "kotlin",
            Self::Rust => "rust",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for every identifier except `Unknown`.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorthand for [`LanguageId::detect`].
#[must_use]
pub fn detect(path: &Path) -> LanguageId {
    LanguageId::detect(path)
}
