//! Optional dead-code removal.
//!
//! An oracle proposes a further-trimmed version of already sanitized text.
//! Its answer is never trusted blindly: [`refine`] keeps the sanitized text
//! whenever the call fails or the candidate looks truncated.

use crate::error::{Error, Result};
use crate::language::LanguageId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama model.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can propose dead-code removals for a piece of source.
pub trait DeadCodeOracle: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns a candidate with dead code removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the oracle is unreachable or answers badly.
    fn prune(&self, code: &str, language: LanguageId) -> Result<String>;
}

/// Oracle that leaves code untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOracle;

impl DeadCodeOracle for NoopOracle {
    fn name(&self) -> &str {
        "noop"
    }

    fn prune(&self, code: &str, _language: LanguageId) -> Result<String> {
        Ok(code.to_owned())
    }
}

/// Connection settings for [`OllamaOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSettings {
    /// Server base URL, e.g. `http://localhost:11434`
    pub base_url: String,

    /// Model name
    pub model: String,

    /// Bound on a single request
    pub timeout: Duration,
}

impl OracleSettings {
    /// Settings for `base_url` with the default model and timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Oracle backed by an Ollama server's `/api/generate` endpoint.
///
/// Uses a blocking client; call it from a thread that may block.
pub struct OllamaOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaOracle {
    /// Creates a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &OracleSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::oracle("ollama", e))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
        })
    }
}

impl DeadCodeOracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    fn prune(&self, code: &str, language: LanguageId) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(code, language),
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| Error::oracle(self.name(), e))?;

        if !response.status().is_success() {
            return Err(Error::oracle(
                self.name(),
                format!("HTTP {}", response.status()),
            ));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| Error::oracle(self.name(), e))?;

        Ok(body.response)
    }
}

fn build_prompt(code: &str, language: LanguageId) -> String {
    format!(
        "You are an expert code analyzer. Analyze the following {language} code and remove \
         any dead code (code that is never executed or has no effect).\n\
         Do not remove functional code. Return only the cleaned code without any explanations.\n\n\
         CODE:\n{code}\n\nCLEANED CODE:"
    )
}

/// Asks `oracle` to trim `code`, falling back to `code` itself.
///
/// The candidate is discarded when the call fails, when it is blank, or
/// when it has fewer than half as many characters as `code`.
#[must_use]
pub fn refine(oracle: &dyn DeadCodeOracle, code: &str, language: LanguageId) -> String {
    match oracle.prune(code, language) {
        Ok(candidate) => {
            if candidate.trim().is_empty() {
                warn!("Oracle '{}' returned nothing; keeping sanitized text", oracle.name());
                return code.to_owned();
            }

            let (kept, original) = (candidate.chars().count(), code.chars().count());
            if kept * 2 < original {
                warn!(
                    "Oracle '{}' returned {} of {} characters; keeping sanitized text",
                    oracle.name(),
                    kept,
                    original
                );
                return code.to_owned();
            }

            debug!("Oracle '{}' accepted ({} -> {} chars)", oracle.name(), original, kept);
            candidate
        }
        Err(e) => {
            warn!("{}; keeping sanitized text", e);
            code.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl DeadCodeOracle for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn prune(&self, _code: &str, _language: LanguageId) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    struct Failing;

    impl DeadCodeOracle for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn prune(&self, _code: &str, _language: LanguageId) -> Result<String> {
            Err(Error::oracle(self.name(), "connection refused"))
        }
    }

    const CODE: &str = "def f():\n    return 1\n\ndef g():\n    return 2\n";

    #[test]
    fn test_noop_returns_input() {
        assert_eq!(refine(&NoopOracle, CODE, LanguageId::Python), CODE);
    }

    #[test]
    fn test_empty_candidate_is_discarded() {
        assert_eq!(refine(&Fixed(""), CODE, LanguageId::Python), CODE);
        assert_eq!(refine(&Fixed("  \n\t"), CODE, LanguageId::Python), CODE);
    }

    #[test]
    fn test_short_candidate_is_discarded() {
        assert_eq!(refine(&Fixed("def f():"), CODE, LanguageId::Python), CODE);
    }

    #[test]
    fn test_failure_is_absorbed() {
        assert_eq!(refine(&Failing, CODE, LanguageId::Python), CODE);
    }

    #[test]
    fn test_reasonable_candidate_is_used() {
        let candidate = "def f():\n    return 1\n\ndef g():\n    pass\n";
        assert_eq!(refine(&Fixed(candidate), CODE, LanguageId::Python), candidate);
    }

    #[test]
    fn test_exactly_half_is_kept() {
        assert_eq!(refine(&Fixed("ab"), "abcd", LanguageId::C), "ab");
        assert_eq!(refine(&Fixed("a"), "abcd", LanguageId::C), "abcd");
    }

    #[test]
    fn test_prompt_names_language_and_code() {
        let prompt = build_prompt("x = 1", LanguageId::Python);
        assert!(prompt.contains("python code"));
        assert!(prompt.contains("CODE:\nx = 1"));
        assert!(prompt.ends_with("CLEANED CODE:"));
    }

    #[test]
    fn test_unreachable_server_is_an_oracle_error() {
        let settings = OracleSettings {
            base_url: "http://127.0.0.1:1/".to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(2),
        };
        let oracle = OllamaOracle::new(&settings).unwrap();
        assert_eq!(oracle.endpoint, "http://127.0.0.1:1/api/generate");

        let err = oracle.prune("x = 1", LanguageId::Python).unwrap_err();
        assert!(matches!(err, Error::Oracle { .. }));
    }
}
