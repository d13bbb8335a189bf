//! Response validity policy.
//!
//! The expected output is source code, so the validator approximates
//! "is this code" with a low false-negative rate: a single recognized
//! code-structure token is enough to accept. False rejection wastes a
//! successful generation and forces an unnecessary fallback, so there
//! is no minimum length and no match counting.

use crate::error::RejectReason;
use tracing::debug;

/// Verdict on a raw model response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Validator configuration: the recognized code-signal token set and
/// the upstream error markers. Both are extendable from config.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub code_signals: Vec<String>,
    pub error_markers: Vec<String>,
}

/// Tokens that mark a response as code-shaped. Matching is
/// case-insensitive and a single hit accepts.
const DEFAULT_CODE_SIGNALS: &[&str] = &[
    "def ", "function ", "func ", "fn ", "class ", "struct ", "impl ", "import ", "require",
    "include", "using ", "package ", "const ", "let ", "var ", "public ", "private ", "return",
    "if ", "for ", "while ", "match ", "{", "}", "();", "=>", "->", "#!/",
];

/// Prefixes that mark an explicit upstream error or refusal
const DEFAULT_ERROR_MARKERS: &[&str] = &["error:", "i'm sorry", "i cannot", "i can't"];

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            code_signals: DEFAULT_CODE_SIGNALS.iter().map(|s| s.to_string()).collect(),
            error_markers: DEFAULT_ERROR_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Decides whether a raw model response counts as usable code
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    code_signals: Vec<String>,
    error_markers: Vec<String>,
}

impl ResponseValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            code_signals: config
                .code_signals
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            error_markers: config
                .error_markers
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    pub fn validate(&self, raw_text: &str) -> Verdict {
        let trimmed = raw_text.trim();
        let lower = trimmed.to_lowercase();

        if self.error_markers.iter().any(|m| lower.starts_with(m)) {
            debug!("Response starts with an upstream error marker");
            return Verdict::Rejected(RejectReason::ExplicitErrorMarker);
        }

        // A fenced block is code regardless of surrounding prose
        if trimmed.contains("```") {
            return Verdict::Accepted;
        }

        if let Some(signal) = self.code_signals.iter().find(|s| lower.contains(s.as_str())) {
            debug!("Accepted on code signal {:?}", signal);
            return Verdict::Accepted;
        }

        Verdict::Rejected(RejectReason::NoCodeSignal)
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_minimal_python_function() {
        let v = ResponseValidator::default();
        assert_eq!(v.validate("def f(): return 1"), Verdict::Accepted);
    }

    #[test]
    fn test_accepts_terse_unfenced_code() {
        let v = ResponseValidator::default();
        // Five-line function, no markdown fencing, well under any
        // length floor
        let code = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}";
        assert_eq!(v.validate(code), Verdict::Accepted);
    }

    #[test]
    fn test_accepts_fenced_block_with_prose() {
        let v = ResponseValidator::default();
        let text = "Here you go:\n```python\nprint(42)\n```";
        assert_eq!(v.validate(text), Verdict::Accepted);
    }

    #[test]
    fn test_rejects_conversational_response() {
        let v = ResponseValidator::default();
        assert_eq!(
            v.validate("Hello! How can I assist you today?"),
            Verdict::Rejected(RejectReason::NoCodeSignal)
        );
    }

    #[test]
    fn test_rejects_error_marker() {
        let v = ResponseValidator::default();
        assert_eq!(
            v.validate("Error: upstream model unavailable"),
            Verdict::Rejected(RejectReason::ExplicitErrorMarker)
        );
        assert_eq!(
            v.validate("I'm sorry, I can't help with that."),
            Verdict::Rejected(RejectReason::ExplicitErrorMarker)
        );
    }

    #[test]
    fn test_error_marker_only_matches_prefix() {
        let v = ResponseValidator::default();
        // "error:" inside a string literal must not reject
        let code = "def check():\n    raise ValueError(\"error: bad input\")";
        assert_eq!(v.validate(code), Verdict::Accepted);
    }

    #[test]
    fn test_natural_language_in_comments_is_fine() {
        let v = ResponseValidator::default();
        let code = "// Hello, this helper assists with parsing\nfn parse() {}";
        assert_eq!(v.validate(code), Verdict::Accepted);
    }

    #[test]
    fn test_single_signal_suffices() {
        let v = ResponseValidator::default();
        // Exactly one token ("return"), no braces, no keywords beyond it
        assert_eq!(v.validate("return x"), Verdict::Accepted);
    }

    #[test]
    fn test_custom_signal_set() {
        let v = ResponseValidator::new(ValidatorConfig {
            code_signals: vec!["SELECT ".to_string()],
            error_markers: vec!["error:".to_string()],
        });
        assert_eq!(v.validate("SELECT * FROM users;"), Verdict::Accepted);
        assert_eq!(
            v.validate("def f(): pass"),
            Verdict::Rejected(RejectReason::NoCodeSignal)
        );
    }

    #[test]
    fn test_empty_response_rejected() {
        let v = ResponseValidator::default();
        assert_eq!(
            v.validate("   "),
            Verdict::Rejected(RejectReason::NoCodeSignal)
        );
    }
}
