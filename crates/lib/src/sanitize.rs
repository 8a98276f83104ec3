//! Inbound question sanitization.
//!
//! The question is untrusted text headed for a completion provider's
//! prompt. This stage rejects prompt-injection phrasing outright and
//! strips everything else down to plain, bounded text before the
//! assembler ever sees it. Pure function over a static pattern table.

use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Questions longer than this are truncated with a warning.
pub const MAX_QUESTION_LENGTH: usize = 1000;

/// Phrasings that indicate an attempt to steer the model or smuggle SQL.
/// Any match is a hard rejection, not a warning.
const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(previous|above|all)\s+instructions",
    r"(?i)disregard\s+(previous|above|all)",
    r"(?i)forget\s+(everything|all|previous)",
    r"(?i)new\s+instructions?:",
    r"(?i)system\s*:",
    r"(?i)assistant\s*:",
    r"(?i)\bDROP\b",
    r"(?i)\bDELETE\b",
    r"(?i)\bTRUNCATE\b",
    r"(?i)\bUPDATE\b.*\bSET\b",
    r"(?i)\bINSERT\b.*\bINTO\b",
    r"(?i);\s*(DROP|DELETE|TRUNCATE|UPDATE|INSERT)",
    r"(?i)execute\s+immediately",
    r"(?i)override\s+safety",
];

/// A question that survived sanitization.
#[derive(Debug, Clone)]
pub struct CleanQuestion {
    pub text: String,
    /// Non-fatal notes, e.g. that the question was truncated.
    pub warnings: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeRejection {
    #[error("question cannot be empty")]
    Empty,
    #[error("potentially malicious input detected")]
    InjectionDetected,
}

pub struct InputSanitizer {
    injection: Vec<Regex>,
    tags: Regex,
    control: Regex,
    whitespace: Regex,
}

impl InputSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        let injection = INJECTION_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            injection,
            tags: Regex::new(r"<[^>]*>")?,
            control: Regex::new(r"[\x00-\x1F\x7F]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Sanitizes a user question, rejecting it when it is empty or matches
    /// an injection pattern.
    pub fn sanitize(&self, question: &str) -> Result<CleanQuestion, SanitizeRejection> {
        if question.trim().is_empty() {
            return Err(SanitizeRejection::Empty);
        }

        let mut warnings = Vec::new();
        let mut question = question.to_string();

        if question.chars().count() > MAX_QUESTION_LENGTH {
            question = question.chars().take(MAX_QUESTION_LENGTH).collect();
            warnings.push(format!(
                "Question truncated to {MAX_QUESTION_LENGTH} characters"
            ));
        }

        for pattern in &self.injection {
            if pattern.is_match(&question) {
                warn!(pattern = %pattern.as_str(), "blocked question matching injection pattern");
                return Err(SanitizeRejection::InjectionDetected);
            }
        }

        let question = self.tags.replace_all(&question, "");
        let question = self.control.replace_all(&question, "");
        let question = self
            .whitespace
            .replace_all(question.trim(), " ")
            .into_owned();

        if question.is_empty() {
            return Err(SanitizeRejection::Empty);
        }

        Ok(CleanQuestion {
            text: question,
            warnings,
        })
    }
}
