//! Lexical policy check for learner queries.
//!
//! This is a textual allow-list, not a parser. Keyword matching is substring
//! based over the whole text, so an identifier such as `created_at` trips the
//! `CREATE` rule. Queries pass only when every rule below holds, checked in
//! order with the first failure reported:
//!
//! 1. the text is present and not blank
//! 2. no disallowed keyword occurs anywhere (case-insensitive)
//! 3. the trimmed text starts with `SELECT`
//! 4. at most one `;`, and only as the final character
//! 5. the trimmed text is within the length limit
//! 6. no injection heuristic matches

use crate::error::{GatewayError, GatewayResult};
use regex::Regex;
use std::sync::LazyLock;

/// Built-in disallowed keywords, in scan order.
pub const DEFAULT_DISALLOWED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL", "DECLARE", "SET", "SHOW", "DESCRIBE", "EXPLAIN", "ANALYZE",
];

const DEFAULT_HEURISTIC_PATTERNS: &[(&str, &str)] = &[
    ("inline_comment", r"--"),
    ("block_comment", r"/\*"),
    ("xp_cmdshell", r"(?i)\bxp_cmdshell\b"),
    ("sp_executesql", r"(?i)\bsp_executesql\b"),
    ("union_select", r"(?i)\bunion\s+select\b"),
    ("or_tautology", r"(?i)\bor\s+1\s*=\s*1\b"),
    ("and_tautology", r"(?i)\band\s+1\s*=\s*1\b"),
];

static DEFAULT_HEURISTICS: LazyLock<Vec<Heuristic>> = LazyLock::new(|| {
    DEFAULT_HEURISTIC_PATTERNS
        .iter()
        .map(|(name, pattern)| Heuristic {
            name: (*name).to_string(),
            pattern: Regex::new(pattern).expect("built-in heuristic pattern is valid"),
        })
        .collect()
});

/// A named injection pattern.
#[derive(Debug, Clone)]
pub struct Heuristic {
    name: String,
    pattern: Regex,
}

impl Heuristic {
    pub fn new(name: impl Into<String>, pattern: &str) -> GatewayResult<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            GatewayError::configuration(format!("Invalid injection pattern '{name}': {e}"))
        })?;
        Ok(Self { name, pattern })
    }

    /// The built-in heuristic list.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_HEURISTICS.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Rule set the validator enforces.
#[derive(Debug, Clone)]
pub struct QueryPolicy {
    disallowed_keywords: Vec<String>,
    heuristics: Vec<Heuristic>,
    max_query_length: usize,
}

impl QueryPolicy {
    /// Keywords are stored upper-cased; order is preserved.
    pub fn new(
        disallowed_keywords: Vec<String>,
        heuristics: Vec<Heuristic>,
        max_query_length: usize,
    ) -> Self {
        Self {
            disallowed_keywords: disallowed_keywords
                .into_iter()
                .map(|k| k.to_uppercase())
                .collect(),
            heuristics,
            max_query_length,
        }
    }

    pub fn disallowed_keywords(&self) -> &[String] {
        &self.disallowed_keywords
    }

    pub fn heuristics(&self) -> &[Heuristic] {
        &self.heuristics
    }

    pub fn max_query_length(&self) -> usize {
        self.max_query_length
    }
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_DISALLOWED_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            Heuristic::defaults(),
            crate::models::DEFAULT_MAX_QUERY_LENGTH,
        )
    }
}

/// The rule a rejected query broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Query cannot be empty")]
    Empty,

    #[error("Dangerous operation detected: {0}. Only SELECT queries are allowed.")]
    DisallowedKeyword(String),

    #[error("Only SELECT queries are allowed")]
    NotSelect,

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Query is too long. Maximum length is {max} characters.")]
    TooLong { max: usize },

    /// The heuristic name is kept for logs and never rendered.
    #[error("Potentially unsafe query pattern detected")]
    UnsafePattern { heuristic: String },
}

impl PolicyViolation {
    /// Name of the matching heuristic, for unsafe-pattern rejections.
    pub fn heuristic(&self) -> Option<&str> {
        match self {
            Self::UnsafePattern { heuristic } => Some(heuristic),
            _ => None,
        }
    }
}

/// Result of checking one query against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Rejected(PolicyViolation),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The diagnostic shown to the client, if rejected.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Rejected(violation) => Some(violation.to_string()),
        }
    }
}

/// Applies a [`QueryPolicy`] to raw query text.
#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    policy: QueryPolicy,
}

impl QueryValidator {
    pub fn new(policy: QueryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &QueryPolicy {
        &self.policy
    }

    /// Check `query`. `None` stands for an absent or non-textual value.
    pub fn validate(&self, query: Option<&str>) -> ValidationOutcome {
        match self.check(query) {
            Ok(()) => ValidationOutcome::Valid,
            Err(violation) => ValidationOutcome::Rejected(violation),
        }
    }

    fn check(&self, query: Option<&str>) -> Result<(), PolicyViolation> {
        let text = query.unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PolicyViolation::Empty);
        }

        let upper = text.to_uppercase();
        if let Some(keyword) = self
            .policy
            .disallowed_keywords
            .iter()
            .find(|k| upper.contains(k.as_str()))
        {
            return Err(PolicyViolation::DisallowedKeyword(keyword.clone()));
        }

        if !upper.trim_start().starts_with("SELECT") {
            return Err(PolicyViolation::NotSelect);
        }

        let terminators = trimmed.matches(';').count();
        if terminators > 1 || (terminators == 1 && !trimmed.ends_with(';')) {
            return Err(PolicyViolation::MultipleStatements);
        }

        if trimmed.chars().count() > self.policy.max_query_length {
            return Err(PolicyViolation::TooLong {
                max: self.policy.max_query_length,
            });
        }

        if let Some(heuristic) = self.policy.heuristics.iter().find(|h| h.is_match(trimmed)) {
            return Err(PolicyViolation::UnsafePattern {
                heuristic: heuristic.name.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(query: &str) -> ValidationOutcome {
        QueryValidator::default().validate(Some(query))
    }

    fn rejection(query: &str) -> PolicyViolation {
        match validate(query) {
            ValidationOutcome::Rejected(v) => v,
            ValidationOutcome::Valid => panic!("expected rejection for {query:?}"),
        }
    }

    #[test]
    fn test_accepts_simple_select() {
        assert!(validate("SELECT * FROM employees WHERE salary > 50000").is_valid());
        assert!(validate("  select name from employees;  ").is_valid());
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(rejection(""), PolicyViolation::Empty);
        assert_eq!(rejection(" \n\t "), PolicyViolation::Empty);
        let outcome = QueryValidator::default().validate(None);
        assert_eq!(outcome.message().as_deref(), Some("Query cannot be empty"));
    }

    #[test]
    fn test_disallowed_keyword_named() {
        let outcome = validate("DROP TABLE employees");
        assert_eq!(
            outcome.message().as_deref(),
            Some("Dangerous operation detected: DROP. Only SELECT queries are allowed.")
        );
    }

    #[test]
    fn test_keyword_scan_order_and_case() {
        assert_eq!(
            rejection("select 1; delete from t; drop table t"),
            PolicyViolation::DisallowedKeyword("DROP".to_string())
        );
        assert_eq!(
            rejection("SELECT * FROM t WHERE x IN (SELECT y FROM u) -- analyze"),
            PolicyViolation::DisallowedKeyword("ANALYZE".to_string())
        );
    }

    #[test]
    fn test_keyword_substring_false_positive() {
        assert_eq!(
            rejection("SELECT created_at FROM orders"),
            PolicyViolation::DisallowedKeyword("CREATE".to_string())
        );
        assert_eq!(
            rejection("SELECT * FROM t LIMIT 5 OFFSET 10"),
            PolicyViolation::DisallowedKeyword("SET".to_string())
        );
    }

    #[test]
    fn test_must_start_with_select() {
        assert_eq!(rejection("WITH x AS (SELECT 1) SELECT * FROM x"), PolicyViolation::NotSelect);
        assert_eq!(rejection("VALUES (1)"), PolicyViolation::NotSelect);
    }

    #[test]
    fn test_statement_terminators() {
        assert!(validate("SELECT 1;").is_valid());
        assert_eq!(rejection("SELECT 1; SELECT 2"), PolicyViolation::MultipleStatements);
        assert_eq!(rejection("SELECT 1;;"), PolicyViolation::MultipleStatements);
        assert_eq!(rejection("SELECT ';' FROM t"), PolicyViolation::MultipleStatements);
    }

    #[test]
    fn test_length_limit_counts_trimmed_chars() {
        let padding = "x".repeat(4980);
        let at_limit = format!("SELECT '{padding}' AS v");
        let len = at_limit.chars().count();
        let validator = QueryValidator::new(QueryPolicy::new(
            vec!["DROP".to_string()],
            Vec::new(),
            len,
        ));
        assert!(validator.validate(Some(&format!("   {at_limit}   "))).is_valid());

        let over = format!("{at_limit}x");
        assert_eq!(
            validator.validate(Some(&over)).message().as_deref(),
            Some(format!("Query is too long. Maximum length is {len} characters.").as_str())
        );
    }

    #[test]
    fn test_heuristics_in_order() {
        let cases = [
            ("SELECT 1 -- hello", "inline_comment"),
            ("SELECT /* hi */ 1", "block_comment"),
            ("SELECT xp_cmdshell FROM t", "xp_cmdshell"),
            ("SELECT sp_executesql FROM t", "sp_executesql"),
            ("SELECT a FROM t UNION   SELECT b FROM u", "union_select"),
            ("SELECT * FROM users WHERE name = 'a' OR 1=1", "or_tautology"),
            ("SELECT * FROM users WHERE id = 2 and 1 = 1", "and_tautology"),
        ];
        // No keywords, so `sp_executesql` is not caught by EXEC first.
        let validator = QueryValidator::new(QueryPolicy::new(Vec::new(), Heuristic::defaults(), 5000));
        for (query, expected) in cases {
            let violation = match validator.validate(Some(query)) {
                ValidationOutcome::Rejected(v) => v,
                ValidationOutcome::Valid => panic!("expected rejection for {query:?}"),
            };
            assert_eq!(violation.heuristic(), Some(expected), "query: {query}");
            assert_eq!(violation.to_string(), "Potentially unsafe query pattern detected");
        }
    }

    #[test]
    fn test_union_all_select_is_allowed() {
        assert!(validate("SELECT a FROM t UNION ALL SELECT b FROM u").is_valid());
    }

    #[test]
    fn test_custom_heuristic() {
        let policy = QueryPolicy::new(
            Vec::new(),
            vec![Heuristic::new("sleep", r"(?i)pg_sleep").unwrap()],
            100,
        );
        let validator = QueryValidator::new(policy);
        let outcome = validator.validate(Some("SELECT PG_SLEEP(10)"));
        match outcome {
            ValidationOutcome::Rejected(v) => assert_eq!(v.heuristic(), Some("sleep")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_heuristic_is_configuration_error() {
        let err = Heuristic::new("bad", "(").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
        assert!(err.to_string().contains("bad"));
    }
}
