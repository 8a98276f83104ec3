//! SQL safety validation.
//!
//! The last line of defense between model-produced text and the database.
//! The validator is pattern-based, not a SQL parser: it rejects anything
//! matching a blocklist, forces a `SELECT`-only single statement, bounds
//! every query with a `LIMIT`, and allowlist-checks every referenced
//! table. Heavily obfuscated identifiers or computed table expressions can
//! evade the table extraction; that is a documented heuristic limit.

use crate::types::ValidationOutcome;
use regex::Regex;
use std::collections::HashSet;

/// Keywords that could modify data or state, checked as whole words.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT",
    "UPDATE",
    "DELETE",
    "DROP",
    "ALTER",
    "TRUNCATE",
    "CREATE",
    "REPLACE",
    "RENAME",
    "GRANT",
    "REVOKE",
    "LOCK",
    "UNLOCK",
    "CALL",
    "EXECUTE",
    "EXEC",
    "INTO OUTFILE",
    "INTO DUMPFILE",
    "LOAD_FILE",
    "BENCHMARK",
    "SLEEP",
    "WAITFOR",
    "SET",
    "SHOW GRANTS",
];

/// Dangerous functions checked as plain substrings, catching spellings
/// that slip past the whole-word keyword scan.
const FORBIDDEN_FUNCTIONS: &[&str] = &[
    "LOAD_FILE",
    "INTO OUTFILE",
    "INTO DUMPFILE",
    "BENCHMARK",
    "SLEEP",
    "GET_LOCK",
    "RELEASE_LOCK",
    "IS_FREE_LOCK",
    "IS_USED_LOCK",
    "SYS_EXEC",
    "SYS_EVAL",
];

/// Nested-query width limit: more `SELECT` occurrences than this rejects
/// the query as potentially resource-exhausting.
const MAX_SELECT_OCCURRENCES: usize = 5;

pub struct SqlSafetyValidator {
    max_rows: u32,
    table_prefix: String,
    keyword_patterns: Vec<(&'static str, Regex)>,
    whitespace: Regex,
    select_start: Regex,
    multi_statement: Regex,
    union_select: Regex,
    comment_marker: Regex,
    dash_comment: Regex,
    hash_comment: Regex,
    block_comment: Regex,
    limit_clause: Regex,
    from_table: Regex,
    join_table: Regex,
}

impl SqlSafetyValidator {
    pub fn new(max_rows: u32, table_prefix: &str) -> Result<Self, regex::Error> {
        let keyword_patterns = FORBIDDEN_KEYWORDS
            .iter()
            .map(|kw| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).map(|re| (*kw, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            max_rows,
            table_prefix: table_prefix.to_string(),
            keyword_patterns,
            whitespace: Regex::new(r"\s+")?,
            select_start: Regex::new(r"(?i)^\s*SELECT\b")?,
            multi_statement: Regex::new(r";\s*\w")?,
            union_select: Regex::new(r"(?i)\bUNION\s+(ALL\s+)?SELECT\b")?,
            comment_marker: Regex::new(r"(--|#|/\*)")?,
            dash_comment: Regex::new(r"(?m)--.*$")?,
            hash_comment: Regex::new(r"(?m)#.*$")?,
            block_comment: Regex::new(r"(?s)/\*.*?\*/")?,
            limit_clause: Regex::new(r"(?i)\bLIMIT\s+(\d+)")?,
            from_table: Regex::new(r"(?i)\bFROM\s+([`{}\w]+)")?,
            join_table: Regex::new(r"(?i)\bJOIN\s+([`{}\w]+)")?,
        })
    }

    /// Validates a raw SQL string against the allowed table set.
    ///
    /// All rule violations accumulate into `errors` rather than
    /// short-circuiting, so the caller sees every problem at once.
    pub fn validate(&self, sql: &str, allowed_tables: &HashSet<String>) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut normalized = self.normalize(sql);

        for (keyword, pattern) in &self.keyword_patterns {
            if pattern.is_match(&normalized) {
                errors.push(format!(
                    "Forbidden keyword detected: {keyword}. Only SELECT queries are allowed."
                ));
            }
        }

        let upper = normalized.to_uppercase();
        for func in FORBIDDEN_FUNCTIONS {
            if upper.contains(func) {
                errors.push(format!("Forbidden function detected: {func}"));
            }
        }

        if !self.select_start.is_match(&normalized) {
            errors.push("Query must start with SELECT.".to_string());
        }

        // Stacked-query injection: a semicolon followed by another statement.
        if self.multi_statement.is_match(&normalized) {
            errors.push("Multiple SQL statements are not allowed.".to_string());
        }

        // UNION is legal but a common injection vector; flag it.
        if self.union_select.is_match(&normalized) {
            warnings.push("UNION SELECT detected. Ensure this is intentional.".to_string());
        }

        // Comments can hide a second statement from naive validators.
        if self.comment_marker.is_match(&normalized) {
            warnings.push("SQL comments detected and will be removed.".to_string());
            normalized = self.remove_comments(&normalized);
        }

        if normalized.to_uppercase().matches("SELECT").count() > MAX_SELECT_OCCURRENCES {
            errors.push("Potentially dangerous subquery detected.".to_string());
        }

        if !self.limit_clause.is_match(&normalized) {
            normalized = format!("{normalized} LIMIT {}", self.max_rows);
            warnings.push(format!(
                "LIMIT {} automatically added for safety.",
                self.max_rows
            ));
        }

        if let Some(caps) = self.limit_clause.captures(&normalized) {
            let requested: u64 = caps[1].parse().unwrap_or(u64::MAX);
            if requested > u64::from(self.max_rows) {
                normalized = self
                    .limit_clause
                    .replace(&normalized, format!("LIMIT {}", self.max_rows))
                    .into_owned();
                warnings.push(format!("LIMIT reduced to maximum {} rows.", self.max_rows));
            }
        }

        let unauthorized = self.unauthorized_tables(&normalized, allowed_tables);
        if !unauthorized.is_empty() {
            errors.push(format!(
                "Invalid or unauthorized table(s): {}",
                unauthorized.join(", ")
            ));
        }

        ValidationOutcome {
            accepted: errors.is_empty(),
            normalized_sql: normalized,
            errors,
            warnings,
        }
    }

    fn normalize(&self, sql: &str) -> String {
        let collapsed = self.whitespace.replace_all(sql.trim(), " ");
        collapsed.trim_end_matches(';').trim_end().to_string()
    }

    fn remove_comments(&self, sql: &str) -> String {
        let sql = self.dash_comment.replace_all(sql, "");
        let sql = self.hash_comment.replace_all(&sql, "");
        let sql = self.block_comment.replace_all(&sql, "");
        sql.trim().to_string()
    }

    /// Extracts every identifier following `FROM` or `JOIN`, in order of
    /// first appearance.
    pub fn extract_tables(&self, sql: &str) -> Vec<String> {
        let mut tables = Vec::new();

        for re in [&self.from_table, &self.join_table] {
            for caps in re.captures_iter(sql) {
                let table = caps[1].trim_matches('`').to_string();
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }

        tables
    }

    fn unauthorized_tables(
        &self,
        sql: &str,
        allowed_tables: &HashSet<String>,
    ) -> Vec<String> {
        self.extract_tables(sql)
            .into_iter()
            .filter(|table| {
                let actual = table.replace("{prefix}", &self.table_prefix);
                !allowed_tables.contains(&actual)
            })
            .collect()
    }
}
