//! Read-only statement validation.
//!
//! The warehouse speaks a Spark SQL dialect, and the gate must hold for
//! statements no parser fully understands. Validation is therefore lexical:
//! sqlparser's tokenizer with the Databricks dialect splits the text, and each
//! rule inspects the resulting stream of words, literals, quoted identifiers,
//! comments and punctuation. Unclosed quoting, which the tokenizer refuses, and
//! escaped or doubled quotes inside literals are flagged on top of it. Keywords only ever match whole word
//! tokens, so identifiers such as `f1_silver_updated_results` or
//! `selected_drivers` never trip the mutation scan.
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! 1. the statement starts with `SELECT`, `WITH`, `SHOW` or `DESCRIBE`
//! 2. nothing follows a statement separator
//! 3. no mutating verb appears anywhere in the statement
//! 4. no classic injection pattern is present
//! 5. only the configured catalog/schema and no administrative functions are touched
//!
//! Rule 4 is a heuristic layer. The allow-list in rule 1 together with rules 2
//! and 3 carry the actual guarantee.

use crate::error::{GatewayError, GatewayResult};
use serde::Serialize;
use sqlparser::dialect::DatabricksDialect;
use sqlparser::tokenizer::{
    Location, Token as SqlToken, TokenWithSpan, Tokenizer, TokenizerError, Whitespace,
};

/// Default upper bound on statement length, in characters.
pub const DEFAULT_MAX_STATEMENT_LENGTH: usize = 10_000;

const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC"];

const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "MERGE", "COPY", "EXECUTE", "EXEC", "CALL", "VACUUM", "OPTIMIZE", "RESTORE", "MSCK", "UNDROP",
    "LOAD",
];

/// Functions that reach outside plain table reads, either to external systems or
/// to tables named inside string arguments.
const BLOCKED_FUNCTIONS: &[&str] = &[
    "identifier",
    "table_changes",
    "event_log",
    "reflect",
    "java_method",
    "try_reflect",
    "secret",
    "try_secret",
    "list_secrets",
    "read_files",
    "read_kafka",
    "read_kinesis",
    "read_pubsub",
    "read_pulsar",
    "read_statestore",
    "http_request",
    "load_file",
];

const ADMIN_SHOW_TARGETS: &[&str] = &[
    "CATALOGS",
    "GRANTS",
    "GRANT",
    "USERS",
    "GROUPS",
    "CREDENTIALS",
    "STORAGE",
    "EXTERNAL",
    "SHARES",
    "PROVIDERS",
    "RECIPIENTS",
    "CONNECTIONS",
];

const ADMIN_DESCRIBE_TARGETS: &[&str] = &[
    "CATALOG",
    "CREDENTIAL",
    "STORAGE",
    "EXTERNAL",
    "SHARE",
    "PROVIDER",
    "RECIPIENT",
    "CONNECTION",
];

/// Keywords that end the table list of a `FROM` clause.
const FROM_TERMINATORS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "INTERSECT", "EXCEPT", "MINUS", "ON",
    "USING", "WINDOW", "QUALIFY", "SELECT", "LATERAL", "PIVOT", "UNPIVOT", "SORT", "CLUSTER",
    "DISTRIBUTE", "OFFSET",
];

const INFORMATION_SCHEMA: &str = "information_schema";

/// Why a statement was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectionKind {
    DisallowedStatementKind,
    MultipleStatements,
    EmbeddedMutation,
    SuspiciousPattern,
    ScopeViolation,
    EmptyStatement,
    StatementTooLong,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisallowedStatementKind => "DisallowedStatementKind",
            Self::MultipleStatements => "MultipleStatements",
            Self::EmbeddedMutation => "EmbeddedMutation",
            Self::SuspiciousPattern => "SuspiciousPattern",
            Self::ScopeViolation => "ScopeViolation",
            Self::EmptyStatement => "EmptyStatement",
            Self::StatementTooLong => "StatementTooLong",
        }
    }

    /// How the caller can correct the statement.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DisallowedStatementKind => {
                "Only SELECT, WITH, SHOW and DESCRIBE statements can be run"
            }
            Self::MultipleStatements => "Submit exactly one statement without a trailing second one",
            Self::EmbeddedMutation => {
                "Remove data-modifying keywords; quote identifiers with backticks if a column shares a keyword's name"
            }
            Self::SuspiciousPattern => {
                "Rewrite the statement without comment tricks, escaped quotes, tautologies or UNION SELECT (UNION ALL is accepted)"
            }
            Self::ScopeViolation => {
                "Query only tables in the configured catalog and schema, without administrative functions"
            }
            Self::EmptyStatement => "Provide a SQL statement",
            Self::StatementTooLong => "Shorten the statement or split the analysis into smaller queries",
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept/reject decision for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RejectionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            kind: None,
            reason: None,
        }
    }

    pub fn reject(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            kind: Some(kind),
            reason: Some(reason.into()),
        }
    }

    /// Convert into a `Result`, turning a rejection into [`GatewayError::Rejected`].
    pub fn into_result(self) -> GatewayResult<()> {
        match (self.allowed, self.kind) {
            (true, _) => Ok(()),
            (false, Some(kind)) => Err(GatewayError::rejected(
                kind,
                self.reason.unwrap_or_else(|| kind.suggestion().to_string()),
            )),
            (false, None) => Err(GatewayError::internal("rejection without a kind")),
        }
    }
}

/// Scope and size limits the validator enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorPolicy {
    pub max_length: usize,
    pub catalog: String,
    pub schema: String,
    /// Catalogs readable in full besides the configured one.
    pub extra_catalogs: Vec<String>,
}

impl ValidatorPolicy {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            max_length: DEFAULT_MAX_STATEMENT_LENGTH,
            catalog: catalog.into().to_lowercase(),
            schema: schema.into().to_lowercase(),
            extra_catalogs: Vec::new(),
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_extra_catalogs<I, S>(mut self, catalogs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_catalogs = catalogs
            .into_iter()
            .map(|c| c.as_ref().to_lowercase())
            .collect();
        self
    }

    fn is_extra_catalog(&self, name: &str) -> bool {
        self.extra_catalogs.iter().any(|c| c == name)
    }

    fn is_catalog(&self, name: &str) -> bool {
        name == self.catalog || self.is_extra_catalog(name)
    }

    fn is_schema(&self, name: &str) -> bool {
        name == self.schema || name == INFORMATION_SCHEMA
    }
}

impl Default for ValidatorPolicy {
    fn default() -> Self {
        Self::new("workspace", "f1")
    }
}

/// Validate a statement against the read-only policy.
///
/// Pure and deterministic: the same text and policy always give the same verdict.
///
/// ```
/// use f1_mcp_gateway::tools::sql_validator::{validate, RejectionKind, ValidatorPolicy};
///
/// let policy = ValidatorPolicy::default();
/// assert!(validate("SELECT * FROM f1_silver_updated_results", &policy).allowed);
///
/// let verdict = validate("SELECT 1; DELETE FROM x", &policy);
/// assert_eq!(verdict.kind, Some(RejectionKind::MultipleStatements));
/// ```
pub fn validate(sql: &str, policy: &ValidatorPolicy) -> ValidationVerdict {
    match check(sql, policy) {
        Ok(()) => ValidationVerdict::allow(),
        Err(Rejection { kind, reason }) => ValidationVerdict::reject(kind, reason),
    }
}

/// Validate and return `Err(GatewayError::Rejected)` on rejection.
pub fn validate_readonly(sql: &str, policy: &ValidatorPolicy) -> GatewayResult<()> {
    validate(sql, policy).into_result()
}

/// Case-folded, whitespace-collapsed form of a statement with comments removed.
///
/// Literals and quoted identifiers keep their original spelling.
pub fn normalize(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pending_space = false;
    for token in tokenize(sql) {
        if token.is_comment() {
            pending_space = true;
            continue;
        }
        if (pending_space || token.gap_before) && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        match token.kind {
            TokenKind::Word => out.push_str(&token.text.to_lowercase()),
            _ => out.push_str(token.text),
        }
    }
    out
}

struct Rejection {
    kind: RejectionKind,
    reason: String,
}

fn reject<T>(kind: RejectionKind, reason: impl Into<String>) -> Result<T, Rejection> {
    Err(Rejection {
        kind,
        reason: reason.into(),
    })
}

fn check(sql: &str, policy: &ValidatorPolicy) -> Result<(), Rejection> {
    if sql.trim().is_empty() {
        return reject(RejectionKind::EmptyStatement, "Statement is empty");
    }

    let length = sql.chars().count();
    if length > policy.max_length {
        return reject(
            RejectionKind::StatementTooLong,
            format!(
                "Statement is {} characters long; the limit is {}",
                length, policy.max_length
            ),
        );
    }

    let tokens = tokenize(sql);
    let code: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_comment()).collect();

    check_statement_kind(&code)?;
    check_single_statement(&tokens)?;
    check_mutations(&code)?;
    check_suspicious(sql, &tokens, &code)?;
    check_scope(&code, policy)?;
    Ok(())
}

fn check_statement_kind(code: &[&Token<'_>]) -> Result<(), Rejection> {
    let Some(first) = code.first() else {
        return reject(
            RejectionKind::EmptyStatement,
            "Statement contains only comments",
        );
    };
    if first.kind == TokenKind::Word && first.is_any_word(ALLOWED_LEADING_KEYWORDS) {
        return Ok(());
    }
    reject(
        RejectionKind::DisallowedStatementKind,
        format!(
            "Statements must start with SELECT, WITH, SHOW or DESCRIBE; found '{}'",
            snippet(first.text)
        ),
    )
}

fn check_single_statement(tokens: &[Token<'_>]) -> Result<(), Rejection> {
    let Some(separator) = tokens.iter().position(|t| t.kind == TokenKind::Semicolon) else {
        return Ok(());
    };
    match tokens.get(separator + 1) {
        Some(next) => reject(
            RejectionKind::MultipleStatements,
            format!(
                "Only one statement is allowed; found '{}' after ';'",
                snippet(next.text)
            ),
        ),
        None => Ok(()),
    }
}

fn check_mutations(code: &[&Token<'_>]) -> Result<(), Rejection> {
    for (i, token) in code.iter().enumerate() {
        if token.kind != TokenKind::Word || !token.is_any_word(MUTATING_KEYWORDS) {
            continue;
        }
        let prev = i.checked_sub(1).and_then(|p| code.get(p));
        let next = code.get(i + 1);
        // Parts of a dotted name are identifiers, never verbs.
        if prev.is_some_and(|t| t.kind == TokenKind::Dot)
            || next.is_some_and(|t| t.kind == TokenKind::Dot)
        {
            continue;
        }
        // SHOW CREATE TABLE only prints DDL.
        if token.is_word("CREATE") && prev.is_some_and(|t| t.is_word("SHOW")) {
            continue;
        }
        return reject(
            RejectionKind::EmbeddedMutation,
            format!(
                "Keyword '{}' modifies data and is not allowed in a read-only statement",
                token.text.to_uppercase()
            ),
        );
    }
    Ok(())
}

fn check_suspicious(sql: &str, tokens: &[Token<'_>], code: &[&Token<'_>]) -> Result<(), Rejection> {
    if sql
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return reject(
            RejectionKind::SuspiciousPattern,
            "Statement contains control characters",
        );
    }

    for (i, token) in tokens.iter().enumerate() {
        if !token.terminated {
            let what = match token.kind {
                TokenKind::BlockComment => "block comment",
                TokenKind::QuotedIdent => "quoted identifier",
                TokenKind::Str => "string literal",
                _ => "statement text",
            };
            return reject(
                RejectionKind::SuspiciousPattern,
                format!("Unbalanced quoting: unterminated {}", what),
            );
        }
        if token.escaped_quote {
            return reject(
                RejectionKind::SuspiciousPattern,
                "Escaped quote inside a string literal",
            );
        }
        if token.doubled_quote {
            return reject(
                RejectionKind::SuspiciousPattern,
                "Stacked quote sequence inside a string literal",
            );
        }
        if token.kind == TokenKind::Str
            && i > 0
            && tokens[i - 1].kind == TokenKind::Str
            && !token.gap_before
        {
            return reject(
                RejectionKind::SuspiciousPattern,
                "Stacked quote sequence between string literals",
            );
        }
    }

    for (i, token) in code.iter().enumerate() {
        if token.is_word("OR") && tautology_at(code, i + 1).is_some() {
            return reject(
                RejectionKind::SuspiciousPattern,
                "Always-true OR condition",
            );
        }
        if let Some(end) = tautology_at(code, i).filter(|_| token.is_literal()) {
            let end_offset = code[end].start;
            if tokens
                .iter()
                .any(|t| t.is_comment() && t.start > end_offset)
            {
                return reject(
                    RejectionKind::SuspiciousPattern,
                    "Always-true comparison followed by a comment",
                );
            }
        }
        let next = code.get(i + 1);
        if token.is_word("UNION") && next.is_some_and(|t| t.is_word("SELECT")) {
            return reject(
                RejectionKind::SuspiciousPattern,
                "UNION SELECT is not accepted; use UNION ALL",
            );
        }
        if token.is_word("INTO") && next.is_some_and(|t| t.is_any_word(&["OUTFILE", "DUMPFILE"])) {
            return reject(
                RejectionKind::SuspiciousPattern,
                "Writing query output to files is not allowed",
            );
        }
    }
    Ok(())
}

/// If an always-true comparison starts at `start`, the index of its last token.
fn tautology_at(code: &[&Token<'_>], start: usize) -> Option<usize> {
    let mut i = start;
    while code.get(i).is_some_and(|t| t.kind == TokenKind::LParen) {
        i += 1;
    }
    let first = code.get(i)?;
    if first.is_word("TRUE") {
        return Some(i);
    }
    let op = code.get(i + 1)?;
    let second = code.get(i + 2)?;
    if first.is_literal()
        && second.is_literal()
        && op.kind == TokenKind::Operator
        && matches!(op.text, "=" | "==" | "<=>")
        && literal_eq(first, second)
    {
        return Some(i + 2);
    }
    None
}

fn literal_eq(a: &Token<'_>, b: &Token<'_>) -> bool {
    let (a, b) = (a.literal_text(), b.literal_text());
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

fn check_scope(code: &[&Token<'_>], policy: &ValidatorPolicy) -> Result<(), Rejection> {
    let is_show = code.first().is_some_and(|t| t.is_word("SHOW"));
    let is_describe = code
        .first()
        .is_some_and(|t| t.is_any_word(&["DESCRIBE", "DESC"]));

    if is_show {
        check_show(code, policy)?;
    }
    if is_describe {
        check_describe(code, policy)?;
    }

    let mut in_from = is_describe;
    let mut from_stack: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < code.len() {
        let token = code[i];
        match token.kind {
            TokenKind::LParen => {
                from_stack.push(in_from);
                in_from = false;
                i += 1;
                continue;
            }
            TokenKind::RParen => {
                in_from = from_stack.pop().unwrap_or(false);
                i += 1;
                continue;
            }
            TokenKind::Word => {
                if token.is_any_word(&["FROM", "JOIN"]) {
                    in_from = !is_show;
                } else if token.is_any_word(FROM_TERMINATORS) {
                    in_from = false;
                }
                let after_dot = i > 0 && code[i - 1].kind == TokenKind::Dot;
                let is_call = code.get(i + 1).is_some_and(|t| t.kind == TokenKind::LParen);
                if is_call && !after_dot && token.is_any_word(BLOCKED_FUNCTIONS) {
                    return reject(
                        RejectionKind::ScopeViolation,
                        format!(
                            "Function '{}' is outside the analytics scope",
                            token.text.to_lowercase()
                        ),
                    );
                }
            }
            _ => {}
        }

        if token.is_name_part() && !(i > 0 && code[i - 1].kind == TokenKind::Dot) {
            let (parts, end) = dotted_name(code, i);
            if parts.len() >= 3 {
                check_qualified_name(&parts, policy)?;
            } else if parts.len() == 2 && in_from && !policy.is_schema(&parts[0]) {
                return reject(
                    RejectionKind::ScopeViolation,
                    format!(
                        "Schema '{}' is outside the configured scope ({}.{})",
                        parts[0], policy.catalog, policy.schema
                    ),
                );
            }
            i = end;
            continue;
        }
        i += 1;
    }
    Ok(())
}

/// Checks names of three or more parts: `catalog.schema.table[...]` or `schema.table.column`.
fn check_qualified_name(parts: &[String], policy: &ValidatorPolicy) -> Result<(), Rejection> {
    let first = parts[0].as_str();
    if first == policy.catalog {
        if policy.is_schema(&parts[1]) {
            return Ok(());
        }
        return reject(
            RejectionKind::ScopeViolation,
            format!(
                "Schema '{}.{}' is outside the configured scope ({}.{})",
                first, parts[1], policy.catalog, policy.schema
            ),
        );
    }
    if policy.is_extra_catalog(first) || first == policy.schema {
        return Ok(());
    }
    reject(
        RejectionKind::ScopeViolation,
        format!(
            "Catalog '{}' is outside the configured scope ({})",
            first, policy.catalog
        ),
    )
}

fn check_show(code: &[&Token<'_>], policy: &ValidatorPolicy) -> Result<(), Rejection> {
    let Some(target) = code.get(1) else {
        return Ok(());
    };
    if target.is_any_word(ADMIN_SHOW_TARGETS) {
        return reject(
            RejectionKind::ScopeViolation,
            format!(
                "SHOW {} exposes account administration data",
                target.text.to_uppercase()
            ),
        );
    }

    // SHOW CREATE TABLE t, SHOW TBLPROPERTIES t, SHOW PARTITIONS t
    let object = if target.is_word("CREATE") {
        code.get(2).filter(|t| t.is_word("TABLE")).map(|_| 3)
    } else if target.is_any_word(&["TBLPROPERTIES", "PARTITIONS"]) {
        Some(2)
    } else {
        None
    };
    if let Some(pos) = object.filter(|&p| code.get(p).is_some_and(|t| t.is_name_part())) {
        let (parts, _) = dotted_name(code, pos);
        if !table_reference_in_scope(&parts, policy) {
            return out_of_scope(&parts, policy);
        }
    }

    // Every IN/FROM qualifies: SHOW COLUMNS IN t IN schema names the schema second
    let mut qualifiers = 0;
    for (pos, token) in code.iter().enumerate() {
        if !token.is_any_word(&["IN", "FROM"])
            || !code.get(pos + 1).is_some_and(|t| t.is_name_part())
        {
            continue;
        }
        let (parts, _) = dotted_name(code, pos + 1);
        let in_scope = if target.is_any_word(&["SCHEMAS", "DATABASES"]) {
            parts.len() == 1 && policy.is_catalog(&parts[0])
        } else if target.is_any_word(&["TABLES", "VIEWS", "FUNCTIONS", "VOLUMES", "TABLE"])
            || (target.is_word("COLUMNS") && qualifiers > 0)
        {
            schema_reference_in_scope(&parts, policy)
        } else {
            table_reference_in_scope(&parts, policy)
        };
        if !in_scope {
            return out_of_scope(&parts, policy);
        }
        qualifiers += 1;
    }
    Ok(())
}

fn out_of_scope(parts: &[String], policy: &ValidatorPolicy) -> Result<(), Rejection> {
    reject(
        RejectionKind::ScopeViolation,
        format!(
            "'{}' is outside the configured scope ({}.{})",
            parts.join("."),
            policy.catalog,
            policy.schema
        ),
    )
}

fn check_describe(code: &[&Token<'_>], policy: &ValidatorPolicy) -> Result<(), Rejection> {
    let Some(target) = code.get(1) else {
        return Ok(());
    };
    if target.is_any_word(ADMIN_DESCRIBE_TARGETS) {
        return reject(
            RejectionKind::ScopeViolation,
            format!(
                "DESCRIBE {} exposes account administration data",
                target.text.to_uppercase()
            ),
        );
    }
    if !target.is_any_word(&["SCHEMA", "DATABASE"]) {
        return Ok(());
    }
    let mut pos = 2;
    if code.get(pos).is_some_and(|t| t.is_word("EXTENDED")) {
        pos += 1;
    }
    if !code.get(pos).is_some_and(|t| t.is_name_part()) {
        return Ok(());
    }
    let (parts, _) = dotted_name(code, pos);
    if schema_reference_in_scope(&parts, policy) {
        return Ok(());
    }
    reject(
        RejectionKind::ScopeViolation,
        format!(
            "Schema '{}' is outside the configured scope ({}.{})",
            parts.join("."),
            policy.catalog,
            policy.schema
        ),
    )
}

fn schema_reference_in_scope(parts: &[String], policy: &ValidatorPolicy) -> bool {
    match parts {
        [schema] => policy.is_schema(schema),
        [catalog, schema] if *catalog == policy.catalog => policy.is_schema(schema),
        [catalog, _] => policy.is_extra_catalog(catalog),
        _ => false,
    }
}

fn table_reference_in_scope(parts: &[String], policy: &ValidatorPolicy) -> bool {
    match parts {
        [_] => true,
        [schema, _] => policy.is_schema(schema),
        _ => check_qualified_name(parts, policy).is_ok(),
    }
}

/// Collect `a.b.c` starting at `start`; returns lowercased, unquoted parts and
/// the index just past the name.
fn dotted_name(code: &[&Token<'_>], start: usize) -> (Vec<String>, usize) {
    let mut parts = vec![code[start].identifier()];
    let mut i = start + 1;
    while i + 1 < code.len() && code[i].kind == TokenKind::Dot && code[i + 1].is_name_part() {
        parts.push(code[i + 1].identifier());
        i += 2;
    }
    (parts, i)
}

fn snippet(text: &str) -> String {
    const MAX: usize = 40;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Number,
    Str,
    QuotedIdent,
    LineComment,
    BlockComment,
    Semicolon,
    Dot,
    Comma,
    LParen,
    RParen,
    Operator,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    /// Byte offset into the statement.
    start: usize,
    /// False for strings, quoted identifiers and block comments missing their closer.
    terminated: bool,
    /// String literal contains a backslash-escaped delimiter.
    escaped_quote: bool,
    /// String literal contains its delimiter doubled.
    doubled_quote: bool,
    /// Whitespace directly precedes this token.
    gap_before: bool,
}

impl<'a> Token<'a> {
    fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    fn is_any_word(&self, keywords: &[&str]) -> bool {
        self.kind == TokenKind::Word && keywords.iter().any(|k| self.text.eq_ignore_ascii_case(k))
    }

    fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::Number | TokenKind::Str)
    }

    fn is_name_part(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }

    /// Literal content without its quotes or string prefix.
    fn literal_text(&self) -> &'a str {
        if self.kind != TokenKind::Str {
            return self.text;
        }
        self.text
            .find(['\'', '"'])
            .and_then(|open| self.text.get(open + 1..self.text.len().saturating_sub(1)))
            .unwrap_or(self.text)
    }

    /// Lowercased identifier with backtick quoting removed.
    fn identifier(&self) -> String {
        match self.kind {
            TokenKind::QuotedIdent if self.text.len() >= 2 => self.text[1..self.text.len() - 1]
                .replace("``", "`")
                .to_lowercase(),
            _ => self.text.to_lowercase(),
        }
    }
}

/// Maps the tokenizer's 1-based line and column (counted in chars) back to
/// byte offsets in the statement.
struct Positions {
    char_offsets: Vec<usize>,
    /// Char index of the first char of each line.
    line_starts: Vec<usize>,
    len: usize,
}

impl Positions {
    fn new(sql: &str) -> Self {
        let mut char_offsets = Vec::with_capacity(sql.len());
        let mut line_starts = vec![0];
        for (n, (offset, c)) in sql.char_indices().enumerate() {
            char_offsets.push(offset);
            if c == '\n' {
                line_starts.push(n + 1);
            }
        }
        Self {
            char_offsets,
            line_starts,
            len: sql.len(),
        }
    }

    fn offset(&self, location: Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let column = (location.column as usize).saturating_sub(1);
        self.line_starts
            .get(line)
            .and_then(|start| self.char_offsets.get(start + column))
            .copied()
            .unwrap_or(self.len)
    }
}

/// Split a statement into tokens. Never fails: an unterminated literal,
/// quoted identifier or block comment runs to the end of the text and is
/// flagged instead.
fn tokenize(sql: &str) -> Vec<Token<'_>> {
    lex(sql).unwrap_or_else(|_| lex_unterminated(sql))
}

fn lex(sql: &str) -> Result<Vec<Token<'_>>, TokenizerError> {
    let dialect = DatabricksDialect {};
    let spanned = Tokenizer::new(&dialect, sql).tokenize_with_location()?;
    let positions = Positions::new(sql);

    let mut tokens = Vec::with_capacity(spanned.len());
    let mut gap = false;
    for TokenWithSpan { token, span, .. } in spanned {
        let start = positions.offset(span.start);
        let end = positions.offset(span.end).max(start);
        let text = &sql[start..end];

        let kind = match token {
            SqlToken::EOF => continue,
            SqlToken::Whitespace(Whitespace::SingleLineComment { .. }) => TokenKind::LineComment,
            SqlToken::Whitespace(Whitespace::MultiLineComment(_)) => TokenKind::BlockComment,
            SqlToken::Whitespace(_) => {
                gap = true;
                continue;
            }
            SqlToken::Word(word) => match word.quote_style {
                None => TokenKind::Word,
                Some('`') => TokenKind::QuotedIdent,
                Some(_) => TokenKind::Str,
            },
            SqlToken::Number(..) => TokenKind::Number,
            SqlToken::SemiColon => TokenKind::Semicolon,
            SqlToken::Period => TokenKind::Dot,
            SqlToken::Comma => TokenKind::Comma,
            SqlToken::LParen => TokenKind::LParen,
            SqlToken::RParen => TokenKind::RParen,
            SqlToken::Eq
            | SqlToken::DoubleEq
            | SqlToken::Spaceship
            | SqlToken::Neq
            | SqlToken::Lt
            | SqlToken::Gt
            | SqlToken::LtEq
            | SqlToken::GtEq => TokenKind::Operator,
            // Every string literal form (plain, national, escaped, raw, hex) ends in its quote
            _ if text.len() >= 2 && text.ends_with(['\'', '"']) => TokenKind::Str,
            _ => TokenKind::Other,
        };

        let (escaped_quote, doubled_quote) = match kind {
            TokenKind::Str => quote_flags(text),
            _ => (false, false),
        };
        tokens.push(Token {
            kind,
            text,
            start,
            terminated: true,
            escaped_quote,
            doubled_quote,
            gap_before: gap,
        });
        gap = false;
    }
    Ok(tokens)
}

/// The tokenizer refuses unclosed quoting outright. Keep the longest prefix
/// that still tokenizes before an opening delimiter and turn the remainder
/// into one unterminated token.
fn lex_unterminated(sql: &str) -> Vec<Token<'_>> {
    let openers: Vec<usize> = sql
        .char_indices()
        .filter(|&(i, c)| matches!(c, '\'' | '"' | '`') || sql[i..].starts_with("/*"))
        .map(|(i, _)| i)
        .collect();

    for &start in openers.iter().rev() {
        let Ok(mut tokens) = lex(&sql[..start]) else {
            continue;
        };
        let rest = &sql[start..];
        let kind = if rest.starts_with("/*") {
            TokenKind::BlockComment
        } else if rest.starts_with('`') {
            TokenKind::QuotedIdent
        } else {
            TokenKind::Str
        };
        tokens.push(Token {
            kind,
            text: rest,
            start,
            terminated: false,
            escaped_quote: false,
            doubled_quote: false,
            gap_before: sql[..start].ends_with(char::is_whitespace),
        });
        return tokens;
    }

    vec![Token {
        kind: TokenKind::Other,
        text: sql,
        start: 0,
        terminated: false,
        escaped_quote: false,
        doubled_quote: false,
        gap_before: false,
    }]
}

/// Backslash-escaped and doubled delimiters inside a string literal's raw text.
fn quote_flags(text: &str) -> (bool, bool) {
    let Some(quote) = text.chars().last() else {
        return (false, false);
    };
    let inner = text
        .find(quote)
        .and_then(|open| text.get(open + 1..text.len() - quote.len_utf8()))
        .unwrap_or("");

    let mut escaped = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.next() == Some(quote) {
            escaped = true;
        }
    }
    let doubled = inner.contains(&format!("{quote}{quote}"));
    (escaped, doubled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ValidatorPolicy {
        ValidatorPolicy::default()
    }

    fn kind_of(sql: &str) -> Option<RejectionKind> {
        validate(sql, &policy()).kind
    }

    #[test]
    fn test_tokenize_words_and_literals() {
        let tokens = tokenize("SELECT `a b`, 'x''y' FROM t -- c");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word,
                TokenKind::QuotedIdent,
                TokenKind::Comma,
                TokenKind::Str,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::LineComment,
            ]
        );
        assert_eq!(tokens[3].text, "'x''y'");
        assert!(tokens[3].doubled_quote);
        assert!(tokens[1].gap_before);
        assert!(!tokens[2].gap_before);
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let tokens = tokenize("SELECT 'abc");
        assert_eq!(tokens.len(), 2);
        assert!(!tokens[1].terminated);
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].text, "'abc");

        let tokens = tokenize("SELECT 1 /* open 'x'");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::BlockComment);
        assert!(!last.terminated);
    }

    #[test]
    fn test_tokenize_offsets_across_lines_and_multibyte_text() {
        let sql = "SELECT 'Räikkönen' AS driver,\n  season FROM t";
        let tokens = tokenize(sql);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(
            texts,
            vec!["SELECT", "'Räikkönen'", "AS", "driver", ",", "season", "FROM", "t"]
        );
        assert_eq!(&sql[tokens[5].start..tokens[5].start + 6], "season");
        assert_eq!(tokens[1].literal_text(), "Räikkönen");
    }

    #[test]
    fn test_allowed_statement_kinds() {
        for sql in [
            "SELECT 1",
            "  select * from f1_gold_driver_season_stats",
            "WITH x AS (SELECT 1 AS a) SELECT a FROM x",
            "SHOW TABLES",
            "DESCRIBE f1_gold_race_driver_features",
            "-- leading comment\nSELECT 1",
            "/* block */ SELECT 1;",
        ] {
            assert!(validate(sql, &policy()).allowed, "expected allowed: {sql}");
        }
    }

    #[test]
    fn test_disallowed_statement_kinds() {
        for sql in [
            "DROP TABLE f1.f1_gold_driver_season_stats",
            "INSERT INTO t VALUES (1)",
            "EXPLAIN SELECT 1",
            "USE CATALOG other",
            "(SELECT 1)",
            "SET spark.sql.ansi.enabled = false",
        ] {
            assert_eq!(
                kind_of(sql),
                Some(RejectionKind::DisallowedStatementKind),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert_eq!(kind_of(""), Some(RejectionKind::EmptyStatement));
        assert_eq!(kind_of(" \n\t "), Some(RejectionKind::EmptyStatement));
        assert_eq!(kind_of("-- nothing"), Some(RejectionKind::EmptyStatement));
    }

    #[test]
    fn test_too_long() {
        let policy = ValidatorPolicy::default().with_max_length(20);
        let verdict = validate("SELECT season FROM f1_gold_driver_season_stats", &policy);
        assert_eq!(verdict.kind, Some(RejectionKind::StatementTooLong));
        assert!(validate("SELECT 1", &policy).allowed);
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            kind_of("SELECT 1; DELETE FROM x"),
            Some(RejectionKind::MultipleStatements)
        );
        assert_eq!(
            kind_of("SELECT 1; -- trailing"),
            Some(RejectionKind::MultipleStatements)
        );
        assert!(validate("SELECT ';' AS sep", &policy()).allowed);
        assert!(validate("SELECT 1 ;  \n", &policy()).allowed);
    }

    #[test]
    fn test_embedded_mutation() {
        assert_eq!(
            kind_of("WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x"),
            Some(RejectionKind::EmbeddedMutation)
        );
        assert_eq!(
            kind_of("SELECT * FROM (DELETE FROM t)"),
            Some(RejectionKind::EmbeddedMutation)
        );
    }

    #[test]
    fn test_word_boundaries_respected() {
        for sql in [
            "SELECT * FROM f1_silver_updated_results",
            "SELECT selected_drivers, created_at, dropped FROM t",
            "SELECT 'DROP TABLE x' AS note",
            "SELECT `delete` FROM t",
            "SELECT r.update FROM t r",
            "SHOW CREATE TABLE f1_gold_driver_season_stats",
        ] {
            assert!(validate(sql, &policy()).allowed, "expected allowed: {sql}");
        }
    }

    #[test]
    fn test_suspicious_patterns() {
        for sql in [
            "SELECT * FROM t WHERE name = '' OR '1'='1'",
            "SELECT * FROM t WHERE id = 1 OR 1=1",
            "SELECT * FROM t WHERE 1=1 -- '",
            "SELECT * FROM t WHERE a = 1 OR TRUE",
            "SELECT * FROM t WHERE name = 'abc",
            "SELECT * FROM t WHERE name = 'it\\'s'",
            "SELECT 'a''b'",
            "SELECT a FROM t UNION SELECT b FROM u",
            "SELECT * FROM t INTO OUTFILE '/tmp/x'",
            "SELECT 1 /* open",
        ] {
            assert_eq!(
                kind_of(sql),
                Some(RejectionKind::SuspiciousPattern),
                "{sql}"
            );
        }
        assert!(validate("SELECT a FROM t UNION ALL SELECT b FROM u", &policy()).allowed);
        assert!(validate("SELECT * FROM t WHERE 1=1 AND season = 2023", &policy()).allowed);
    }

    #[test]
    fn test_scope_violations() {
        for sql in [
            "SELECT * FROM system.information_schema.tables",
            "SELECT * FROM other_catalog.f1.results",
            "SELECT * FROM workspace.hr.salaries",
            "SELECT * FROM hr.salaries",
            "SELECT * FROM t, hr.salaries",
            "SELECT secret('scope', 'key')",
            "SELECT * FROM read_files('s3://bucket/path')",
            "SELECT reflect('java.lang.Runtime', 'getRuntime')",
            "SHOW CATALOGS",
            "SHOW GRANTS ON TABLE t",
            "SHOW TABLES IN hr",
            "SHOW SCHEMAS IN other_catalog",
            "DESCRIBE CATALOG workspace",
            "DESCRIBE hr.salaries",
            "SELECT * FROM IDENTIFIER('system.access.audit')",
            "SELECT * FROM identifier(:table_name)",
            "SELECT * FROM table_changes('hr.salaries', 2)",
            "SHOW CREATE TABLE hr.salaries",
            "SHOW TBLPROPERTIES hr.salaries",
            "SHOW PARTITIONS hr.salaries",
            "SHOW COLUMNS IN salaries IN hr",
            "SHOW COLUMNS FROM salaries FROM other_catalog.hr",
        ] {
            assert_eq!(kind_of(sql), Some(RejectionKind::ScopeViolation), "{sql}");
        }
    }

    #[test]
    fn test_scope_allowed() {
        for sql in [
            "SELECT * FROM workspace.f1.f1_gold_driver_season_stats",
            "SELECT * FROM f1.f1_gold_driver_season_stats",
            "SELECT table_name FROM workspace.information_schema.tables WHERE table_schema = :schema",
            "SELECT * FROM `workspace`.`f1`.`f1_gold_race_driver_features`",
            "SELECT d.season FROM f1_gold_driver_season_stats d JOIN f1_gold_constructor_season_stats c ON d.teamName = c.teamName",
            "SHOW TABLES IN f1",
            "SHOW TABLES IN workspace.f1",
            "SHOW SCHEMAS IN workspace",
            "DESCRIBE TABLE EXTENDED f1.f1_gold_driver_season_stats",
            "SHOW CREATE TABLE f1.f1_gold_driver_season_stats",
            "SHOW TBLPROPERTIES workspace.f1.f1_silver_results",
            "SHOW COLUMNS IN f1_silver_results IN f1",
            "SHOW COLUMNS IN f1_silver_results IN workspace.f1",
        ] {
            assert!(validate(sql, &policy()).allowed, "expected allowed: {sql}");
        }
    }

    #[test]
    fn test_extra_catalogs() {
        let policy = ValidatorPolicy::default().with_extra_catalogs(["samples"]);
        assert!(validate("SELECT * FROM samples.nyctaxi.trips", &policy).allowed);
        assert!(!validate("SELECT * FROM main.default.t", &policy).allowed);
    }

    #[test]
    fn test_first_violated_rule_wins() {
        // Disallowed leading keyword beats the later mutation and separator.
        assert_eq!(
            kind_of("DELETE FROM t; SELECT 1"),
            Some(RejectionKind::DisallowedStatementKind)
        );
        // Separator beats the mutation that follows it.
        assert_eq!(
            kind_of("SELECT 1; DROP TABLE t"),
            Some(RejectionKind::MultipleStatements)
        );
    }

    #[test]
    fn test_verdict_into_result() {
        let err = validate_readonly("DROP TABLE t", &policy()).unwrap_err();
        assert_eq!(err.kind(), "DisallowedStatementKind");
        assert!(validate_readonly("SELECT 1", &policy()).is_ok());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("  SELECT   Season\n FROM  T -- note\n WHERE x = 'A  B'"),
            "select season from t where x = 'A  B'"
        );
    }
}
