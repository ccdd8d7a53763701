//! WHERE-clause assembly for the fixed statement templates.
//!
//! Column names come from the templates. Caller values only ever travel as
//! bound `:name` parameters.

use crate::models::{SqlParam, SqlStatement};

#[derive(Debug, Default, Clone)]
pub struct Conditions {
    clauses: Vec<String>,
    params: Vec<(String, SqlParam)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A template condition with no caller input.
    pub fn raw(mut self, clause: impl Into<String>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    /// Case-insensitive substring match of `column` against `:param`.
    pub fn contains(mut self, column: &str, param: &str, value: impl Into<String>) -> Self {
        self.clauses.push(contains_clause(column, param));
        self.params.push((param.to_string(), SqlParam::String(value.into())));
        self
    }

    pub fn contains_opt(self, column: &str, param: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.contains(column, param, v),
            None => self,
        }
    }

    /// Any of `values` as a substring of `column`, bound as `:{prefix}0`, `:{prefix}1`, ...
    pub fn contains_any(mut self, column: &str, prefix: &str, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        let mut alternatives = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let param = format!("{}{}", prefix, i);
            alternatives.push(contains_clause(column, &param));
            self.params.push((param, SqlParam::String(value.clone())));
        }
        self.clauses.push(format!("({})", alternatives.join(" OR ")));
        self
    }

    pub fn equals(mut self, column: &str, param: &str, value: impl Into<SqlParam>) -> Self {
        self.clauses.push(format!("{} = :{}", column, param));
        self.params.push((param.to_string(), value.into()));
        self
    }

    pub fn equals_opt<V: Into<SqlParam>>(self, column: &str, param: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.equals(column, param, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `WHERE a AND b`, or an empty string when there are no conditions.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bind the collected parameters onto a statement built around [`Self::where_clause`].
    pub fn bind_to(self, text: impl Into<String>) -> SqlStatement {
        self.params
            .into_iter()
            .fold(SqlStatement::new(text), |stmt, (name, value)| stmt.bind(name, value))
    }
}

fn contains_clause(column: &str, param: &str) -> String {
    format!("LOWER({}) LIKE LOWER(CONCAT('%', :{}, '%'))", column, param)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_conditions() {
        let conditions = Conditions::new();
        assert!(conditions.is_empty());
        assert_eq!(conditions.where_clause(), "");
    }

    #[test]
    fn test_values_are_bound_not_inlined() {
        let conditions = Conditions::new()
            .contains("driverName", "driver_name", "O'Brien")
            .equals("season", "season", 2023i64);
        let clause = conditions.where_clause();
        assert_eq!(
            clause,
            "WHERE LOWER(driverName) LIKE LOWER(CONCAT('%', :driver_name, '%')) AND season = :season"
        );
        let stmt = conditions.bind_to(format!("SELECT 1 FROM t {}", clause));
        assert!(!stmt.text.contains("O'Brien"));
        assert_eq!(stmt.param("driver_name"), Some(&SqlParam::from("O'Brien")));
        assert_eq!(stmt.param("season"), Some(&SqlParam::Int(2023)));
    }

    #[test]
    fn test_optional_filters_skip_none() {
        let conditions = Conditions::new()
            .raw("pit_stop_count > 0")
            .contains_opt("teamName", "team_name", None)
            .equals_opt::<i64>("season", "season", None);
        assert_eq!(conditions.where_clause(), "WHERE pit_stop_count > 0");
    }

    #[test]
    fn test_contains_any() {
        let teams = vec!["Ferrari".to_string(), "McLaren".to_string()];
        let conditions = Conditions::new().contains_any("teamName", "team", &teams);
        let clause = conditions.where_clause();
        assert!(clause.contains(":team0"));
        assert!(clause.contains(" OR "));
        let stmt = conditions.bind_to(clause);
        assert_eq!(stmt.param("team1"), Some(&SqlParam::from("McLaren")));
    }
}
