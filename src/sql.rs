//! SQL helpers: truncation for span tags and lightweight statement classification.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// SQL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Set,
    Other,
}

impl SqlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Create => "CREATE",
            SqlOperation::Drop => "DROP",
            SqlOperation::Alter => "ALTER",
            SqlOperation::Truncate => "TRUNCATE",
            SqlOperation::Begin => "BEGIN",
            SqlOperation::Commit => "COMMIT",
            SqlOperation::Rollback => "ROLLBACK",
            SqlOperation::Set => "SET",
            SqlOperation::Other => "QUERY",
        }
    }

    fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" => SqlOperation::Select,
            "INSERT" => SqlOperation::Insert,
            "UPDATE" => SqlOperation::Update,
            "DELETE" => SqlOperation::Delete,
            "CREATE" => SqlOperation::Create,
            "DROP" => SqlOperation::Drop,
            "ALTER" => SqlOperation::Alter,
            "TRUNCATE" => SqlOperation::Truncate,
            "BEGIN" | "START" => SqlOperation::Begin,
            "COMMIT" => SqlOperation::Commit,
            "ROLLBACK" => SqlOperation::Rollback,
            "SET" => SqlOperation::Set,
            _ => SqlOperation::Other,
        }
    }

    /// Whether statements of this kind produce a row set.
    ///
    /// `Other` covers `SHOW`, `EXPLAIN`, `PRAGMA` and friends.
    pub fn returns_rows(&self) -> bool {
        matches!(self, SqlOperation::Select | SqlOperation::Other)
    }

    fn names_table(&self) -> bool {
        matches!(
            self,
            SqlOperation::Select
                | SqlOperation::Insert
                | SqlOperation::Update
                | SqlOperation::Delete
                | SqlOperation::Create
                | SqlOperation::Drop
                | SqlOperation::Alter
                | SqlOperation::Truncate
        )
    }
}

impl std::fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// First keyword, skipping leading line and block comments.
static LEADING_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s)\s*(?:(?:--[^\n]*(?:\n|$)|/\*.*?\*/)\s*)*([A-Za-z]+)").unwrap()
});

// The keyword preceding the primary table of each table-bearing statement.
static PRIMARY_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|INTO|UPDATE|TRUNCATE(?:\s+TABLE)?|TABLE(?:\s+IF(?:\s+NOT)?\s+EXISTS)?)\s+[`"\[]?(\w+)[`"\]]?"#,
    )
    .unwrap()
});

/// Parse the SQL operation type from a query string.
pub fn parse_operation(sql: &str) -> SqlOperation {
    LEADING_KEYWORD
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map_or(SqlOperation::Other, |m| SqlOperation::from_keyword(m.as_str()))
}

// Data-modifying statements that hand rows back (`INSERT … RETURNING id`).
static RETURNING_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRETURNING\b").unwrap());

/// Whether executing `sql` produces a row set rather than an affected count.
pub fn returns_rows(sql: &str) -> bool {
    parse_operation(sql).returns_rows() || RETURNING_CLAUSE.is_match(sql)
}

/// Extract the primary table name from a SQL query, lowercased.
pub fn extract_table(sql: &str) -> Option<String> {
    if !parse_operation(sql).names_table() {
        return None;
    }
    PRIMARY_TABLE
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Cut `sql` to at most `max` characters. `None` keeps it intact.
pub fn truncate(sql: &str, max: Option<usize>) -> Cow<'_, str> {
    let Some(max) = max else {
        return Cow::Borrowed(sql);
    };
    match sql.char_indices().nth(max) {
        Some((end, _)) => Cow::Owned(sql[..end].to_owned()),
        None => Cow::Borrowed(sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation() {
        assert_eq!(parse_operation("SELECT * FROM users"), SqlOperation::Select);
        assert_eq!(parse_operation("  select id from orders"), SqlOperation::Select);
        assert_eq!(
            parse_operation("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            SqlOperation::Select
        );
        assert_eq!(
            parse_operation("INSERT INTO users (name) VALUES ('test')"),
            SqlOperation::Insert
        );
        assert_eq!(parse_operation("START TRANSACTION"), SqlOperation::Begin);
        assert_eq!(parse_operation("ROLLBACK"), SqlOperation::Rollback);
        assert_eq!(parse_operation("EXPLAIN SELECT 1"), SqlOperation::Other);
        assert_eq!(parse_operation(""), SqlOperation::Other);
    }

    #[test]
    fn test_parse_operation_skips_comments() {
        assert_eq!(
            parse_operation("-- fetch users\nSELECT * FROM users"),
            SqlOperation::Select
        );
        assert_eq!(
            parse_operation("/* app:billing */ UPDATE invoices SET paid = true"),
            SqlOperation::Update
        );
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT id FROM users"));
        assert!(returns_rows("SHOW TABLES"));
        assert!(returns_rows("INSERT INTO users (name) VALUES ($1) RETURNING id"));
        assert!(returns_rows("delete from sessions where expired returning id"));
        assert!(!returns_rows("INSERT INTO users (name) VALUES ($1)"));
        assert!(!returns_rows("UPDATE users SET returning_customer = true"));
    }

    #[test]
    fn test_extract_table() {
        assert_eq!(
            extract_table(r#"SELECT * FROM "Users" WHERE id = 1"#),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("select u.* from users u join orders o on u.id = o.user_id"),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("INSERT INTO grades (student_id, score) VALUES ($1, $2)"),
            Some("grades".to_string())
        );
        assert_eq!(
            extract_table("UPDATE students SET name = $1 WHERE id = $2"),
            Some("students".to_string())
        );
        assert_eq!(
            extract_table("DELETE FROM assignments WHERE id = $1"),
            Some("assignments".to_string())
        );
        assert_eq!(
            extract_table("CREATE TABLE IF NOT EXISTS `audit_log` (id INT)"),
            Some("audit_log".to_string())
        );
        assert_eq!(
            extract_table("TRUNCATE TABLE sessions"),
            Some("sessions".to_string())
        );
        assert_eq!(extract_table("BEGIN"), None);
        assert_eq!(extract_table("SELECT 1"), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(
            truncate("SELECT * FROM very_long_table_name", Some(10)),
            "SELECT * F"
        );
        assert_eq!(truncate("SELECT 1", Some(10)), "SELECT 1");
        assert_eq!(truncate("SELECT 1", Some(8)), "SELECT 1");
        assert_eq!(truncate("SELECT 1", None), "SELECT 1");
        assert_eq!(truncate("SELECT 1", Some(0)), "");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("SELECT 'żółw'", Some(10)), "SELECT 'żó");
    }
}
