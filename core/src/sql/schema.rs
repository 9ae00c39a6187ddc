//! Schema preamble extraction.
//!
//! The system instruction embeds the `CREATE` statements of the database
//! script. Only top-level statements count: the keyword must be the exact,
//! upper-case word `CREATE` outside comments and quoted text, and the
//! statement runs to the next `;` outside quoted text. A trailing statement
//! with no terminating `;` is dropped.

use std::path::Path;

/// Extract every top-level `CREATE ... ;` statement, trimmed, in script order.
pub fn extract_create_statements(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = find(bytes, i + 2, b"\n").map_or(bytes.len(), |p| p + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                continue;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote);
                continue;
            }
            b';' => {
                if let Some(s) = start.take() {
                    statements.push(normalize(&script[s..=i]));
                }
            }
            b'C' if start.is_none() && is_keyword_at(bytes, i, b"CREATE") => {
                start = Some(i);
                i += b"CREATE".len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    statements
}

/// Read a SQL script and extract its `CREATE` statements
pub fn load_schema_script(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let script = std::fs::read_to_string(path)?;
    Ok(extract_create_statements(&script))
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Index just past the closing quote; doubled quotes are escapes
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_keyword_at(bytes: &[u8], i: usize, keyword: &[u8]) -> bool {
    bytes[i..].starts_with(keyword)
        && (i == 0 || !is_word_byte(bytes[i - 1]))
        && bytes.get(i + keyword.len()).map_or(true, |&b| !is_word_byte(b))
}

fn normalize(statement: &str) -> String {
    statement.replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
-- Northwind subset
PRAGMA foreign_keys = ON;

CREATE TABLE Customers (
    CustomerID TEXT PRIMARY KEY,
    CompanyName TEXT NOT NULL DEFAULT 'A; B',
    Country TEXT
);

INSERT INTO Customers VALUES ('ALFKI', 'Alfreds; Futterkiste', 'Germany');
/* CREATE TABLE Ghost (id INT); */
CREATE INDEX idx_country ON Customers(Country);
create table lower_case (id INT);
CREATE TABLE "Order Details" (OrderID INT, Note TEXT DEFAULT 'it''s; fine');
"#;

    #[test]
    fn extracts_top_level_creates_in_order() {
        let statements = extract_create_statements(SCRIPT);

        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE Customers ("));
        assert!(statements[0].ends_with(");"));
        assert!(statements[0].contains("'A; B'"));
        assert_eq!(
            statements[1],
            "CREATE INDEX idx_country ON Customers(Country);"
        );
        assert!(statements[2].contains("'it''s; fine'"));
    }

    #[test]
    fn ignores_comments_and_embedded_words() {
        let script = "-- CREATE TABLE a (x INT);\nSELECT 'CREATE TABLE b (y INT);';\nRECREATE x;";
        assert!(extract_create_statements(script).is_empty());
    }

    #[test]
    fn drops_unterminated_tail() {
        let script = "CREATE TABLE a (x INT);\nCREATE TABLE b (y INT)";
        assert_eq!(
            extract_create_statements(script),
            vec!["CREATE TABLE a (x INT);".to_string()]
        );
    }

    #[test]
    fn empty_script() {
        assert!(extract_create_statements("").is_empty());
        assert!(extract_create_statements("CREATE").is_empty());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database_script.sql");
        std::fs::write(&path, "CREATE TABLE t (id INT);\r\nINSERT INTO t VALUES (1);").unwrap();

        assert_eq!(
            load_schema_script(&path).unwrap(),
            vec!["CREATE TABLE t (id INT);".to_string()]
        );
        assert!(load_schema_script(dir.path().join("missing.sql")).is_err());
    }
}
