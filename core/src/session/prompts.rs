//! Prompt texts sent to the model.

use crate::context::Turn;
use crate::sql::{DatabaseError, QueryResult};

/// System instruction of the primary call, with the schema statements appended
pub fn primary_instruction(create_statements: &[String]) -> String {
    format!(
        "You are an assistant that answers in the language of the user's input.
I am the user, a company manager working with a SQLite database.
Your task is to extract the relevant information from my natural language query and transform it into a valid SQLite statement, along with a JSON schema for the output of that statement.
Your response is always composed of a text message, a certainty between 0 and 1 that the statement should be executed, an SQLite statement and a JSON schema for the possible SQLite output.
The schema for the SQLite database is as follows:
{}",
        create_statements.join("\n")
    )
}

/// System instruction of the grounding call
pub const GROUNDING_INSTRUCTION: &str = "You must not use your pretrained knowledge or any previous chat history. \
Use only the provided query output to produce a JSON document that matches the response schema. \
If the query output does not contain a value, leave it out instead of inventing one.";

/// Contents of the grounding call
pub fn grounding_contents(result: &QueryResult) -> String {
    format!(
        "Use this query output to provide the json file:\n{}",
        result.to_json()
    )
}

/// System turn asking the model to fix a statement the database rejected
pub fn correction_turn(sql: &str, error: &DatabaseError) -> Turn {
    Turn::system(format!(
        "The statement `{sql}` failed with error: {error}. Provide a corrected query."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlValue;

    #[test]
    fn instruction_embeds_schema() {
        let text = primary_instruction(&[
            "CREATE TABLE a (id INT);".to_string(),
            "CREATE TABLE b (id INT);".to_string(),
        ]);
        assert!(text.ends_with("CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);"));
    }

    #[test]
    fn grounding_contents_carry_rows() {
        let result = QueryResult {
            columns: vec!["name".into()],
            rows: vec![vec![SqlValue::Text("Alfreds".into())]],
        };
        let text = grounding_contents(&result);
        assert!(text.contains(r#""rows":[["Alfreds"]]"#));
    }

    #[test]
    fn correction_mentions_sql_and_error() {
        let turn = correction_turn("SELECT * FROM Foo", &DatabaseError::Execution("no such table: Foo".into()));
        let text = turn.to_string();
        assert!(text.starts_with("System: "));
        assert!(text.contains("SELECT * FROM Foo"));
        assert!(text.contains("no such table: Foo"));
    }
}
