use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Parsed primary reply of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReply {
    /// Confidence (0..=1) that the SQL should be executed
    pub certainty: f64,
    pub sql: String,
    pub message: String,
    /// JSON schema text describing the query output
    #[serde(rename = "schema")]
    pub output_schema: String,
}

impl StructuredReply {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Whether the reply asks for the database phase at `threshold`
    pub fn wants_query(&self, threshold: f64) -> bool {
        self.certainty >= threshold
            && !self.sql.trim().is_empty()
            && !self.output_schema.trim().is_empty()
    }
}

/// Response schema of the primary call
pub fn primary_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "certainty": {
                "type": "number",
                "description": "Confidence that an SQL query should be executed (a value between 0 and 1)"
            },
            "sql": {
                "type": "string",
                "description": "The SQL query that was generated or used to retrieve information."
            },
            "message": {
                "type": "string",
                "description": "A conversational message providing context, results, or next steps."
            },
            "schema": {
                "type": "string",
                "description": "The json schema of the output of the SQL query. Decide the properties and required keys of the json object based on the database schema and the query."
            }
        },
        "required": ["certainty", "sql", "message", "schema"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        let raw = r#"{"certainty":0.95,"sql":"SELECT 1","message":"ok","schema":"{\"type\":\"object\"}"}"#;
        let reply = StructuredReply::parse(raw).unwrap();

        assert_eq!(reply.certainty, 0.95);
        assert_eq!(reply.sql, "SELECT 1");
        assert_eq!(reply.output_schema, r#"{"type":"object"}"#);
        assert!(reply.wants_query(0.8));
    }

    #[test]
    fn round_trip_is_identity() {
        let reply = StructuredReply {
            certainty: 0.42,
            sql: "SELECT name FROM Customers WHERE Country = 'Germany'".into(),
            message: "Müşteriler".into(),
            output_schema: r#"{"type":"array"}"#.into(),
        };
        let text = serde_json::to_string(&reply).unwrap();
        assert_eq!(StructuredReply::parse(&text).unwrap(), reply);
    }

    #[test]
    fn rejects_malformed() {
        assert!(StructuredReply::parse("not json").is_err());
        assert!(StructuredReply::parse(r#"{"sql":"SELECT 1"}"#).is_err());
        // Every key of the response schema is required
        assert!(StructuredReply::parse(r#"{"certainty":0.9,"sql":"SELECT 1","message":"ok"}"#).is_err());
        assert!(StructuredReply::parse(r#"{"certainty":0.9,"message":"ok","schema":"{}"}"#).is_err());
    }

    #[test]
    fn query_gate() {
        let mut reply = StructuredReply {
            certainty: 0.8,
            sql: "SELECT 1".into(),
            message: String::new(),
            output_schema: "{}".into(),
        };
        assert!(reply.wants_query(0.8));

        reply.certainty = 0.79;
        assert!(!reply.wants_query(0.8));

        reply.certainty = 1.0;
        reply.output_schema.clear();
        assert!(!reply.wants_query(0.8));

        reply.output_schema = "{}".into();
        reply.sql = "  ".into();
        assert!(!reply.wants_query(0.8));
    }
}
