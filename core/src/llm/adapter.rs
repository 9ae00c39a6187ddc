use serde_json::{json, Value};

use super::backend::GenerateRequest;

/// Convert a GenerateRequest into chat messages (system instruction + user contents)
pub fn request_to_messages(request: &GenerateRequest) -> Vec<Value> {
    let mut messages = Vec::new();
    if !request.system_instruction.is_empty() {
        messages.push(json!({"role": "system", "content": request.system_instruction}));
    }
    messages.push(json!({"role": "user", "content": request.contents}));
    messages
}

/// `response_format` body field: a strict JSON schema when one is given,
/// plain JSON mode otherwise
pub fn response_format(request: &GenerateRequest) -> Value {
    match &request.response_schema {
        Some(schema) => json!({
            "type": "json_schema",
            "json_schema": {
                "name": "reply",
                "schema": schema,
            }
        }),
        None => json!({"type": "json_object"}),
    }
}
