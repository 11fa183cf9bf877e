use serde_json::{json, Value};

pub mod connect;
pub mod default;
pub mod disconnect;

/// API Gateway WebSocket route response.
pub fn status_response(status_code: u16, body: Option<Value>) -> Value {
    match body {
        Some(body) => json!({
            "statusCode": status_code,
            "body": body.to_string()
        }),
        None => json!({ "statusCode": status_code }),
    }
}
