pub(crate) mod auth;
pub(crate) mod community;
pub(crate) mod notes;
pub(crate) mod notifications;
pub(crate) mod passage;
pub(crate) mod uploads;

use axum::Json;
use serde_json::{json, Map, Value};

/// Success envelope: `{ ok: true }` merged with the payload's fields.
pub(crate) fn ok_body(payload: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("ok".to_string(), json!(true));
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    Json(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_body_merges_payload_fields() {
        let Json(body) = ok_body(json!({ "count": 3 }));
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["count"], json!(3));
    }

    #[test]
    fn ok_body_tolerates_non_object_payload() {
        let Json(body) = ok_body(json!(null));
        assert_eq!(body, json!({ "ok": true }));
    }
}
