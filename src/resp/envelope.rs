//! Wire envelope.

use serde::Serialize;
use serde_json::Value;

/// A response body the pool can recycle.
///
/// Implement this to swap the envelope shape (see
/// [`EnvelopePool::with_factory`](crate::resp::EnvelopePool::with_factory)).
pub trait ResponseBody: Send + 'static {
    fn set_result(&mut self, code: i32, message: &str, data: Option<Value>);

    fn set_trace_id(&mut self, trace_id: &str);

    fn code(&self) -> i32;

    fn to_json(&self) -> serde_json::Result<Vec<u8>>;

    /// Clear every field back to its zero value.
    fn reset(&mut self);

    /// True when every field holds its zero value.
    fn is_blank(&self) -> bool;
}

/// Default envelope:
/// `{"err_code": int, "trace_id": string?, "err_msg": string, "ret": any?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "err_code")]
    pub code: i32,

    #[serde(rename = "trace_id", skip_serializing_if = "String::is_empty")]
    pub trace_id: String,

    #[serde(rename = "err_msg")]
    pub message: String,

    #[serde(rename = "ret", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseBody for Envelope {
    fn set_result(&mut self, code: i32, message: &str, data: Option<Value>) {
        self.code = code;
        self.message.clear();
        self.message.push_str(message);
        self.data = data.filter(|v| !v.is_null());
    }

    fn set_trace_id(&mut self, trace_id: &str) {
        self.trace_id.clear();
        self.trace_id.push_str(trace_id);
    }

    fn code(&self) -> i32 {
        self.code
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    // Strings are cleared rather than replaced so their buffers are reused.
    fn reset(&mut self) {
        self.code = 0;
        self.trace_id.clear();
        self.message.clear();
        self.data = None;
    }

    fn is_blank(&self) -> bool {
        self.code == 0 && self.trace_id.is_empty() && self.message.is_empty() && self.data.is_none()
    }
}

/// Paging result, usually carried in `ret`.
#[derive(Debug, Clone, Serialize)]
pub struct PaginationResult<T> {
    /// Total count.
    pub total: i64,
    pub page_size: u32,
    /// Current page index.
    pub page_index: u32,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_are_omitted() {
        let mut envelope = Envelope::default();
        envelope.set_result(40003, "permission denied", None);
        let wire: Value = serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(wire, json!({"err_code": 40003, "err_msg": "permission denied"}));
    }

    #[test]
    fn trace_id_and_data_are_written() {
        let mut envelope = Envelope::default();
        envelope.set_result(0, "ok", Some(json!({"id": 7})));
        envelope.set_trace_id("abc-123");
        let wire: Value = serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({"err_code": 0, "trace_id": "abc-123", "err_msg": "ok", "ret": {"id": 7}})
        );
    }

    #[test]
    fn null_data_counts_as_absent() {
        let mut envelope = Envelope::default();
        envelope.set_result(0, "ok", Some(Value::Null));
        assert_eq!(envelope.data, None);
    }

    #[test]
    fn reset_blanks_every_field() {
        let mut envelope = Envelope::default();
        envelope.set_result(40010, "bad field", Some(json!([1, 2])));
        envelope.set_trace_id("t-1");
        assert!(!envelope.is_blank());

        envelope.reset();
        assert!(envelope.is_blank());
        assert_eq!(envelope, Envelope::default());
    }

    #[test]
    fn pagination_serializes_flat() {
        let page = PaginationResult { total: 42, page_size: 10, page_index: 2, data: vec!["a"] };
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"total": 42, "page_size": 10, "page_index": 2, "data": ["a"]})
        );
    }
}
