use serde::{Deserialize, Serialize};

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Sent when a query cannot be answered at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

impl ErrorFrame {
    pub fn internal() -> Self {
        Self {
            kind: "error".into(),
            data: "Internal server error".into(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: "error".into(),
            data: "Query timed out".into(),
        }
    }

    pub fn busy() -> Self {
        Self {
            kind: "error".into(),
            data: "Too many queued queries".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_frame_shape() {
        let json = serde_json::to_value(ErrorFrame::internal()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "error", "data": "Internal server error"})
        );
    }

    #[test]
    fn test_query_request_parse() {
        let req: QueryRequest = serde_json::from_str(r#"{"query":"Who wrote Hamlet?"}"#).unwrap();
        assert_eq!(req.query, "Who wrote Hamlet?");
    }
}
