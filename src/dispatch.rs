//! Request dispatch for hosting layers.
//!
//! Maps tagged JSON requests onto graph call groups and wraps every result in
//! a status-coded response, so any transport (stdio, HTTP) can forward it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorPayload, GraphError, GraphResult};
use crate::graph::requests::{FeedbackRequest, IngestBatch};
use crate::graph::CreditGraph;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Batch ingest; returns the decision fabric.
    Ingest(IngestBatch),
    /// Full decision fabric.
    Snapshot,
    /// One borrower summary, or 404.
    Borrower {
        #[serde(rename = "borrowerId")]
        borrower_id: String,
    },
    /// Weight feedback; returns weights and a fresh evaluation.
    Feedback(FeedbackRequest),
    Decay,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Response {
    fn ok(body: Value) -> Self {
        Response {
            status: 200,
            body: Some(body),
            error: None,
        }
    }

    fn from_error(err: &GraphError) -> Self {
        Response {
            status: err.status_code(),
            body: None,
            error: Some(ErrorPayload::from(err)),
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> GraphResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| GraphError::internal(format!("failed to encode response: {}", e)))
}

fn run(graph: &CreditGraph, request: Request) -> GraphResult<Value> {
    match request {
        Request::Ingest(batch) => to_body(&graph.ingest_batch(batch)?),
        Request::Snapshot => to_body(&graph.decision_fabric()),
        Request::Borrower { borrower_id } => {
            let summary = graph
                .borrower_summary(&borrower_id)
                .ok_or_else(|| GraphError::not_found(format!("borrower {}", borrower_id)))?;
            to_body(&summary)
        }
        Request::Feedback(feedback) => to_body(&graph.apply_feedback(feedback)?),
        Request::Decay => Ok(serde_json::json!({ "weights": graph.decay_signal_weights() })),
        Request::Reset => {
            graph.reset();
            Ok(serde_json::json!({ "weights": graph.weights() }))
        }
    }
}

/// Execute one parsed request.
pub fn handle(graph: &CreditGraph, request: Request) -> Response {
    match run(graph, request) {
        Ok(body) => Response::ok(body),
        Err(err @ GraphError::Internal(_)) => {
            log::error!("Request failed: {}", err);
            Response::from_error(&err)
        }
        Err(err) => {
            log::warn!("Request rejected ({}): {}", err.status_code(), err);
            Response::from_error(&err)
        }
    }
}

/// Parse and execute one JSON request line. Malformed JSON is a 400.
pub fn handle_line(graph: &CreditGraph, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle(graph, request),
        Err(e) => {
            let err = GraphError::validation(format!("malformed request: {}", e));
            log::warn!("{}", err);
            Response::from_error(&err)
        }
    }
}
