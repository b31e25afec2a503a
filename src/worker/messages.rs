//! Message types exchanged with the background worker.
//!
//! Inbound traffic arrives as loose `WorkerMessage` records tagged by `status`
//! and is validated into `WorkerEvent` before anything in the UI context sees it.

use serde::{Deserialize, Serialize};

/// Outbound request to synthesize `text` with `speaker_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    pub speaker_id: String,
}

/// Raw inbound record as posted by the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkerMessage {
    pub fn initiate(file: impl Into<String>) -> Self {
        Self { status: "initiate".into(), file: Some(file.into()), ..Default::default() }
    }

    pub fn progress(file: impl Into<String>, progress: f32) -> Self {
        Self { status: "progress".into(), file: Some(file.into()), progress: Some(progress), ..Default::default() }
    }

    pub fn done(file: impl Into<String>) -> Self {
        Self { status: "done".into(), file: Some(file.into()), ..Default::default() }
    }

    pub fn ready() -> Self {
        Self { status: "ready".into(), ..Default::default() }
    }

    pub fn complete(output: Vec<u8>) -> Self {
        Self { status: "complete".into(), output: Some(output), ..Default::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".into(), message: Some(message.into()), ..Default::default() }
    }
}

/// Validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Initiate { file: String },
    Progress { file: String, progress: f32 },
    Done { file: String },
    Ready,
    Complete { output: Vec<u8> },
    Error { message: String },
}

impl WorkerEvent {
    /// Validate a raw message. Unknown statuses and records missing a required
    /// field yield `None`.
    pub fn parse(raw: WorkerMessage) -> Option<Self> {
        let WorkerMessage { status, file, progress, output, message } = raw;
        match status.as_str() {
            "initiate" => Some(Self::Initiate { file: file? }),
            "progress" => Some(Self::Progress { file: file?, progress: progress? }),
            "done" => Some(Self::Done { file: file? }),
            "ready" => Some(Self::Ready),
            "complete" => Some(Self::Complete { output: output? }),
            "error" => Some(Self::Error { message: message.unwrap_or_else(|| "unknown worker error".to_string()) }),
            _ => None,
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initiate { .. } => "initiate",
            Self::Progress { .. } => "progress",
            Self::Done { .. } => "done",
            Self::Ready => "ready",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(WorkerEvent::parse(WorkerMessage::initiate("a")), Some(WorkerEvent::Initiate { file: "a".into() }));
        assert_eq!(
            WorkerEvent::parse(WorkerMessage::progress("a", 12.5)),
            Some(WorkerEvent::Progress { file: "a".into(), progress: 12.5 })
        );
        assert_eq!(WorkerEvent::parse(WorkerMessage::ready()), Some(WorkerEvent::Ready));
        assert_eq!(WorkerEvent::parse(WorkerMessage::complete(vec![1, 2])), Some(WorkerEvent::Complete { output: vec![1, 2] }));
    }

    #[test]
    fn test_parse_ignores_unknown_and_malformed() {
        let unknown = WorkerMessage { status: "download".into(), ..Default::default() };
        assert_eq!(WorkerEvent::parse(unknown), None);

        let missing_file = WorkerMessage { status: "progress".into(), progress: Some(3.0), ..Default::default() };
        assert_eq!(WorkerEvent::parse(missing_file), None);

        let missing_output = WorkerMessage { status: "complete".into(), ..Default::default() };
        assert_eq!(WorkerEvent::parse(missing_output), None);
    }

    #[test]
    fn test_raw_message_from_json() {
        let raw: WorkerMessage = serde_json::from_str(r#"{"status":"progress","file":"model.onnx","progress":41.0,"loaded":12}"#).unwrap();
        assert_eq!(WorkerEvent::parse(raw), Some(WorkerEvent::Progress { file: "model.onnx".into(), progress: 41.0 }));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = GenerationRequest { text: "hello".into(), speaker_id: "af_bella".into() };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"text":"hello","speaker_id":"af_bella"}"#);
    }
}
