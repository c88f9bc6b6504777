// Wire protocol between clients and the daemon
// Newline-delimited JSON: one Request in, one Response out, and in subscribe
// mode a stream of Notifications after the first Response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::usecase::boards::{CreateColumnRequest, CreateTaskRequest, UpdateTaskRequest};

/// Largest request line the daemon will accept (1MB)
pub const MAX_REQUEST_FRAME_SIZE: usize = 1024 * 1024;
/// Largest response line a client will accept (10MB)
pub const MAX_RESPONSE_FRAME_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Request frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid request: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Request {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    /// None for a type the daemon doesn't know.
    pub fn request_type(&self) -> Option<RequestType> {
        self.kind.parse().ok()
    }

    /// Decode the payload; a missing or null payload decodes as `{}`.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = match &self.payload {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(value) => value.clone(),
        };
        serde_json::from_value(value).map_err(ProtocolError::InvalidPayload)
    }
}

/// Every request type the daemon routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Ping,
    Subscribe,
    Unsubscribe,

    GetBoard,
    ListBoards,
    CreateBoard,
    GetActiveBoard,

    AddTask,
    MoveTask,
    UpdateTask,
    DeleteTask,
    CheckoutTask,

    AddColumn,
    DeleteColumn,

    CreateAction,
    UpdateAction,
    DeleteAction,
    GetAction,
    ListActions,
    EnableAction,
    DisableAction,

    StartTimer,
    StopTimer,
    GetActiveTimers,
    ListTimeLogs,
    AddTimeEntry,

    CreateProject,
    GetProject,
    ListProjects,
    UpdateProject,
    DeleteProject,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::GetBoard => "get_board",
            Self::ListBoards => "list_boards",
            Self::CreateBoard => "create_board",
            Self::GetActiveBoard => "get_active_board",
            Self::AddTask => "add_task",
            Self::MoveTask => "move_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::CheckoutTask => "checkout_task",
            Self::AddColumn => "add_column",
            Self::DeleteColumn => "delete_column",
            Self::CreateAction => "create_action",
            Self::UpdateAction => "update_action",
            Self::DeleteAction => "delete_action",
            Self::GetAction => "get_action",
            Self::ListActions => "list_actions",
            Self::EnableAction => "enable_action",
            Self::DisableAction => "disable_action",
            Self::StartTimer => "start_timer",
            Self::StopTimer => "stop_timer",
            Self::GetActiveTimers => "get_active_timers",
            Self::ListTimeLogs => "list_time_logs",
            Self::AddTimeEntry => "add_time_entry",
            Self::CreateProject => "create_project",
            Self::GetProject => "get_project",
            Self::ListProjects => "list_projects",
            Self::UpdateProject => "update_project",
            Self::DeleteProject => "delete_project",
        }
    }

    /// Connections stay open after these; every other request closes the
    /// connection once its response is written.
    pub fn keeps_connection(&self) -> bool {
        matches!(self, Self::Ping | Self::Unsubscribe)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ping" => Self::Ping,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "get_board" => Self::GetBoard,
            "list_boards" => Self::ListBoards,
            "create_board" => Self::CreateBoard,
            "get_active_board" => Self::GetActiveBoard,
            "add_task" => Self::AddTask,
            "move_task" => Self::MoveTask,
            "update_task" => Self::UpdateTask,
            "delete_task" => Self::DeleteTask,
            "checkout_task" => Self::CheckoutTask,
            "add_column" => Self::AddColumn,
            "delete_column" => Self::DeleteColumn,
            "create_action" => Self::CreateAction,
            "update_action" => Self::UpdateAction,
            "delete_action" => Self::DeleteAction,
            "get_action" => Self::GetAction,
            "list_actions" => Self::ListActions,
            "enable_action" => Self::EnableAction,
            "disable_action" => Self::DisableAction,
            "start_timer" => Self::StartTimer,
            "stop_timer" => Self::StopTimer,
            "get_active_timers" => Self::GetActiveTimers,
            "list_time_logs" => Self::ListTimeLogs,
            "add_time_entry" => Self::AddTimeEntry,
            "create_project" => Self::CreateProject,
            "get_project" => Self::GetProject,
            "list_projects" => Self::ListProjects,
            "update_project" => Self::UpdateProject,
            "delete_project" => Self::DeleteProject,
            other => return Err(format!("unknown request type: {other}")),
        })
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// get_board, subscribe, unsubscribe
#[derive(Debug, Clone, Deserialize)]
pub struct BoardRef {
    #[serde(default)]
    pub board_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBoardsPayload {
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBoardPayload {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetActiveBoardPayload {
    #[serde(default)]
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTaskPayload {
    pub board_id: String,
    pub task: CreateTaskRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveTaskPayload {
    pub board_id: String,
    pub task_id: String,
    pub target_column_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskPayload {
    pub board_id: String,
    pub task_id: String,
    #[serde(default)]
    pub task: UpdateTaskRequest,
}

/// delete_task, checkout_task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRef {
    pub board_id: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddColumnPayload {
    pub board_id: String,
    pub column: CreateColumnRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteColumnPayload {
    pub board_id: String,
    pub column_name: String,
}

/// delete_action, get_action, enable_action, disable_action
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRef {
    pub action_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartTimerPayload {
    pub project_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimerPayload {
    pub project_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Dates are `YYYY-MM-DD`, both ends inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTimeLogsPayload {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTimeEntryPayload {
    pub project_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    /// RFC 3339
    pub start_time: String,
    pub duration_seconds: i64,
    #[serde(default)]
    pub description: String,
}

/// get_project, delete_project
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub project_id: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::error(ProtocolError::Encode(e)),
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }

    /// Decode `data` into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null)).map_err(ProtocolError::InvalidPayload)
    }
}

// ============================================================================
// Notifications (subscribe mode only)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BoardUpdated,
    TaskCreated,
    TaskUpdated,
    TaskMoved,
    TaskDeleted,
    Pong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Notification {
    pub fn new(kind: NotificationType, board_id: &str, data: impl Serialize) -> Self {
        Self {
            kind,
            board_id: Some(board_id.to_string()),
            data: serde_json::to_value(data).ok(),
        }
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Serialize a message to JSON bytes with a trailing newline
pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a message from JSON bytes (strips trailing newline)
pub fn deserialize_message<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let trimmed = if bytes.last() == Some(&b'\n') {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    serde_json::from_slice(trimmed)
}

/// Decode one request line, enforcing the frame limit
pub fn decode_request(line: &str) -> Result<Request, ProtocolError> {
    if line.len() > MAX_REQUEST_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: line.len(),
            max: MAX_REQUEST_FRAME_SIZE,
        });
    }
    deserialize_message(line.as_bytes()).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_type_names_roundtrip() {
        for name in [
            "ping",
            "subscribe",
            "get_board",
            "checkout_task",
            "list_actions",
            "add_time_entry",
            "delete_project",
        ] {
            let kind: RequestType = name.parse().unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert_eq!(
            "launch_rockets".parse::<RequestType>().unwrap_err(),
            "unknown request type: launch_rockets"
        );
    }

    #[test]
    fn test_missing_payload_decodes_as_empty_object() {
        let req: Request = deserialize_message(b"{\"type\":\"list_boards\"}\n").unwrap();
        assert_eq!(req.request_type(), Some(RequestType::ListBoards));
        let payload: ListBoardsPayload = req.parse_payload().unwrap();
        assert!(payload.project_id.is_none());

        let null = Request::with_payload("get_active_board", Value::Null);
        let payload: GetActiveBoardPayload = null.parse_payload().unwrap();
        assert!(payload.session_name.is_none());
    }

    #[test]
    fn test_payload_missing_required_field_is_invalid() {
        let req = Request::with_payload("move_task", json!({"board_id": "p/default"}));
        let err = req.parse_payload::<MoveTaskPayload>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload(_)));
        assert!(err.to_string().contains("task_id"));
    }

    #[test]
    fn test_add_task_payload_shape() {
        let req = Request::with_payload(
            "add_task",
            json!({
                "board_id": "web/default",
                "task": {"title": "Fix login", "priority": "high", "column_name": "To Do", "tags": ["auth"]}
            }),
        );
        let payload: AddTaskPayload = req.parse_payload().unwrap();
        assert_eq!(payload.board_id, "web/default");
        assert_eq!(payload.task.title, "Fix login");
        assert_eq!(payload.task.tags, vec!["auth".to_string()]);
        assert!(payload.task.due_date.is_none());
    }

    #[test]
    fn test_response_wire_shape() {
        let ok = serde_json::to_value(Response::ok("pong")).unwrap();
        assert_eq!(ok, json!({"success": true, "data": "pong"}));

        let err = serde_json::to_value(Response::error("board not found: x")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "board not found: x"}));
    }

    #[test]
    fn test_notification_wire_shape() {
        let n = Notification::new(NotificationType::TaskMoved, "web/default", json!({"id": "web/default"}));
        let bytes = serialize_message(&n).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));

        let value: Value = deserialize_message(&bytes).unwrap();
        assert_eq!(value["type"], "task_moved");
        assert_eq!(value["board_id"], "web/default");

        let back: Notification = deserialize_message(&bytes).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn test_decode_request_rejects_oversized_frame() {
        let line = format!("{{\"type\":\"ping\",\"payload\":\"{}\"}}\n", "x".repeat(MAX_REQUEST_FRAME_SIZE));
        let err = decode_request(&line).unwrap_err();
        assert!(err.to_string().starts_with("Request frame too large"));
        assert!(err.to_string().contains("max 1048576"));
    }

    #[test]
    fn test_decode_request_rejects_garbage() {
        let err = decode_request("not json\n").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
