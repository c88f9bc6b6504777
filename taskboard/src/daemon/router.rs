// Request routing: decode payloads, call use cases, notify board subscribers
//
// Board, action and project use cases serialize under one coarse lock
// (shared for reads). Timers are guarded by the time tracker itself.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::protocol::*;
use super::registry::{ConnectionId, SubscriberRegistry};
use crate::domain::task_id::TaskId;
use crate::domain::time_log::TimeLog;
use crate::domain::DomainError;
use crate::sessions::SessionSync;
use crate::time_tracking::{TimeLogQuery, TimeTrackingManager};
use crate::usecase::actions::{CreateActionRequest, ListActionsRequest, UpdateActionRequest};
use crate::usecase::boards::default_columns;
use crate::usecase::projects::{CreateProjectRequest, UpdateProjectRequest};
use crate::usecase::{ActionService, BoardService, CheckoutTask, ProjectService};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Unavailable(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

type RouteResult = Result<Response, RouteError>;

pub struct Router {
    boards: BoardService,
    projects: ProjectService,
    actions: ActionService,
    time: Arc<TimeTrackingManager>,
    sessions: Option<SessionSync>,
    checkout: Option<Arc<CheckoutTask>>,
    registry: Arc<SubscriberRegistry>,
    lock: RwLock<()>,
}

impl Router {
    pub fn new(
        boards: BoardService,
        projects: ProjectService,
        actions: ActionService,
        time: Arc<TimeTrackingManager>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            boards,
            projects,
            actions,
            time,
            sessions: None,
            checkout: None,
            registry,
            lock: RwLock::new(()),
        }
    }

    /// Enables `get_active_board`.
    pub fn with_sessions(mut self, sessions: SessionSync) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Enables `checkout_task`.
    pub fn with_checkout(mut self, checkout: Arc<CheckoutTask>) -> Self {
        self.checkout = Some(checkout);
        self
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Always answers; failures become `{success: false}`.
    pub async fn handle(&self, conn: ConnectionId, request: &Request) -> Response {
        let kind = match request.kind.parse::<RequestType>() {
            Ok(kind) => kind,
            Err(message) => return Response::error(message),
        };
        match self.dispatch(conn, kind, request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(request = %kind, %conn, error = %err, "Request failed");
                Response::error(err)
            }
        }
    }

    async fn dispatch(&self, conn: ConnectionId, kind: RequestType, req: &Request) -> RouteResult {
        match kind {
            RequestType::Ping => Ok(Response::ok("pong")),
            RequestType::Subscribe => Err(RouteError::Invalid(
                "subscribe switches the connection to streaming and is handled by the connection".to_string(),
            )),
            RequestType::Unsubscribe => {
                let p: BoardRef = req.parse_payload()?;
                self.registry.unregister(&p.board_id, conn).await;
                Ok(Response::ok("unsubscribed"))
            }

            RequestType::GetBoard
            | RequestType::ListBoards
            | RequestType::CreateBoard
            | RequestType::GetActiveBoard => self.board_request(kind, req).await,

            RequestType::AddTask
            | RequestType::MoveTask
            | RequestType::UpdateTask
            | RequestType::DeleteTask
            | RequestType::CheckoutTask
            | RequestType::AddColumn
            | RequestType::DeleteColumn => self.board_mutation(kind, req).await,

            RequestType::CreateAction
            | RequestType::UpdateAction
            | RequestType::DeleteAction
            | RequestType::GetAction
            | RequestType::ListActions
            | RequestType::EnableAction
            | RequestType::DisableAction => self.action_request(kind, req).await,

            RequestType::StartTimer
            | RequestType::StopTimer
            | RequestType::GetActiveTimers
            | RequestType::ListTimeLogs
            | RequestType::AddTimeEntry => self.timer_request(kind, req),

            RequestType::CreateProject
            | RequestType::GetProject
            | RequestType::ListProjects
            | RequestType::UpdateProject
            | RequestType::DeleteProject => self.project_request(kind, req).await,
        }
    }

    // ------------------------------------------------------------------------
    // Boards
    // ------------------------------------------------------------------------

    async fn board_request(&self, kind: RequestType, req: &Request) -> RouteResult {
        match kind {
            RequestType::GetBoard => {
                let p: BoardRef = req.parse_payload()?;
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.boards.get_board(&p.board_id)?))
            }
            RequestType::ListBoards => {
                let p: ListBoardsPayload = req.parse_payload()?;
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.boards.list_boards(p.project_id.as_deref())?))
            }
            RequestType::CreateBoard => {
                let p: CreateBoardPayload = req.parse_payload()?;
                let _guard = self.lock.write().await;
                self.projects.find(&p.project_id)?;
                let board = self
                    .boards
                    .create_board_with_columns(&p.project_id, &p.name, &p.description, default_columns())?;
                Ok(Response::ok(board))
            }
            _ => {
                // Unknown session names are not an error, just no board
                let p: GetActiveBoardPayload = req.parse_payload().unwrap_or_default();
                let board_id = self.active_board(p.session_name).await?;
                Ok(Response::ok(json!({ "board_id": board_id.unwrap_or_default() })))
            }
        }
    }

    async fn active_board(&self, session_name: Option<String>) -> Result<Option<String>, RouteError> {
        let sync = self
            .sessions
            .clone()
            .ok_or(RouteError::Unavailable("session tracking not available"))?;
        // May sync a missing board into existence
        let _guard = self.lock.write().await;
        tokio::task::spawn_blocking(move || {
            if !sync.tracker().is_available() {
                return Err(RouteError::Unavailable("session tracking not available"));
            }
            Ok(sync.active_board_id(session_name.as_deref())?)
        })
        .await?
    }

    async fn board_mutation(&self, kind: RequestType, req: &Request) -> RouteResult {
        let _guard = self.lock.write().await;
        match kind {
            RequestType::AddTask => {
                let p: AddTaskPayload = req.parse_payload()?;
                let task = self.boards.add_task(&p.board_id, p.task)?;
                self.notify(&p.board_id, NotificationType::TaskCreated, &task).await;
                Ok(Response::ok(task))
            }
            RequestType::MoveTask => {
                let p: MoveTaskPayload = req.parse_payload()?;
                let board = self.boards.move_task(&p.board_id, &p.task_id, &p.target_column_name)?;
                self.notify(&p.board_id, NotificationType::TaskMoved, &board).await;
                Ok(Response::ok(board))
            }
            RequestType::UpdateTask => {
                let p: UpdateTaskPayload = req.parse_payload()?;
                let task = self.boards.update_task(&p.board_id, &p.task_id, p.task)?;
                self.notify(&p.board_id, NotificationType::TaskUpdated, &task).await;
                Ok(Response::ok(task))
            }
            RequestType::DeleteTask => {
                let p: TaskRef = req.parse_payload()?;
                let task = self.boards.delete_task(&p.board_id, &p.task_id)?;
                self.notify(&p.board_id, NotificationType::TaskDeleted, &task).await;
                Ok(Response::ok(task))
            }
            RequestType::CheckoutTask => {
                let p: TaskRef = req.parse_payload()?;
                let checkout = self
                    .checkout
                    .clone()
                    .ok_or(RouteError::Unavailable("git integration not available"))?;
                let (board_id, task_id) = (p.board_id.clone(), p.task_id);
                let outcome = tokio::task::spawn_blocking(move || checkout.execute(&board_id, &task_id)).await??;
                let board = self.boards.get_board(&p.board_id)?;
                self.notify(&p.board_id, NotificationType::BoardUpdated, &board).await;
                Ok(Response::ok(outcome))
            }
            RequestType::AddColumn => {
                let p: AddColumnPayload = req.parse_payload()?;
                let board = self.boards.add_column(&p.board_id, p.column)?;
                self.notify(&p.board_id, NotificationType::BoardUpdated, &board).await;
                Ok(Response::ok(board))
            }
            _ => {
                let p: DeleteColumnPayload = req.parse_payload()?;
                let board = self.boards.delete_column(&p.board_id, &p.column_name)?;
                self.notify(&p.board_id, NotificationType::BoardUpdated, &board).await;
                Ok(Response::ok(board))
            }
        }
    }

    async fn notify(&self, board_id: &str, kind: NotificationType, data: &impl Serialize) {
        let delivered = self.registry.publish(board_id, Notification::new(kind, board_id, data)).await;
        debug!(board_id, ?kind, delivered, "Notified subscribers");
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    async fn action_request(&self, kind: RequestType, req: &Request) -> RouteResult {
        match kind {
            RequestType::CreateAction => {
                let p: CreateActionRequest = req.parse_payload()?;
                let _guard = self.lock.write().await;
                Ok(Response::ok(self.actions.create_action(p)?))
            }
            RequestType::UpdateAction => {
                let p: UpdateActionRequest = req.parse_payload()?;
                let _guard = self.lock.write().await;
                Ok(Response::ok(self.actions.update_action(p)?))
            }
            RequestType::DeleteAction => {
                let p: ActionRef = req.parse_payload()?;
                let _guard = self.lock.write().await;
                self.actions.delete_action(&p.action_id)?;
                Ok(Response::ok("action deleted"))
            }
            RequestType::GetAction => {
                let p: ActionRef = req.parse_payload()?;
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.actions.get_action(&p.action_id)?))
            }
            RequestType::ListActions => {
                let p: ListActionsRequest = req.parse_payload()?;
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.actions.list_actions(p)?))
            }
            _ => {
                let p: ActionRef = req.parse_payload()?;
                let enabled = kind == RequestType::EnableAction;
                let _guard = self.lock.write().await;
                Ok(Response::ok(self.actions.set_enabled(&p.action_id, enabled)?))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn timer_request(&self, kind: RequestType, req: &Request) -> RouteResult {
        match kind {
            RequestType::StartTimer => {
                let p: StartTimerPayload = req.parse_payload()?;
                let task_id = parse_task_id(p.task_id.as_deref())?;
                let log = self.time.start_timer(&p.project_id, task_id, &p.description)?;
                let mut data = json!({
                    "id": log.id,
                    "project_id": log.project_id,
                    "start_time": log.start_time,
                    "running": log.is_running(),
                });
                with_task_id(&mut data, &log);
                Ok(Response::ok(data))
            }
            RequestType::StopTimer => {
                let p: StopTimerPayload = req.parse_payload()?;
                let task_id = parse_task_id(p.task_id.as_deref())?;
                let log = self.time.stop_timer(&p.project_id, task_id.as_ref())?;
                Ok(Response::ok(json!({
                    "id": log.id,
                    "project_id": log.project_id,
                    "start_time": log.start_time,
                    "end_time": log.end_time,
                    "duration": log.duration_secs,
                })))
            }
            RequestType::GetActiveTimers => {
                let now = Utc::now();
                let timers: Vec<Value> = self
                    .time
                    .active_timers()
                    .iter()
                    .map(|t| {
                        let mut entry = json!({
                            "id": t.id,
                            "project_id": t.project_id,
                            "source": t.source.as_str(),
                            "start_time": t.start_time,
                            "duration": t.duration_at(now).num_seconds(),
                        });
                        with_task_id(&mut entry, t);
                        entry
                    })
                    .collect();
                Ok(Response::ok(timers))
            }
            RequestType::ListTimeLogs => {
                let p: ListTimeLogsPayload = req.parse_payload()?;
                let query = TimeLogQuery {
                    project_id: p.project_id.filter(|id| !id.is_empty()),
                    task_id: parse_task_id(p.task_id.as_deref())?,
                    from: parse_day(p.start_date.as_deref(), "start_date", false)?,
                    to: parse_day(p.end_date.as_deref(), "end_date", true)?,
                };
                let logs: Vec<Value> = self.time.list_time_logs(&query)?.iter().map(time_log_entry).collect();
                Ok(Response::ok(logs))
            }
            _ => {
                let p: AddTimeEntryPayload = req.parse_payload()?;
                let start = DateTime::parse_from_rfc3339(&p.start_time)
                    .map_err(|_| RouteError::Invalid("invalid start_time format, use RFC3339".to_string()))?
                    .with_timezone(&Utc);
                let task_id = parse_task_id(p.task_id.as_deref())?;
                let log = self.time.add_manual_entry(
                    &p.project_id,
                    task_id,
                    start,
                    ChronoDuration::seconds(p.duration_seconds),
                    &p.description,
                )?;
                Ok(Response::ok(json!({
                    "id": log.id,
                    "project_id": log.project_id,
                    "start_time": log.start_time,
                    "end_time": log.end_time,
                    "duration": log.duration_secs,
                    "description": log.description,
                })))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------------

    async fn project_request(&self, kind: RequestType, req: &Request) -> RouteResult {
        match kind {
            RequestType::CreateProject => {
                let p: CreateProjectRequest = req.parse_payload()?;
                let _guard = self.lock.write().await;
                Ok(Response::ok(self.projects.create_project(p)?))
            }
            RequestType::GetProject => {
                let p: ProjectRef = req.parse_payload()?;
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.projects.get_project(&p.project_id)?))
            }
            RequestType::ListProjects => {
                let _guard = self.lock.read().await;
                Ok(Response::ok(self.projects.list_projects()?))
            }
            RequestType::UpdateProject => {
                let p: UpdateProjectRequest = req.parse_payload()?;
                let _guard = self.lock.write().await;
                Ok(Response::ok(self.projects.update_project(p)?))
            }
            _ => {
                let p: ProjectRef = req.parse_payload()?;
                let _guard = self.lock.write().await;
                self.projects.delete_project(&p.project_id)?;
                Ok(Response::ok("project deleted"))
            }
        }
    }
}

fn parse_task_id(raw: Option<&str>) -> Result<Option<TaskId>, RouteError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| RouteError::Invalid("invalid task_id format".to_string())),
    }
}

/// `YYYY-MM-DD` as the first or last second of that day (UTC).
fn parse_day(raw: Option<&str>, field: &str, end_of_day: bool) -> Result<Option<DateTime<Utc>>, RouteError> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| RouteError::Invalid(format!("invalid {field} format, use YYYY-MM-DD")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| date.and_time(t).and_utc()))
}

fn with_task_id(entry: &mut Value, log: &TimeLog) {
    if let (Some(task_id), Some(map)) = (&log.task_id, entry.as_object_mut()) {
        map.insert("task_id".to_string(), json!(task_id.to_string()));
    }
}

fn time_log_entry(log: &TimeLog) -> Value {
    let mut entry = json!({
        "id": log.id,
        "project_id": log.project_id,
        "source": log.source.as_str(),
        "start_time": log.start_time,
        "description": log.description,
        "running": log.is_running(),
    });
    with_task_id(&mut entry, log);
    if let (Some(end), Some(map)) = (log.end_time, entry.as_object_mut()) {
        map.insert("end_time".to_string(), json!(end));
        map.insert("duration".to_string(), json!(log.duration_secs));
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::InProcessEventBus;
    use crate::sessions::{GeneralStrategy, SessionBoardPlanner};
    use crate::store::{JsonActionRepository, JsonBoardRepository, JsonProjectRepository, JsonTimeLogRepository};
    use crate::test_utils::{FakeRepo, FakeSessions};
    use crate::time_tracking::TimeTrackingConfig;

    fn router() -> Router {
        let boards = Arc::new(JsonBoardRepository::in_memory());
        let projects = Arc::new(JsonProjectRepository::in_memory());
        let bus = Arc::new(InProcessEventBus::new());
        let time = TimeTrackingManager::new(
            Arc::new(JsonTimeLogRepository::in_memory()),
            projects.clone(),
            None,
            None,
            TimeTrackingConfig::default(),
        );
        Router::new(
            BoardService::new(boards.clone(), Some(bus)),
            ProjectService::new(projects, boards),
            ActionService::new(Arc::new(JsonActionRepository::in_memory())),
            Arc::new(time),
            Arc::new(SubscriberRegistry::new()),
        )
    }

    async fn call(router: &Router, kind: &str, payload: Value) -> Response {
        router
            .handle(ConnectionId::next(), &Request::with_payload(kind, payload))
            .await
    }

    async fn seeded() -> Router {
        let router = router();
        let resp = call(&router, "create_project", json!({"name": "Web"})).await;
        assert!(resp.success, "{:?}", resp.error);
        let resp = call(&router, "create_board", json!({"project_id": "web", "name": "default"})).await;
        assert!(resp.success, "{:?}", resp.error);
        router
    }

    #[tokio::test]
    async fn test_ping_and_unknown_type() {
        let router = router();
        let pong = router.handle(ConnectionId::next(), &Request::new("ping")).await;
        assert_eq!(pong.data, Some(json!("pong")));

        let unknown = router.handle(ConnectionId::next(), &Request::new("frobnicate")).await;
        assert!(!unknown.success);
        assert_eq!(unknown.error.as_deref(), Some("unknown request type: frobnicate"));
    }

    #[tokio::test]
    async fn test_add_and_move_task_notify_subscribers() {
        let router = seeded().await;
        let watcher = ConnectionId::next();
        let mut rx = router.registry().register("web/default", watcher).await;

        let resp = call(
            &router,
            "add_task",
            json!({"board_id": "web/default", "task": {"title": "Fix login", "priority": "high", "column_name": "To Do"}}),
        )
        .await;
        assert!(resp.success, "{:?}", resp.error);
        let task_id = resp.data.as_ref().unwrap()["id"].as_str().unwrap().to_string();
        let created = rx.recv().await.unwrap();
        assert_eq!(created.kind, NotificationType::TaskCreated);
        assert_eq!(created.data.unwrap()["title"], "Fix login");

        let short = task_id.split('-').take(2).collect::<Vec<_>>().join("-");
        let resp = call(
            &router,
            "move_task",
            json!({"board_id": "web/default", "task_id": short, "target_column_name": "In Progress"}),
        )
        .await;
        assert!(resp.success, "{:?}", resp.error);
        let moved = rx.recv().await.unwrap();
        assert_eq!(moved.kind, NotificationType::TaskMoved);
        assert_eq!(moved.board_id.as_deref(), Some("web/default"));

        let resp = call(&router, "delete_task", json!({"board_id": "web/default", "task_id": task_id})).await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(rx.recv().await.unwrap().kind, NotificationType::TaskDeleted);
    }

    #[tokio::test]
    async fn test_column_changes_publish_board_updated() {
        let router = seeded().await;
        let mut rx = router.registry().register("web/default", ConnectionId::next()).await;

        let resp = call(
            &router,
            "add_column",
            json!({"board_id": "web/default", "column": {"name": "Review", "order": 3, "wip_limit": 2}}),
        )
        .await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(rx.recv().await.unwrap().kind, NotificationType::BoardUpdated);

        let resp = call(&router, "delete_column", json!({"board_id": "web/default", "column_name": "Review"})).await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(rx.recv().await.unwrap().kind, NotificationType::BoardUpdated);
    }

    #[tokio::test]
    async fn test_bad_payload_and_missing_board_fail_softly() {
        let router = seeded().await;
        let resp = call(&router, "move_task", json!({"board_id": "web/default"})).await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().starts_with("invalid payload"));

        let resp = call(&router, "get_board", json!({"board_id": "nope/default"})).await;
        assert!(!resp.success);
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_timer_lifecycle() {
        let router = seeded().await;
        let resp = call(&router, "start_timer", json!({"project_id": "web", "description": "focus"})).await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(resp.data.as_ref().unwrap()["running"], json!(true));

        let active = call(&router, "get_active_timers", json!({})).await;
        let timers = active.data.unwrap();
        assert_eq!(timers.as_array().unwrap().len(), 1);
        assert_eq!(timers[0]["source"], "timer");

        let stopped = call(&router, "stop_timer", json!({"project_id": "web"})).await;
        assert!(stopped.success, "{:?}", stopped.error);
        assert!(stopped.data.unwrap()["duration"].as_i64().unwrap() >= 0);

        let again = call(&router, "stop_timer", json!({"project_id": "web"})).await;
        assert!(!again.success);
    }

    #[tokio::test]
    async fn test_time_entries_and_date_validation() {
        let router = seeded().await;
        let bad = call(
            &router,
            "add_time_entry",
            json!({"project_id": "web", "start_time": "yesterday", "duration_seconds": 60}),
        )
        .await;
        assert_eq!(bad.error.as_deref(), Some("invalid start_time format, use RFC3339"));

        let ok = call(
            &router,
            "add_time_entry",
            json!({"project_id": "web", "start_time": "2026-03-02T09:00:00Z", "duration_seconds": 5400, "description": "review"}),
        )
        .await;
        assert!(ok.success, "{:?}", ok.error);
        assert_eq!(ok.data.as_ref().unwrap()["end_time"], "2026-03-02T10:30:00Z");

        let bad_date = call(&router, "list_time_logs", json!({"project_id": "web", "start_date": "03/02/2026"})).await;
        assert_eq!(bad_date.error.as_deref(), Some("invalid start_date format, use YYYY-MM-DD"));

        let in_range = call(
            &router,
            "list_time_logs",
            json!({"project_id": "web", "start_date": "2026-03-02", "end_date": "2026-03-02"}),
        )
        .await;
        let logs = in_range.data.unwrap();
        assert_eq!(logs.as_array().unwrap().len(), 1);
        assert_eq!(logs[0]["duration"], 5400);
        assert_eq!(logs[0]["source"], "manual");
    }

    #[tokio::test]
    async fn test_action_crud_over_the_wire() {
        let router = router();
        let created = call(
            &router,
            "create_action",
            json!({
                "name": "Ping me",
                "scope": "global",
                "trigger": {"type": "event", "event": "task.created"},
                "action_type": {"type": "notification", "title": "New task", "message": "Something landed"}
            }),
        )
        .await;
        assert!(created.success, "{:?}", created.error);
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        let disabled = call(&router, "disable_action", json!({"action_id": id})).await;
        assert_eq!(disabled.data.unwrap()["enabled"], json!(false));

        let enabled_only = call(&router, "list_actions", json!({"enabled_only": true})).await;
        assert_eq!(enabled_only.data.unwrap().as_array().unwrap().len(), 0);

        let deleted = call(&router, "delete_action", json!({"action_id": id})).await;
        assert!(deleted.success);
        let missing = call(&router, "get_action", json!({"action_id": id})).await;
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn test_active_board_requires_session_tracking() {
        let router = router();
        let resp = router.handle(ConnectionId::next(), &Request::new("get_active_board")).await;
        assert_eq!(resp.error.as_deref(), Some("session tracking not available"));
    }

    #[tokio::test]
    async fn test_active_board_for_attached_session() {
        let base = router();
        let vcs = FakeRepo::with("main", &["main"]);
        let sessions = FakeSessions::with(&[("notes", "/home/me/notes")], Some("notes"));
        let sync = SessionSync::new(
            SessionBoardPlanner::new(vcs),
            sessions.clone(),
            base.boards.clone(),
            ProjectService::new(Arc::new(JsonProjectRepository::in_memory()), base.boards.repository()),
            vec![Arc::new(GeneralStrategy)],
        );
        let router = base.with_sessions(sync);

        let resp = router.handle(ConnectionId::next(), &Request::new("get_active_board")).await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(resp.data.unwrap()["board_id"], "notes/default");

        sessions.set(&[], None);
        let resp = router.handle(ConnectionId::next(), &Request::new("get_active_board")).await;
        assert_eq!(resp.data.unwrap()["board_id"], "");
    }
}
