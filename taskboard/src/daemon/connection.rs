// One accepted client connection
//
// Request mode answers each request and closes, except after `ping` and
// `unsubscribe`. A `subscribe` request switches the connection to streaming:
// one Response, then Notifications for that board until either side goes away.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::protocol::{decode_request, serialize_message, BoardRef, Request, RequestType, Response};
use super::registry::ConnectionId;
use super::router::Router;

/// Serve one connection until it closes or `shutdown` fires. The
/// connection's subscriptions are always released on return.
pub async fn handle_connection<S>(stream: S, router: Arc<Router>, shutdown: CancellationToken) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let conn = ConnectionId::next();
    debug!(%conn, "Client connected");
    let result = serve(conn, stream, &router, &shutdown).await;
    router.registry().cleanup(conn).await;
    debug!(%conn, "Client disconnected");
    result
}

async fn serve<S>(conn: ConnectionId, stream: S, router: &Router, shutdown: &CancellationToken) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let read = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            read = reader.read_line(&mut line) => read?,
        };
        if read == 0 {
            return Ok(());
        }

        let request = match decode_request(&line) {
            Ok(request) => request,
            Err(e) => {
                // Undecodable input ends the connection after one error reply
                write_frame(&mut writer, &Response::error(e)).await?;
                return Ok(());
            }
        };

        let kind = request.request_type();
        if kind == Some(RequestType::Subscribe) {
            return stream_board(conn, &request, reader, writer, router, shutdown).await;
        }

        let response = router.handle(conn, &request).await;
        write_frame(&mut writer, &response).await?;

        if !kind.is_some_and(|k| k.keeps_connection()) {
            return Ok(());
        }
    }
}

async fn stream_board<R, W>(
    conn: ConnectionId,
    request: &Request,
    mut reader: BufReader<R>,
    mut writer: W,
    router: &Router,
    shutdown: &CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let payload: BoardRef = match request.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            write_frame(&mut writer, &Response::error(e)).await?;
            return Ok(());
        }
    };

    let mut notifications = router.registry().register(&payload.board_id, conn).await;
    write_frame(&mut writer, &Response::ok("subscribed")).await?;
    debug!(%conn, board_id = %payload.board_id, "Streaming board notifications");

    // Input is only watched for EOF from here on
    let mut discard = String::new();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            next = notifications.recv() => match next {
                Some(notification) => write_frame(&mut writer, &notification).await?,
                None => return Ok(()),
            },
            read = reader.read_line(&mut discard) => {
                if matches!(read, Ok(0) | Err(_)) {
                    return Ok(());
                }
                discard.clear();
            }
        }
    }
}

async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serialize_message(msg)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::InProcessEventBus;
    use crate::daemon::protocol::{deserialize_message, Notification, NotificationType};
    use crate::daemon::registry::SubscriberRegistry;
    use crate::store::{JsonActionRepository, JsonBoardRepository, JsonProjectRepository, JsonTimeLogRepository};
    use crate::test_utils::{assert_eventually_bool, TICK, WAIT};
    use crate::time_tracking::{TimeTrackingConfig, TimeTrackingManager};
    use crate::usecase::{ActionService, BoardService, ProjectService};
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    fn router() -> Arc<Router> {
        let boards = Arc::new(JsonBoardRepository::in_memory());
        let projects = Arc::new(JsonProjectRepository::in_memory());
        let time = TimeTrackingManager::new(
            Arc::new(JsonTimeLogRepository::in_memory()),
            projects.clone(),
            None,
            None,
            TimeTrackingConfig::default(),
        );
        Arc::new(Router::new(
            BoardService::new(boards.clone(), Some(Arc::new(InProcessEventBus::new()))),
            ProjectService::new(projects, boards),
            ActionService::new(Arc::new(JsonActionRepository::in_memory())),
            Arc::new(time),
            Arc::new(SubscriberRegistry::new()),
        ))
    }

    fn spawn(router: &Arc<Router>) -> (UnixStream, tokio::task::JoinHandle<Result<()>>, CancellationToken) {
        let (client, server) = UnixStream::pair().unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(handle_connection(server, router.clone(), token.clone()));
        (client, handle, token)
    }

    async fn send(client: &mut BufReader<UnixStream>, request: serde_json::Value) {
        let bytes = serialize_message(&request).unwrap();
        client.get_mut().write_all(&bytes).await.unwrap();
    }

    async fn recv<T: for<'de> serde::Deserialize<'de>>(client: &mut BufReader<UnixStream>) -> T {
        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        deserialize_message(line.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_ping_keeps_connection_open_other_requests_close_it() {
        let router = router();
        let (client, handle, _token) = spawn(&router);
        let mut client = BufReader::new(client);

        send(&mut client, json!({"type": "ping"})).await;
        let pong: Response = recv(&mut client).await;
        assert_eq!(pong.data, Some(json!("pong")));

        send(&mut client, json!({"type": "list_projects"})).await;
        let listed: Response = recv(&mut client).await;
        assert!(listed.success);

        handle.await.unwrap().unwrap();
        let mut rest = String::new();
        assert_eq!(client.read_line(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_gets_error_then_close() {
        let router = router();
        let (client, handle, _token) = spawn(&router);
        let mut client = BufReader::new(client);

        client.get_mut().write_all(b"this is not json\n").await.unwrap();
        let resp: Response = recv(&mut client).await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().starts_with("invalid request"));
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_notifications_and_is_cleaned_up() {
        let router = router();
        let (client, handle, _token) = spawn(&router);
        let mut client = BufReader::new(client);

        send(&mut client, json!({"type": "subscribe", "payload": {"board_id": "web/default"}})).await;
        let ack: Response = recv(&mut client).await;
        assert_eq!(ack.data, Some(json!("subscribed")));
        assert_eq!(router.registry().subscriber_count("web/default").await, 1);

        router
            .registry()
            .publish(
                "web/default",
                Notification::new(NotificationType::BoardUpdated, "web/default", json!({"id": "web/default"})),
            )
            .await;
        let note: Notification = recv(&mut client).await;
        assert_eq!(note.kind, NotificationType::BoardUpdated);

        drop(client);
        handle.await.unwrap().unwrap();
        assert_eq!(router.registry().board_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_streaming_connection() {
        let router = router();
        let (client, handle, token) = spawn(&router);
        let mut client = BufReader::new(client);

        send(&mut client, json!({"type": "subscribe", "payload": {"board_id": "b"}})).await;
        let _: Response = recv(&mut client).await;

        token.cancel();
        handle.await.unwrap().unwrap();
        let registry = router.registry().clone();
        assert_eventually_bool("registry to drain", WAIT, TICK, || {
            let registry = registry.clone();
            async move { registry.board_count().await == 0 }
        })
        .await;
    }
}
