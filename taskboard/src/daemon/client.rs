// Blocking client for the daemon socket
// Used by the `tb` binary and by integration tests

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::config::Config;
use super::protocol::{
    deserialize_message, serialize_message, Notification, Request, Response, MAX_RESPONSE_FRAME_SIZE,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.socket_path)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn connect(&self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!(
                "Failed to connect to daemon at {} (is taskboard-daemon running?)",
                self.socket_path.display()
            )
        })?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    /// One request on a fresh connection.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect()?;
        write_request(&mut stream, request)?;
        let mut reader = BufReader::new(stream);
        read_frame(&mut reader)
    }

    /// Send and unwrap: a failed response becomes an error carrying its message.
    pub fn call(&self, kind: &str, payload: Option<Value>) -> Result<Value> {
        let request = Request {
            kind: kind.to_string(),
            payload,
        };
        let response = self.send(&request)?;
        if !response.success {
            bail!(response.error.unwrap_or_else(|| "request failed".to_string()));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }

    pub fn ping(&self) -> Result<()> {
        match self.call("ping", None)? {
            Value::String(s) if s == "pong" => Ok(()),
            other => Err(anyhow!("Unexpected ping reply: {other}")),
        }
    }

    /// Switch a connection to streaming for `board_id`.
    pub fn subscribe(&self, board_id: &str) -> Result<Subscription> {
        let mut stream = self.connect()?;
        write_request(
            &mut stream,
            &Request::with_payload("subscribe", serde_json::json!({ "board_id": board_id })),
        )?;
        let mut reader = BufReader::new(stream);
        let ack: Response = read_frame(&mut reader)?;
        if !ack.success {
            bail!(ack.error.unwrap_or_else(|| "subscribe failed".to_string()));
        }
        // Notifications arrive whenever the board changes
        reader.get_ref().set_read_timeout(None)?;
        Ok(Subscription { reader })
    }
}

/// Live notification stream; iteration ends when the daemon closes it.
pub struct Subscription {
    reader: BufReader<UnixStream>,
}

impl Subscription {
    /// Bound the wait for the next notification.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }
}

impl Iterator for Subscription {
    type Item = Result<Notification>;

    fn next(&mut self) -> Option<Self::Item> {
        match read_frame(&mut self.reader) {
            Err(e) if is_closed(&e) => None,
            other => Some(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Daemon closed connection")]
struct Closed;

fn is_closed(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Closed>().is_some()
}

fn write_request(stream: &mut UnixStream, request: &Request) -> Result<()> {
    let bytes = serialize_message(request)?;
    stream.write_all(&bytes).context("Failed to send request to daemon")?;
    stream.flush().context("Failed to flush request")?;
    Ok(())
}

/// Read one line, enforcing the response frame limit
fn read_frame<T: for<'de> serde::Deserialize<'de>>(reader: &mut BufReader<UnixStream>) -> Result<T> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("Failed to read response from daemon")?;
    if read == 0 {
        return Err(Closed.into());
    }
    if line.len() > MAX_RESPONSE_FRAME_SIZE {
        bail!(
            "Response frame too large: {} bytes (max {})",
            line.len(),
            MAX_RESPONSE_FRAME_SIZE
        );
    }
    deserialize_message(line.as_bytes()).context("Failed to parse daemon response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    // Minimal scripted daemon: answers each accepted connection with `reply`
    fn serve_once(path: &Path, reply: &'static str) -> std::thread::JoinHandle<String> {
        let listener = UnixListener::bind(path).unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            reader.read_line(&mut request).unwrap();
            reader.get_mut().write_all(reply.as_bytes()).unwrap();
            request
        })
    }

    #[test]
    fn test_call_returns_data_and_sends_framed_request() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d.sock");
        let server = serve_once(&path, "{\"success\":true,\"data\":{\"board_id\":\"web/default\"}}\n");

        let data = DaemonClient::new(&path).call("get_active_board", None).unwrap();
        assert_eq!(data["board_id"], "web/default");

        let sent = server.join().unwrap();
        assert_eq!(sent, "{\"type\":\"get_active_board\"}\n");
    }

    #[test]
    fn test_failed_response_becomes_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d.sock");
        let _server = serve_once(&path, "{\"success\":false,\"error\":\"board not found: x\"}\n");

        let err = DaemonClient::new(&path).call("get_board", None).unwrap_err();
        assert_eq!(err.to_string(), "board not found: x");
    }

    #[test]
    fn test_missing_daemon_is_a_connect_error() {
        let temp = TempDir::new().unwrap();
        let err = DaemonClient::new(&temp.path().join("none.sock")).ping().unwrap_err();
        assert!(err.to_string().contains("Failed to connect to daemon"));
    }

    #[test]
    fn test_subscription_ends_when_daemon_closes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("d.sock");
        let _server = serve_once(
            &path,
            "{\"success\":true,\"data\":\"subscribed\"}\n{\"type\":\"task_deleted\",\"board_id\":\"b\"}\n",
        );

        let notes: Vec<Notification> = DaemonClient::new(&path)
            .subscribe("b")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].board_id.as_deref(), Some("b"));
    }
}
