use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};
use url::Url;

use super::AuthError;

const CALLBACK_HOST: &str = "127.0.0.1";
const FAVICON_PATH: &str = "/favicon.ico";
const AUTHORIZED_BODY: &str = "Authorized.\n";
const MAX_REQUEST_HEAD: u64 = 4096;

/// Loopback HTTP endpoint the authorization service redirects the browser to.
///
/// The first request to any path other than `/favicon.ico` fires a one-shot
/// signal; later requests are still answered but never fire it again.
/// Dropping the listener stops the server task and closes the socket.
#[derive(Debug)]
pub struct CallbackListener {
    redirect_url: Url,
    signal: oneshot::Receiver<()>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind an OS-assigned loopback port and start serving.
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind((CALLBACK_HOST, 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_url = Url::parse(&format!("http://{CALLBACK_HOST}:{port}/"))?;
        let (tx, rx) = oneshot::channel();
        let server = tokio::spawn(serve(listener, tx));
        debug!(%redirect_url, "callback listener started");
        Ok(Self {
            redirect_url,
            signal: rx,
            server,
        })
    }

    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    /// Block until the callback fires, then shut the listener down.
    ///
    /// Without a timeout the wait is unbounded.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<(), AuthError> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.signal)
                .await
                .map_err(|_| AuthError::CallbackTimeout(limit))?,
            None => (&mut self.signal).await,
        };
        received.map_err(|_| AuthError::ListenerClosed)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.abort();
        debug!(redirect_url = %self.redirect_url, "callback listener stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackRoute {
    Authorized,
    NotFound,
}

fn route(path: &str) -> CallbackRoute {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path == FAVICON_PATH {
        CallbackRoute::NotFound
    } else {
        CallbackRoute::Authorized
    }
}

async fn serve(listener: TcpListener, signal: oneshot::Sender<()>) {
    let signal = Arc::new(Mutex::new(Some(signal)));
    // Dropped together with this task, which aborts in-flight connections.
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(error = %err, "callback listener failed to accept a connection");
                return;
            }
        };
        while connections.try_join_next().is_some() {}
        connections.spawn(answer(stream, peer, Arc::clone(&signal)));
    }
}

async fn answer(
    mut stream: TcpStream,
    peer: SocketAddr,
    signal: Arc<Mutex<Option<oneshot::Sender<()>>>>,
) {
    match handle_connection(&mut stream).await {
        Ok(Some(CallbackRoute::Authorized)) => match signal.lock().await.take() {
            Some(tx) => {
                debug!(%peer, "authorization callback received");
                let _ = tx.send(());
            }
            None => debug!(%peer, "repeated authorization callback ignored"),
        },
        Ok(Some(CallbackRoute::NotFound)) => debug!(%peer, "favicon request rejected"),
        Ok(None) => debug!(%peer, "connection closed without a request"),
        Err(err) => warn!(%peer, error = %err, "failed to answer callback request"),
    }
    let _ = stream.shutdown().await;
}

async fn handle_connection(stream: &mut TcpStream) -> Result<Option<CallbackRoute>, AuthError> {
    let head = read_request_head(stream).await?;
    if head.is_empty() {
        return Ok(None);
    }
    let request = String::from_utf8_lossy(&head);
    let Some(path) = parse_request_path(&request) else {
        respond(stream, 400, "Bad Request\n").await?;
        return Ok(None);
    };

    let route = route(path);
    match route {
        CallbackRoute::Authorized => respond(stream, 200, AUTHORIZED_BODY).await?,
        CallbackRoute::NotFound => respond(stream, 404, "Not Found\n").await?,
    }
    Ok(Some(route))
}

/// Read the request line and headers up to the blank line, however the
/// client splits them across writes. Bounded by `MAX_REQUEST_HEAD`.
async fn read_request_head(stream: &mut TcpStream) -> Result<Vec<u8>, AuthError> {
    let mut reader = BufReader::new((&mut *stream).take(MAX_REQUEST_HEAD));
    let mut head = Vec::new();
    loop {
        let start = head.len();
        let n = reader.read_until(b'\n', &mut head).await?;
        let line = &head[start..];
        if n == 0 || line == b"\r\n" || line == b"\n" {
            return Ok(head);
        }
    }
}

fn parse_request_path(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) -> Result<(), AuthError> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        _ => "HTTP/1.1 400 Bad Request",
    };
    let response = format!(
        "{status_line}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}
