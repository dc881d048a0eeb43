use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::protocol::Line;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("connection lost")]
    Closed,
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Complete requests the peer sent us, one `Vec` of lines per request.
pub type Requests = mpsc::UnboundedReceiver<Vec<String>>;

struct ChannelInner {
    label: String,
    writer: Mutex<BoxedWriter>,
    pending: Mutex<VecDeque<oneshot::Sender<String>>>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChannelInner {
    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closed_tx.send_replace(true);
    }
}

/// Request/response exchange over one persistent line-oriented connection.
///
/// Either peer may call the other at any time. Our own calls are answered in
/// the order they were written; the peer's requests are handed out through
/// [`Requests`] and answered with [`CommandChannel::respond`], also in order.
#[derive(Clone)]
pub struct CommandChannel {
    inner: Arc<ChannelInner>,
}

impl CommandChannel {
    /// Starts the reader task. `request_lines` is the number of lines in one
    /// request coming from the peer.
    pub fn spawn<R, W>(
        reader: BufReader<R>,
        writer: W,
        request_lines: usize,
        label: impl Into<String>,
    ) -> (Self, Requests)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed_tx, _) = watch::channel(false);
        let inner = Arc::new(ChannelInner {
            label: label.into(),
            writer: Mutex::new(Box::new(writer)),
            pending: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            closed_tx,
            reader: std::sync::Mutex::new(None),
        });

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(
            Arc::clone(&inner),
            reader,
            request_lines.max(1),
            requests_tx,
        ));
        if let Ok(mut slot) = inner.reader.lock() {
            *slot = Some(task);
        }

        (Self { inner }, requests_rx)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection is gone, for whatever reason.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Sends one request and waits for its single response line.
    pub async fn call(&self, lines: &[&str]) -> Result<String, ChannelError> {
        let (tx, rx) = oneshot::channel();

        {
            let mut writer = self.inner.writer.lock().await;
            {
                let mut pending = self.inner.pending.lock().await;
                if self.is_closed() {
                    return Err(ChannelError::Closed);
                }
                pending.push_back(tx);
            }

            let mut frame = String::new();
            for line in lines {
                frame.push_str(&Line::Request((*line).to_string()).encode());
            }
            if let Err(e) = write_frame(&mut writer, &frame).await {
                drop(writer);
                self.close().await;
                return Err(e.into());
            }
        }

        rx.await.map_err(|_| ChannelError::Closed)
    }

    /// Answers the oldest request the peer is waiting on.
    pub async fn respond(&self, result: &str) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let frame = Line::Response(result.to_string()).encode();
        let mut writer = self.inner.writer.lock().await;
        if let Err(e) = write_frame(&mut writer, &frame).await {
            drop(writer);
            self.close().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Exclusive access to the unframed stream, used for the join handshake.
    /// Calls and responses queue behind it until it is dropped.
    pub async fn raw_writer(&self) -> RawWriter<'_> {
        RawWriter {
            writer: self.inner.writer.lock().await,
        }
    }

    /// Shuts the connection down. Outstanding calls fail with
    /// [`ChannelError::Closed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.closed_tx.send_replace(true);

        let task = self.inner.reader.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
        }
        self.inner.pending.lock().await.clear();

        // A writer stuck on a dead peer would hold the lock forever.
        if let Ok(mut writer) = self.inner.writer.try_lock() {
            let _ = writer.shutdown().await;
        }
        log::debug!("{}: channel closed", self.inner.label);
    }
}

pub struct RawWriter<'a> {
    writer: MutexGuard<'a, BoxedWriter>,
}

impl RawWriter<'_> {
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut frame = line.trim_end_matches(['\r', '\n']).to_string();
        frame.push('\n');
        write_frame(&mut self.writer, &frame).await
    }
}

async fn write_frame(writer: &mut BoxedWriter, frame: &str) -> io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

async fn read_loop<R>(
    inner: Arc<ChannelInner>,
    mut reader: BufReader<R>,
    request_lines: usize,
    requests: mpsc::UnboundedSender<Vec<String>>,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut raw = Vec::new();
    let mut request = Vec::with_capacity(request_lines);

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => {
                log::debug!("{}: peer closed the connection", inner.label);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("{}: read failed: {}", inner.label, e);
                break;
            }
        }

        // Bytes that are not UTF-8 become U+FFFD and fail to match any command.
        let line = String::from_utf8_lossy(&raw);
        match Line::decode(&line) {
            Some(Line::Request(text)) => {
                request.push(text);
                if request.len() == request_lines {
                    let complete =
                        std::mem::replace(&mut request, Vec::with_capacity(request_lines));
                    if requests.send(complete).is_err() {
                        log::debug!("{}: nobody serves requests, dropping", inner.label);
                    }
                }
            }
            Some(Line::Response(text)) => match inner.pending.lock().await.pop_front() {
                Some(waiter) => {
                    // The caller may have given up waiting.
                    let _ = waiter.send(text);
                }
                None => log::warn!("{}: dropping unsolicited response", inner.label),
            },
            None => log::warn!(
                "{}: dropping malformed line {:?}",
                inner.label,
                line.trim_end()
            ),
        }
    }

    inner.mark_closed();
    inner.pending.lock().await.clear();
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    use super::*;

    fn pair(request_lines: usize) -> (CommandChannel, Requests, tokio::io::DuplexStream) {
        let (ours, theirs) = duplex(1024);
        let (read, write) = tokio::io::split(ours);
        let (channel, requests) =
            CommandChannel::spawn(BufReader::new(read), write, request_lines, "test");
        (channel, requests, theirs)
    }

    #[tokio::test]
    async fn test_call_waits_for_response() {
        let (channel, _requests, peer) = pair(2);
        let (peer_read, mut peer_write) = tokio::io::split(peer);
        let mut peer_read = BufReader::new(peer_read);

        let call = tokio::spawn({
            let channel = channel.clone();
            async move { channel.call(&["GetMap", ""]).await }
        });

        let mut line = String::new();
        peer_read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "?GetMap\n");
        line.clear();
        peer_read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "?\n");

        peer_write.write_all(b"={}\n").await.unwrap();
        assert_eq!(call.await.unwrap().unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_requests_are_grouped_and_answered() {
        let (channel, mut requests, peer) = pair(3);
        let (peer_read, mut peer_write) = tokio::io::split(peer);
        let mut peer_read = BufReader::new(peer_read);

        peer_write
            .write_all(b"?B\n?GetRemainingTime\n?\nnoise\n?B\n")
            .await
            .unwrap();

        let request = requests.recv().await.unwrap();
        assert_eq!(request, vec!["B", "GetRemainingTime", ""]);
        channel.respond("42").await.unwrap();

        let mut line = String::new();
        peer_read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "=42\n");
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_connection() {
        let (channel, mut requests, peer) = pair(3);
        let (_peer_read, mut peer_write) = tokio::io::split(peer);

        peer_write
            .write_all(b"?B\n?Get\xffTime\n?\n?B\n?GetRemainingTime\n?\n")
            .await
            .unwrap();

        let garbled = requests.recv().await.unwrap();
        assert_eq!(garbled, vec!["B", "Get\u{FFFD}Time", ""]);
        let request = requests.recv().await.unwrap();
        assert_eq!(request, vec!["B", "GetRemainingTime", ""]);
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_peer_hangup_fails_outstanding_call() {
        let (channel, mut requests, peer) = pair(2);

        let (peer_read, peer_write) = tokio::io::split(peer);
        let mut peer_read = BufReader::new(peer_read);

        let call = tokio::spawn({
            let channel = channel.clone();
            async move { channel.call(&["EndGame", ""]).await }
        });
        let mut line = String::new();
        peer_read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "?EndGame\n");
        drop(peer_read);
        drop(peer_write);

        assert!(matches!(call.await.unwrap(), Err(ChannelError::Closed)));
        channel.closed().await;
        assert!(channel.is_closed());
        assert!(requests.recv().await.is_none());
        assert!(matches!(
            channel.call(&["EndGame", ""]).await,
            Err(ChannelError::Closed)
        ));
    }
}
