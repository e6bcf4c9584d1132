//! Mock implementations for testing
//!
//! These mocks let the session and dispatch paths run without a network
//! connection or a completion provider.

use crate::db::Database;
use crate::llm::{CompletionRequest, CompletionResponse, CompletionService, UpstreamError};
use crate::relay::BroadcastRelay;
use crate::session::{FrameSink, FrameSource, SessionContext, TransportError, TurnSettings};
use crate::store::{LocalPhotoStore, MemoryCache, UserDirectory};
use crate::tools::ToolDispatcher;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mock completion service
// ============================================================================

/// Completion service that returns queued responses
pub struct MockCompletionService {
    responses: Mutex<VecDeque<Result<CompletionResponse, UpstreamError>>>,
    model_id: String,
    delay: Mutex<Option<Duration>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: UpstreamError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Hold every request for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Dispatcher collaborators
// ============================================================================

/// Real in-memory collaborators behind a test dispatcher
pub struct TestDeps {
    pub db: Database,
    pub cache: Arc<MemoryCache>,
    pub photos: Arc<LocalPhotoStore>,
    _dir: tempfile::TempDir,
}

impl TestDeps {
    pub fn users(&self) -> Arc<dyn UserDirectory> {
        Arc::new(self.db.clone())
    }
}

pub fn test_dispatcher_deps() -> TestDeps {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let photos = Arc::new(LocalPhotoStore::new(
        db.clone(),
        dir.path().join("photos"),
        "http://localhost:8765",
    ));
    TestDeps {
        db,
        cache: Arc::new(MemoryCache::new()),
        photos,
        _dir: dir,
    }
}

pub fn test_dispatcher() -> (ToolDispatcher, TestDeps) {
    let deps = test_dispatcher_deps();
    let dispatcher = ToolDispatcher::new(deps.users(), deps.photos.clone(), deps.cache.clone());
    (dispatcher, deps)
}

/// Session context over a mock completion service and real collaborators
pub fn test_session_context(
    completions: Arc<MockCompletionService>,
) -> (SessionContext, TestDeps) {
    let (dispatcher, deps) = test_dispatcher();
    let context = SessionContext {
        completions,
        dispatcher: Arc::new(dispatcher),
        relay: BroadcastRelay::new(8),
        persona: Arc::from(vec!["you are a test persona".to_string()]),
        settings: TurnSettings {
            max_tokens: Some(50),
            temperature: Some(0.1),
            outbound_capacity: 16,
        },
    };
    (context, deps)
}

// ============================================================================
// Scripted connection halves
// ============================================================================

/// Inbound frames fed by the test; dropping the handle is a clean close
pub struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

impl ScriptedSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<String, TransportError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
struct SinkLog {
    bytes: Vec<u8>,
    written: usize,
}

/// Sink that writes each frame in small chunks, yielding between them,
/// so interleaved writers would corrupt the byte log
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    closed: Arc<AtomicBool>,
    frame_tx: mpsc::UnboundedSender<String>,
    chunk: usize,
    fail_after: Option<usize>,
}

/// Test-side view of a `RecordingSink`
#[derive(Clone)]
pub struct SinkProbe {
    log: Arc<Mutex<SinkLog>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn chunked(chunk: usize) -> (Self, SinkProbe) {
        let (sink, probe, _frames) = Self::build(chunk, None);
        (sink, probe)
    }

    /// Accept `count` frames, then fail every write
    pub fn failing_after(count: usize) -> (Self, SinkProbe) {
        let (sink, probe, _frames) = Self::build(64, Some(count));
        (sink, probe)
    }

    /// Also stream each completed frame to the test as it is written
    pub fn streaming() -> (Self, SinkProbe, mpsc::UnboundedReceiver<String>) {
        Self::build(8, None)
    }

    fn build(
        chunk: usize,
        fail_after: Option<usize>,
    ) -> (Self, SinkProbe, mpsc::UnboundedReceiver<String>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let closed = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let sink = Self {
            log: log.clone(),
            closed: closed.clone(),
            frame_tx,
            chunk: chunk.max(1),
            fail_after,
        };
        (sink, SinkProbe { log, closed }, frame_rx)
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if let Some(limit) = self.fail_after {
            if self.log.lock().unwrap().written >= limit {
                return Err(TransportError::Write("peer reset".to_string()));
            }
        }
        for chunk in frame.as_bytes().chunks(self.chunk) {
            self.log.lock().unwrap().bytes.extend_from_slice(chunk);
            tokio::task::yield_now().await;
        }
        {
            let mut log = self.log.lock().unwrap();
            log.bytes.push(b'\n');
            log.written += 1;
        }
        let _ = self.frame_tx.send(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl SinkProbe {
    /// Frames as reconstructed from the raw byte log
    pub fn frames(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        String::from_utf8_lossy(&log.bytes)
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
