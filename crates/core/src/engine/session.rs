//! Engine session: handshake, readiness, and analysis serialization
//!
//! One [`Session`] owns one engine process. Internally it is a small actor:
//! a background read task turns engine stdout into parsed events, and a
//! controller task owns the single-writer stdin path, the session state
//! machine, and the at-most-one-in-flight analysis rule. The caller-facing
//! API is async and never touches the raw pipes.

use std::collections::VecDeque;
use std::path::Path;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::{BusyPolicy, SessionConfig};
use crate::engine::aggregate::ResultBuilder;
use crate::engine::process::{self, EngineProcess, EngineReader, EngineWriter};
use crate::engine::protocol::{parse_line, EngineEvent, UciCommand};
use crate::engine::types::{AnalysisOutcome, AnalysisRequest, AnalysisResult, StopCondition};
use crate::error::{Error, Result};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the engine said about itself during the handshake.
#[derive(Debug, Clone, Default)]
pub struct EngineIdentity {
    pub name: Option<String>,
    pub author: Option<String>,
    /// Raw `option` declaration lines, unparsed. The supported set is
    /// engine-dependent, so callers get the raw text.
    pub options: Vec<String>,
}

/// Live handle to one analysis request.
///
/// Yields each decoded engine event incrementally (for a "thinking"
/// display) and, once the request ends, the sealed [`AnalysisResult`].
pub struct AnalysisHandle {
    events: mpsc::Receiver<EngineEvent>,
    result: oneshot::Receiver<Result<AnalysisResult>>,
}

impl AnalysisHandle {
    /// Next incremental event; `None` once the request has ended.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Waits for the terminal result.
    pub async fn wait(self) -> Result<AnalysisResult> {
        self.result.await.map_err(|_| Error::EngineExited)?
    }
}

/// Handle to a running engine session.
///
/// Dropping the last handle shuts the engine down in the background.
#[derive(Clone)]
pub struct Session {
    ops: mpsc::Sender<Op>,
    identity: EngineIdentity,
}

/// Discovers (or takes) an engine binary, spawns it, and drives the UCI
/// handshake. This is the caller's entry point; on success the session is
/// `Ready`.
pub async fn discover_and_start(
    config: SessionConfig,
    explicit_path: Option<&Path>,
) -> Result<Session> {
    let path = process::locate(explicit_path)?;
    let (child, writer, reader) = EngineProcess::spawn(&path)?;
    Session::start(config, writer, reader, Some(child)).await
}

impl Session {
    /// Runs the handshake over the given transport and spawns the
    /// background tasks. Takes any line transport so tests can drive a
    /// scripted engine over an in-memory duplex.
    pub(crate) async fn start(
        config: SessionConfig,
        mut writer: EngineWriter,
        mut reader: EngineReader,
        child: Option<EngineProcess>,
    ) -> Result<Session> {
        let timeout = config.handshake_timeout;
        let identity =
            tokio::time::timeout(timeout, handshake(&config, &mut writer, &mut reader))
                .await
                .map_err(|_| {
                    Error::Handshake(format!("engine not ready within {:?}", timeout))
                })??;
        debug!(name = ?identity.name, "engine session ready");

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(read_loop(reader, event_tx));

        let (op_tx, op_rx) = mpsc::channel(16);
        let controller = Controller {
            config,
            writer,
            events: event_rx,
            child,
            active: None,
            queue: VecDeque::new(),
            closed: false,
        };
        tokio::spawn(controller.run(op_rx));

        Ok(Session { ops: op_tx, identity })
    }

    pub fn engine_name(&self) -> Option<&str> {
        self.identity.name.as_deref()
    }

    pub fn engine_author(&self) -> Option<&str> {
        self.identity.author.as_deref()
    }

    pub fn declared_options(&self) -> &[String] {
        &self.identity.options
    }

    /// Starts an analysis. If one is already in flight the call queues or
    /// fails with [`Error::Busy`] per the session's [`BusyPolicy`]; a
    /// queued call does not resolve until its request is actually sent.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisHandle> {
        let (reply, rx) = oneshot::channel();
        self.ops
            .send(Op::Analyze { request, reply })
            .await
            .map_err(|_| Error::NotReady)?;
        rx.await.map_err(|_| Error::NotReady)?
    }

    /// Stops the in-flight analysis, if any. Cooperative: sends `stop` and
    /// lets the engine finish with a `bestmove`. Idempotent.
    pub async fn cancel(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.ops.send(Op::Cancel { reply }).await.is_err() {
            return Ok(()); // session already closed
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Quits the engine, waiting briefly for a graceful exit before
    /// killing it. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.ops.send(Op::Shutdown { reply }).await.is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}

/// Sends `uci`, collects identity and option declarations until `uciok`,
/// forwards the configured options, then confirms with `isready`/`readyok`.
async fn handshake(
    config: &SessionConfig,
    writer: &mut EngineWriter,
    reader: &mut EngineReader,
) -> Result<EngineIdentity> {
    let mut identity = EngineIdentity::default();

    writer.send(&UciCommand::Uci).await?;
    loop {
        let line = reader
            .next_line()
            .await?
            .ok_or_else(|| Error::Handshake("engine closed stream before uciok".to_string()))?;
        match parse_line(&line) {
            EngineEvent::IdName(name) => identity.name = Some(name),
            EngineEvent::IdAuthor(author) => identity.author = Some(author),
            EngineEvent::OptionDecl(decl) => identity.options.push(decl),
            EngineEvent::UciOk => break,
            other => trace!(?other, "ignoring pre-uciok line"),
        }
    }

    // Options are sent blind; engines ignore or reject ones they do not
    // support, and that is not fatal.
    for (name, value) in config.options.to_pairs() {
        writer.send(&UciCommand::SetOption { name, value }).await?;
    }

    writer.send(&UciCommand::IsReady).await?;
    loop {
        let line = reader
            .next_line()
            .await?
            .ok_or_else(|| Error::Handshake("engine closed stream before readyok".to_string()))?;
        match parse_line(&line) {
            EngineEvent::ReadyOk => break,
            other => trace!(?other, "ignoring pre-readyok line"),
        }
    }

    Ok(identity)
}

/// Background worker: blocking reads of engine stdout, decoded once at the
/// protocol boundary and forwarded in arrival order. Ends when the stream
/// closes, which the controller observes as channel closure.
async fn read_loop(mut reader: EngineReader, tx: mpsc::Sender<EngineEvent>) {
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                trace!(line = %line, "<- engine");
                let event = parse_line(&line);
                if let EngineEvent::Unknown(raw) = &event {
                    if !raw.is_empty() {
                        debug!(raw = %raw, "unrecognized engine output");
                    }
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "engine read failed");
                break;
            }
        }
    }
}

enum Op {
    Analyze {
        request: AnalysisRequest,
        reply: oneshot::Sender<Result<AnalysisHandle>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Phase {
    /// `go` sent; `deadline` set when the request carries a wall-clock
    /// time limit.
    Searching { deadline: Option<Instant> },
    /// `stop` sent; the engine owes us a final `bestmove` before the grace
    /// deadline.
    Stopping { grace: Instant, reason: StopReason },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StopReason {
    UserCancel,
    TimeLimit,
}

struct Active {
    builder: ResultBuilder,
    events_tx: mpsc::Sender<EngineEvent>,
    result_tx: Option<oneshot::Sender<Result<AnalysisResult>>>,
    phase: Phase,
}

struct Controller {
    config: SessionConfig,
    writer: EngineWriter,
    events: mpsc::Receiver<EngineEvent>,
    child: Option<EngineProcess>,
    active: Option<Active>,
    queue: VecDeque<(AnalysisRequest, oneshot::Sender<Result<AnalysisHandle>>)>,
    closed: bool,
}

impl Controller {
    async fn run(mut self, mut ops: mpsc::Receiver<Op>) {
        while !self.closed {
            let deadline = self.next_deadline();
            tokio::select! {
                op = ops.recv() => match op {
                    Some(op) => self.handle_op(op).await,
                    // every Session handle dropped
                    None => self.shutdown_engine().await,
                },
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => self.on_engine_exited().await,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.handle_deadline().await,
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match self.active.as_ref().map(|a| &a.phase) {
            Some(Phase::Searching { deadline }) => *deadline,
            Some(Phase::Stopping { grace, .. }) => Some(*grace),
            None => None,
        }
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::Analyze { request, reply } => {
                if self.active.is_some() {
                    match self.config.busy_policy {
                        BusyPolicy::Queue => self.queue.push_back((request, reply)),
                        BusyPolicy::Reject => {
                            let _ = reply.send(Err(Error::Busy));
                        }
                    }
                } else {
                    self.start_analysis(request, reply).await;
                }
            }
            Op::Cancel { reply } => {
                let _ = reply.send(self.cancel_active().await);
            }
            Op::Shutdown { reply } => {
                self.shutdown_engine().await;
                let _ = reply.send(());
            }
        }
    }

    async fn start_analysis(
        &mut self,
        request: AnalysisRequest,
        reply: oneshot::Sender<Result<AnalysisHandle>>,
    ) {
        let stop = match request.stop_condition(self.config.default_move_time) {
            Ok(stop) => stop,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let sent = async {
            self.writer.send(&UciCommand::NewGame).await?;
            self.writer
                .send(&UciCommand::Position(request.position.clone()))
                .await?;
            self.writer.send(&UciCommand::Go(stop)).await?;
            Ok::<_, Error>(())
        }
        .await;
        if let Err(e) = sent {
            warn!(error = %e, "write to engine failed, closing session");
            let _ = reply.send(Err(e));
            self.close_transport().await;
            return;
        }

        let deadline = match stop {
            StopCondition::TimeLimit(limit) => Some(Instant::now() + limit),
            _ => None,
        };
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (result_tx, result_rx) = oneshot::channel();
        self.active = Some(Active {
            builder: ResultBuilder::new(),
            events_tx,
            result_tx: Some(result_tx),
            phase: Phase::Searching { deadline },
        });
        let _ = reply.send(Ok(AnalysisHandle { events: events_rx, result: result_rx }));
    }

    async fn cancel_active(&mut self) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(()); // nothing in flight
        };
        match active.phase {
            Phase::Searching { .. } => {
                self.writer.send(&UciCommand::Stop).await?;
                active.phase = Phase::Stopping {
                    grace: Instant::now() + self.config.stop_grace,
                    reason: StopReason::UserCancel,
                };
            }
            // stop already sent, second cancel is a no-op
            Phase::Stopping { .. } => {}
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Info(info) => {
                let Some(active) = self.active.as_mut() else {
                    warn!("info line outside any analysis, ignoring");
                    return;
                };
                active.builder.apply_info(info.clone());
                // a slow caller loses incremental events, never the result
                if active.events_tx.try_send(EngineEvent::Info(info)).is_err() {
                    trace!("caller not keeping up with info events");
                }
            }
            EngineEvent::BestMove { best, ponder } => {
                let Some(mut active) = self.active.take() else {
                    warn!("bestmove outside any analysis, ignoring");
                    return;
                };
                let outcome = match active.phase {
                    Phase::Stopping { reason: StopReason::UserCancel, .. } => {
                        AnalysisOutcome::Cancelled
                    }
                    _ => AnalysisOutcome::Completed,
                };
                let result = active.builder.seal(best.clone(), ponder.clone(), outcome);
                let _ = active.events_tx.try_send(EngineEvent::BestMove { best, ponder });
                if let Some(tx) = active.result_tx.take() {
                    let _ = tx.send(Ok(result));
                }
                self.start_next_queued().await;
            }
            EngineEvent::Unknown(_) => {} // already logged by the read loop
            other => debug!(?other, "unexpected engine event outside handshake"),
        }
    }

    async fn handle_deadline(&mut self) {
        enum Action {
            SendStop,
            SealCancelled,
            Teardown,
        }
        let action = match self.active.as_ref().map(|a| &a.phase) {
            Some(Phase::Searching { .. }) => Action::SendStop,
            Some(Phase::Stopping { reason: StopReason::UserCancel, .. }) => Action::SealCancelled,
            Some(Phase::Stopping { reason: StopReason::TimeLimit, .. }) => Action::Teardown,
            None => return,
        };

        match action {
            Action::SendStop => {
                // wall-clock limit reached: ask the engine to wrap up
                debug!("analysis time limit reached, sending stop");
                if let Err(e) = self.writer.send(&UciCommand::Stop).await {
                    warn!(error = %e, "write to engine failed, closing session");
                    self.close_transport().await;
                    return;
                }
                if let Some(active) = self.active.as_mut() {
                    active.phase = Phase::Stopping {
                        grace: Instant::now() + self.config.stop_grace,
                        reason: StopReason::TimeLimit,
                    };
                }
            }
            Action::SealCancelled => {
                // engine never acknowledged the stop; seal with what we have
                warn!("no bestmove within stop grace, sealing cancelled result");
                if let Some(mut active) = self.active.take() {
                    let result = active.builder.seal_interrupted();
                    if let Some(tx) = active.result_tx.take() {
                        let _ = tx.send(Ok(result));
                    }
                }
                self.start_next_queued().await;
            }
            Action::Teardown => {
                // stop ignored after a timeout: the engine is wedged
                warn!("engine unresponsive after timeout, tearing session down");
                if let Some(mut active) = self.active.take() {
                    if let Some(tx) = active.result_tx.take() {
                        let _ = tx.send(Err(Error::Timeout(self.config.stop_grace)));
                    }
                }
                self.shutdown_engine().await;
            }
        }
    }

    /// Transport is gone: fail everything and close.
    async fn on_engine_exited(&mut self) {
        debug!("engine output stream closed");
        if let Some(mut active) = self.active.take() {
            if let Some(tx) = active.result_tx.take() {
                let _ = tx.send(Err(Error::EngineExited));
            }
        }
        self.fail_queued();
        if let Some(child) = self.child.as_mut() {
            child.wait_or_kill(self.config.quit_grace).await;
        }
        self.closed = true;
    }

    async fn close_transport(&mut self) {
        self.fail_queued();
        if let Some(child) = self.child.as_mut() {
            child.wait_or_kill(self.config.quit_grace).await;
        }
        self.closed = true;
    }

    /// Graceful shutdown: `quit`, bounded wait, then kill.
    async fn shutdown_engine(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut active) = self.active.take() {
            if let Some(tx) = active.result_tx.take() {
                let _ = tx.send(Err(Error::NotReady));
            }
        }
        self.fail_queued();
        let _ = self.writer.send(&UciCommand::Quit).await;
        if let Some(child) = self.child.as_mut() {
            child.wait_or_kill(self.config.quit_grace).await;
        }
        self.closed = true;
    }

    fn fail_queued(&mut self) {
        for (_, reply) in self.queue.drain(..) {
            let _ = reply.send(Err(Error::NotReady));
        }
    }

    async fn start_next_queued(&mut self) {
        if let Some((request, reply)) = self.queue.pop_front() {
            self.start_analysis(request, reply).await;
        }
    }
}
