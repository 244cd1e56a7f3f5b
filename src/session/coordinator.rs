use crate::analysis::AnalysisGateway;
use crate::artifact::ArtifactManager;
use crate::channel::{ChannelError, ControlChannel};
use crate::metrics::SessionMetrics;
use crate::process::{ProcessPair, ProcessPairController};
use crate::session::error::SessionResult;
use crate::session::state_machine::SessionStateMachine;
use crate::session::types::{
    MeasurementResult, Session, SessionConfig, SessionEvent, SessionOutcome, SessionParams,
    SessionState, READY_MARKER,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Drives measurement sessions, one per control channel.
///
/// Cloning is cheap; the server hands one clone to every connection. Clones
/// share a single measurement slot: the bandwidth server port and session
/// files are shared, so only one session measures at a time. A channel only
/// queues for the slot once its start message has arrived.
#[derive(Clone)]
pub struct SessionCoordinator {
    processes: ProcessPairController,
    artifacts: ArtifactManager,
    analysis: Arc<dyn AnalysisGateway>,
    config: SessionConfig,
    measurement_slot: Arc<Semaphore>,
}

impl SessionCoordinator {
    pub fn new(
        processes: ProcessPairController,
        artifacts: ArtifactManager,
        analysis: Arc<dyn AnalysisGateway>,
        config: SessionConfig,
    ) -> Self {
        Self {
            processes,
            artifacts,
            analysis,
            config,
            measurement_slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    /// Whether some session currently holds the measurement slot
    pub fn is_measuring(&self) -> bool {
        self.measurement_slot.available_permits() == 0
    }

    /// Run one session to completion over `channel`.
    ///
    /// Never fails: the peer receives exactly one result (possibly empty),
    /// or the channel is closed when the result cannot be delivered.
    pub async fn run<C>(&self, channel: &mut C) -> SessionOutcome
    where
        C: ControlChannel + ?Sized,
    {
        let session_id = uuid::Uuid::new_v4().to_string();
        let client_ip = channel.peer_ip();
        let span = info_span!("session", id = %session_id, peer = %client_ip);

        async move {
            let machine = SessionStateMachine::new();

            let start_message = match channel.recv_text().await {
                Ok(message) => message,
                Err(e) => {
                    debug!("Channel ended before a start message: {}", e);
                    advance(&machine, SessionEvent::ChannelLost);
                    return SessionOutcome {
                        session_id,
                        state: machine.current_state(),
                        result: MeasurementResult::default(),
                        failure: None,
                    };
                }
            };

            info!("Start message received");

            if self.is_measuring() {
                info!("Waiting for the measurement in progress");
            }
            let _slot = match self.measurement_slot.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Measurement slot unavailable: {}", e);
                    channel.close().await;
                    advance(&machine, SessionEvent::ChannelLost);
                    return SessionOutcome {
                        session_id,
                        state: machine.current_state(),
                        result: MeasurementResult::default(),
                        failure: Some(e.to_string()),
                    };
                }
            };

            advance(&machine, SessionEvent::StartReceived);

            let session = Session {
                id: session_id,
                capture_file: self.artifacts.capture_path(),
                tool_output_file: self.artifacts.tool_output_path(),
                start_message,
                client_ip,
            };

            self.execute(channel, &machine, session).await
        }
        .instrument(span)
        .await
    }

    async fn execute<C>(
        &self,
        channel: &mut C,
        machine: &SessionStateMachine,
        session: Session,
    ) -> SessionOutcome
    where
        C: ControlChannel + ?Sized,
    {
        let mut metrics = SessionMetrics::start();
        let mut result = MeasurementResult::default();
        let mut pair = ProcessPair::default();

        let measured = self
            .measure(channel, machine, &session, &mut pair, &mut result)
            .await;

        let failure = match measured {
            Ok(()) => None,
            Err(e) => {
                let phase = machine.current_state().as_str();
                metrics.mark_failed(phase);

                pair.stop().await;
                let archived = self.artifacts.archive(&session.tool_output_file);
                error!(phase, archive = ?archived, "Throughput test failed: {}", e);

                advance(
                    machine,
                    SessionEvent::Failed {
                        error: e.to_string(),
                    },
                );
                Some(e.to_string())
            }
        };

        let state = self
            .respond(channel, machine, &session, &result, failure.as_deref())
            .await;

        let outcome = SessionOutcome {
            session_id: session.id,
            state,
            result,
            failure,
        };
        metrics.finish(&outcome);
        outcome
    }

    async fn measure<C>(
        &self,
        channel: &mut C,
        machine: &SessionStateMachine,
        session: &Session,
        pair: &mut ProcessPair,
        result: &mut MeasurementResult,
    ) -> SessionResult<()>
    where
        C: ControlChannel + ?Sized,
    {
        self.artifacts.prepare(&session.capture_file)?;
        self.artifacts.prepare(&session.tool_output_file)?;
        *pair = self
            .processes
            .start(&session.capture_file, &session.tool_output_file)
            .await?;

        channel.send_text(READY_MARKER.to_string()).await?;
        machine.transition(SessionEvent::ProcessesReady)?;

        self.await_completion(channel).await?;
        machine.transition(SessionEvent::CompletionReceived)?;

        // The tools may still be writing until they are gone
        pair.stop().await;

        let params = SessionParams::parse(&session.start_message)?;
        debug!(mtu = ?params.mtu, rtt_ms = params.rtt_ms, "Analyzing session");

        let throughput = self
            .analysis
            .compute_throughput(&session.tool_output_file, params.mtu)
            .await?;
        result.merge_throughput(throughput);

        let server_ip = params.server_ip()?;
        let efficiency = self
            .analysis
            .compute_efficiency(&session.capture_file, server_ip)
            .await?;
        result.merge_efficiency(efficiency);

        let delay = self
            .analysis
            .compute_buffer_delay(
                &session.capture_file,
                server_ip,
                session.client_ip,
                params.rtt_ms,
            )
            .await?;
        result.merge_buffer_delay(delay);

        machine.transition(SessionEvent::AnalysisFinished)?;
        Ok(())
    }

    /// The message content is irrelevant, only its arrival
    async fn await_completion<C>(&self, channel: &mut C) -> SessionResult<()>
    where
        C: ControlChannel + ?Sized,
    {
        match self.config.completion_timeout {
            Some(limit) => {
                tokio::time::timeout(limit, channel.recv_text())
                    .await
                    .map_err(|_| ChannelError::Timeout(limit))??;
            }
            None => {
                channel.recv_text().await?;
            }
        }
        debug!("Completion signal received");
        Ok(())
    }

    async fn respond<C>(
        &self,
        channel: &mut C,
        machine: &SessionStateMachine,
        session: &Session,
        result: &MeasurementResult,
        failure: Option<&str>,
    ) -> SessionState
    where
        C: ControlChannel + ?Sized,
    {
        let body = match serde_json::to_string(result) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize result, sending empty result: {}", e);
                "{}".to_string()
            }
        };

        match channel.send_text(body).await {
            Ok(()) => {
                info!(complete = result.is_complete(), "Result sent");
                advance(machine, SessionEvent::ResponseSent);
            }
            Err(e) => {
                error!("Failed to deliver result: {}", e);
                let mut detail = format!(
                    "[{}] session {}: failed to deliver result: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    session.id,
                    e
                );
                if let Some(failure) = failure {
                    detail.push_str(&format!(" (after failure: {failure})"));
                }
                self.artifacts
                    .append_failure(&session.tool_output_file, &detail);

                channel.close().await;
                advance(machine, SessionEvent::ResponseUndeliverable);
            }
        }

        machine.current_state()
    }
}

/// Apply an event the session flow guarantees to be valid
fn advance(machine: &SessionStateMachine, event: SessionEvent) {
    if let Err(e) = machine.transition(event) {
        warn!("{}", e);
    }
}
