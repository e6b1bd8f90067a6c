//! The per-connection session: command dispatch and frame delivery.
//!
//! One client at a time. Commands arrive as JSON text messages; frames
//! leave through a mutex-protected sink so the tick engine's update
//! frames and the motion loop's cosmetic frames never interleave
//! mid-JSON. A new `start_simulation` cancels the previous run's tasks
//! before starting fresh ones.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use minitown_core::{build_agents, run_simulation, Services, SharedAgents, SimulationConfig, StepGate};
use minitown_types::wire::ClientCommand;
use minitown_types::ServerFrame;

use crate::error::ServerError;
use crate::motion::{self, ExplicitThinking};
use crate::sanitize::{chunk_text, sanitize_payload};

/// The mutex-protected outbound half of the socket.
pub type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serialize, sanitize, chunk, and send one frame.
///
/// The sink lock is held across all chunks of one frame so a split JSON
/// document stays contiguous on the wire.
pub async fn send_frame(sink: &SharedSink, frame: &ServerFrame) -> Result<(), ServerError> {
    let mut value = serde_json::to_value(frame)?;
    sanitize_payload(&mut value);
    let text = value.to_string();
    let mut guard = sink.lock().await;
    for chunk in chunk_text(&text) {
        guard
            .send(Message::Text(chunk.into()))
            .await
            .map_err(|e| ServerError::Send(e.to_string()))?;
    }
    Ok(())
}

/// State of one connected client.
struct Session {
    services: Services,
    sink: SharedSink,
    agents: Option<SharedAgents>,
    sim_task: Option<JoinHandle<()>>,
    motion_task: Option<JoinHandle<()>>,
    forward_task: Option<JoinHandle<()>>,
    ack_tx: Option<watch::Sender<i64>>,
    explicit_thinking: ExplicitThinking,
}

impl Session {
    fn new(services: Services, sink: SharedSink) -> Self {
        Self {
            services,
            sink,
            agents: None,
            sim_task: None,
            motion_task: None,
            forward_task: None,
            ack_tx: None,
            explicit_thinking: Arc::new(StdMutex::new(BTreeSet::new())),
        }
    }

    /// Abort any running simulation, motion, and forwarding tasks and
    /// wait for them to unwind.
    async fn cancel_run(&mut self) {
        for task in [
            self.sim_task.take(),
            self.motion_task.take(),
            self.forward_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
            let _ = task.await;
        }
        self.ack_tx = None;
        self.agents = None;
    }

    async fn start_simulation(&mut self, params: minitown_types::wire::SimulationParams) {
        self.cancel_run().await;

        let config = match SimulationConfig::from_params(&params) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "rejecting start_simulation");
                let _ = send_frame(&self.sink, &ServerFrame::Error {
                    message: format!("啟動參數錯誤: {err}"),
                })
                .await;
                return;
            }
        };
        info!(
            agents = config.roster.len(),
            duration = config.duration_minutes,
            step_sync = config.step_sync,
            "starting simulation"
        );

        let agents = build_agents(&self.services, &config);
        self.agents = Some(agents.clone());

        let (ack_tx, ack_rx) = watch::channel(-1_i64);
        self.ack_tx = Some(ack_tx);
        let gate = StepGate {
            enabled: config.step_sync,
            acked: ack_rx,
        };

        // Frames flow engine -> channel -> socket; the forwarder owns the
        // sanitize+chunk step.
        let (frame_tx, mut frame_rx) = mpsc::channel::<ServerFrame>(64);
        let sink = self.sink.clone();
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if send_frame(&sink, &frame).await.is_err() {
                    return;
                }
            }
        }));

        let services = self.services.clone();
        let sim_agents = agents.clone();
        self.sim_task = Some(tokio::spawn(async move {
            if let Err(err) = run_simulation(services, config, sim_agents, frame_tx, gate).await {
                info!(%err, "simulation ended early");
            }
        }));

        self.motion_task = Some(tokio::spawn(motion::motion_loop(
            agents,
            self.explicit_thinking.clone(),
            self.sink.clone(),
        )));
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::StartSimulation { params } => {
                self.start_simulation(params).await;
            }
            ClientCommand::AgentTeleport {
                agent_name,
                target_portal_name,
            } => {
                let Some(agents) = &self.agents else {
                    warn!(agent_name, "teleport before start_simulation");
                    return;
                };
                let graph = self.services.graph;
                for handle in agents.iter() {
                    let mut agent = handle.lock().await;
                    if agent.name == agent_name {
                        let mut rng = rand::thread_rng();
                        agent.teleport(graph, &mut rng, &target_portal_name);
                        return;
                    }
                }
                warn!(agent_name, "teleport for unknown agent");
            }
            ClientCommand::StepComplete { step_id } => {
                let Some(ack_tx) = &self.ack_tx else {
                    warn!(step_id, "step_complete with no simulation running");
                    return;
                };
                let current = *ack_tx.borrow();
                let new = step_id as i64;
                if new < current {
                    warn!(step_id, current, "discarding stale step_complete");
                    return;
                }
                if new > current + 1 {
                    warn!(step_id, current, "step_complete gap, releasing anyway");
                }
                let _ = ack_tx.send(new);
            }
            ClientCommand::StartThinking { agent_name } => {
                if let Ok(mut set) = self.explicit_thinking.lock() {
                    set.insert(agent_name);
                }
            }
            ClientCommand::StopThinking { agent_name } => {
                if let Ok(mut set) = self.explicit_thinking.lock() {
                    set.remove(&agent_name);
                }
            }
        }
    }
}

/// Drive one client connection to completion.
pub async fn handle_connection(socket: WebSocket, services: Services) {
    let (sink, stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));
    let mut session = Session::new(services, sink.clone());

    info!("client connected");
    run_receive_loop(&mut session, stream).await;

    session.cancel_run().await;
    info!("client session ended");
}

async fn run_receive_loop(session: &mut Session, mut stream: SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => session.handle_command(command).await,
                Err(err) => {
                    warn!(%err, "unparseable command");
                    let _ = send_frame(&session.sink, &ServerFrame::Error {
                        message: format!("無法解析指令: {err}"),
                    })
                    .await;
                }
            },
            Ok(Message::Close(_)) => {
                info!("client sent close frame");
                return;
            }
            Ok(_) => {
                // Binary, ping, pong: nothing to do (axum answers pings).
            }
            Err(err) => {
                warn!(%err, "websocket receive error");
                return;
            }
        }
    }
}
