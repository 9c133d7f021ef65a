use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    ChannelListener,
}

/// Messages sent from Actors to the Supervisor
pub enum ControlMessage {
    Heartbeat(ActorType),
    /// The actor finished its run loop on purpose.
    Shutdown(ActorType),
    /// Non-fatal problem worth surfacing; the actor keeps running.
    Error(ActorType, String),
    /// The run loop returned an error and the actor is gone.
    Crashed(ActorType, String),
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heartbeat(actor_type) => write!(f, "Heartbeat({:?})", actor_type),
            Self::Shutdown(actor_type) => write!(f, "Shutdown({:?})", actor_type),
            Self::Error(actor_type, err) => write!(f, "Error({:?}, {})", actor_type, err),
            Self::Crashed(actor_type, err) => write!(f, "Crashed({:?}, {})", actor_type, err),
        }
    }
}

/// The trait that all restartable services must implement
#[async_trait]
pub trait Actor: Send + Sync {
    fn name(&self) -> ActorType;

    /// Identifies one incarnation of the actor across restarts.
    fn id(&self) -> Uuid;

    /// The main loop of the actor.
    /// It must keep a heartbeat running while it is alive.
    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()>;

    /// The heartbeat stops as soon as the returned handle is dropped, which
    /// includes the actor's future being dropped after a panic.
    fn spawn_heartbeat(
        &self,
        supervisor_tx: mpsc::Sender<ControlMessage>,
    ) -> AbortOnDropHandle<()> {
        let actor_type = self.name();
        AbortOnDropHandle::new(tokio::spawn(async move {
            loop {
                if supervisor_tx
                    .send(ControlMessage::Heartbeat(actor_type))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }))
    }
}
