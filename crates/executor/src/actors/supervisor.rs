use std::{collections::HashMap, time::Duration};
use tracing::{debug, error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

use common::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    shutdown: CancellationToken,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            shutdown,
            restart_delay: Duration::from_secs(2),
        }
    }

    pub fn with_restart_delay(mut self, restart_delay: Duration) -> Self {
        self.restart_delay = restart_delay;
        self
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs until every actor has shut down or the shutdown token fires.
    /// On shutdown the actors are awaited, never aborted, so a signal that
    /// is being executed runs to completion.
    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let timeout_duration = Duration::from_secs(3);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        actors.into_iter().for_each(|actor| {
            self.spawn_actor(actor, supervisor_tx.clone());
        });

        while !self.handles.is_empty() {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, waiting for actors to finish.");
                    break;
                }

                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if self.handles.contains_key(&actor_type) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            self.handles.remove(&actor_type);
                        }
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                        }
                        ControlMessage::Crashed(actor_type, error_msg) => {
                            error!("Actor {:?} crashed: {}", actor_type, error_msg);
                            self.pulses.remove(&actor_type);
                            self.handles.remove(&actor_type);

                            tokio::select! {
                                _ = self.shutdown.cancelled() => {}
                                _ = time::sleep(self.restart_delay) => {
                                    self.spawn_actor(actor_type, supervisor_tx.clone());
                                }
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let dead_timeout = Instant::now() - timeout_duration;

                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|(_, last)| **last < dead_timeout)
                        .map(|(actor, _)| *actor)
                        .collect();

                    for actor in dead_actors {
                        warn!("{:?} is unresponsive, restarting.", actor);
                        if let Some(handle) = self.handles.remove(&actor) {
                            handle.abort();
                        }
                        self.spawn_actor(actor, supervisor_tx.clone());
                    }
                }
            }
        }

        drop(supervisor_rx);
        for (actor_type, handle) in self.handles.drain() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Actor {:?} panicked during shutdown: {}", actor_type, e);
                }
            }
        }
        self.pulses.clear();
        info!("Supervisor stopped.");
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };
        let mut new_actor = factory();

        // The run loop gets its own task so a panic surfaces as a JoinError
        // here. Aborting the outer handle drops the inner one and aborts it.
        let new_actor_handle = tokio::spawn(async move {
            info!("Starting {:?} ({})", actor_type, new_actor.id());
            let run_tx = tx.clone();
            let run = AbortOnDropHandle::new(tokio::spawn(async move {
                new_actor.run(run_tx).await
            }));

            let exit = match run.await {
                Ok(Ok(())) => ControlMessage::Shutdown(actor_type),
                Ok(Err(e)) => ControlMessage::Crashed(actor_type, format!("{:#}", e)),
                Err(e) => ControlMessage::Crashed(actor_type, e.to_string()),
            };
            if tx.send(exit).await.is_err() {
                debug!("Supervisor gone before {:?} exit was reported", actor_type);
            }
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
