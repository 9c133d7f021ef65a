use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::ChannelMessage,
};
use signals::{MessageFilter, RejectReason, SignalParser};
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::services::execution_service::{ExecutionOutcome, ExecutionService};
use crate::traits::{MessageSource, TransportError};

/// Posts requested per tick. A burst larger than this between two ticks
/// loses its oldest posts.
pub const FETCH_WINDOW: usize = 20;

/// Id of the last post handed to the pipeline. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(i64);

impl Watermark {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn is_new(&self, id: i64) -> bool {
        id > self.0
    }

    pub fn advance(&mut self, id: i64) {
        if id > self.0 {
            self.0 = id;
        }
    }
}

#[derive(Debug)]
pub enum MessageOutcome {
    /// Not a structured alert.
    Skipped,
    Rejected(RejectReason),
    Executed(ExecutionOutcome),
}

/// Polls the signal channel and feeds every new post through
/// filter, parser and execution, one at a time.
pub struct ChannelListener {
    id: Uuid,
    channel_name: String,
    source: Arc<dyn MessageSource>,
    execution: Arc<ExecutionService>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

#[async_trait]
impl Actor for ChannelListener {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::ChannelListener
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let channel_id = match self.source.resolve_channel(&self.channel_name).await {
            Ok(id) => id,
            Err(e) => {
                heartbeat_handle.abort();
                bail!("Failed to connect to channel {}: {}", self.channel_name, e);
            }
        };

        let mut watermark = self.initial_watermark(channel_id).await;
        info!(
            "Listening to {} from message {}, polling every {:?}",
            self.channel_name,
            watermark.get(),
            self.poll_interval
        );

        while !self.shutdown.is_cancelled() {
            if let Err(e) = self.poll_once(channel_id, &mut watermark).await {
                error!("Failed to fetch new messages: {}", e);
                if supervisor_tx
                    .send(ControlMessage::Error(self.name(), e.to_string()))
                    .await
                    .is_err()
                {
                    debug!("Supervisor channel closed, error not reported");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = time::sleep(self.poll_interval) => {}
            }
        }

        heartbeat_handle.abort();
        info!("Channel listener stopped at message {}", watermark.get());
        Ok(())
    }
}

impl ChannelListener {
    pub fn new(
        channel_name: impl Into<String>,
        source: Arc<dyn MessageSource>,
        execution: Arc<ExecutionService>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_name: channel_name.into(),
            source,
            execution,
            poll_interval,
            shutdown,
        }
    }

    /// Starts after the newest post present right now, so whatever piled
    /// up while the bot was down is never traded.
    pub async fn initial_watermark(&self, channel_id: i64) -> Watermark {
        match self.source.fetch_history(channel_id, 1).await {
            Ok(messages) => Watermark::new(messages.first().map_or(0, |m| m.id)),
            Err(e) => {
                error!("Failed to initialise last message id: {}", e);
                Watermark::default()
            }
        }
    }

    /// One tick: fetch the window, keep posts past the watermark and run
    /// them oldest first. The watermark moves past each post whatever its
    /// outcome.
    pub async fn poll_once(
        &self,
        channel_id: i64,
        watermark: &mut Watermark,
    ) -> Result<Vec<(i64, MessageOutcome)>, TransportError> {
        let history = self.source.fetch_history(channel_id, FETCH_WINDOW).await?;

        let mut fresh: Vec<ChannelMessage> = history
            .into_iter()
            .filter(|m| watermark.is_new(m.id))
            .collect();
        fresh.sort_by_key(|m| m.id);
        fresh.dedup_by_key(|m| m.id);

        if !fresh.is_empty() {
            debug!("{} new message(s) after {}", fresh.len(), watermark.get());
        }

        let mut outcomes = Vec::with_capacity(fresh.len());
        for message in fresh {
            let outcome = self.process_message(&message).await;
            watermark.advance(message.id);
            outcomes.push((message.id, outcome));
        }

        Ok(outcomes)
    }

    async fn process_message(&self, message: &ChannelMessage) -> MessageOutcome {
        let text = message.text.as_deref();
        let Some(text) = text.filter(|_| MessageFilter::is_candidate(text)) else {
            return MessageOutcome::Skipped;
        };

        match SignalParser::parse(text) {
            Ok(signal) => {
                info!("New signal in message {}: {}", message.id, signal);
                MessageOutcome::Executed(self.execution.execute(&signal).await)
            }
            Err(reason) => MessageOutcome::Rejected(reason),
        }
    }
}
