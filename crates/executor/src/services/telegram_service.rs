use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use common::models::ChannelMessage;
use teloxide::{
    ApiError, RequestError,
    prelude::*,
    types::{AllowedUpdate, Recipient, UpdateKind},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::traits::{MessageSource, TransportError};

/// Posts kept per channel; anything older is never asked for.
const HISTORY_CAPACITY: usize = 100;

/// Channel reader on top of the Bot API. The bot must be a member of the
/// channel; posts arrive as `channel_post` updates and are kept in a short
/// rolling history that `fetch_history` serves newest first.
pub struct TelegramService {
    bot: Bot,
    state: Mutex<History>,
}

#[derive(Default)]
struct History {
    offset: i32,
    posts: HashMap<i64, VecDeque<ChannelMessage>>,
}

impl History {
    fn push(&mut self, chat_id: i64, message: ChannelMessage) {
        let posts = self.posts.entry(chat_id).or_default();
        posts.push_back(message);
        while posts.len() > HISTORY_CAPACITY {
            posts.pop_front();
        }
    }

    fn newest(&self, chat_id: i64, limit: usize) -> Vec<ChannelMessage> {
        self.posts
            .get(&chat_id)
            .map(|posts| posts.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

impl TelegramService {
    pub async fn connect(token: &str) -> Result<Self, TransportError> {
        let bot = Bot::new(token);
        let me = bot.get_me().await?;
        info!(
            "Telegram bot connected as @{}",
            me.user.username.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            bot,
            state: Mutex::new(History::default()),
        })
    }
}

#[async_trait]
impl MessageSource for TelegramService {
    async fn resolve_channel(&self, name: &str) -> Result<i64, TransportError> {
        let recipient = match name.parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(format!("@{}", name.trim_start_matches('@'))),
        };

        let chat = self.bot.get_chat(recipient).await.map_err(|e| match e {
            RequestError::Api(ApiError::ChatNotFound) => {
                TransportError::ChannelNotFound(name.to_string())
            }
            other => TransportError::Telegram(other),
        })?;
        info!(
            "Connected to channel: {} (ID: {})",
            chat.title().unwrap_or(name),
            chat.id
        );
        Ok(chat.id.0)
    }

    async fn fetch_history(
        &self,
        channel_id: i64,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, TransportError> {
        let mut state = self.state.lock().await;

        let updates = self
            .bot
            .get_updates()
            .offset(state.offset)
            .timeout(0)
            .allowed_updates(vec![AllowedUpdate::ChannelPost])
            .await?;

        for update in updates {
            state.offset = update.id.0 as i32 + 1;
            if let UpdateKind::ChannelPost(message) = update.kind {
                debug!("Channel post {} in chat {}", message.id.0, message.chat.id);
                state.push(
                    message.chat.id.0,
                    ChannelMessage {
                        id: i64::from(message.id.0),
                        text: message.text().map(str::to_owned),
                        timestamp: message.date,
                    },
                );
            }
        }

        Ok(state.newest(channel_id, limit))
    }
}
