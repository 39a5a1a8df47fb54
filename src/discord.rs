//! Discord adapter: turns serenity events into [`IncomingMessage`]s and
//! exposes a DM channel as a [`ChatChannel`].
//!
//! serenity spawns a task per event, so one long translation never blocks
//! the gateway. Errors are logged; nothing is sent back to the user.

use crate::config::BotConfig;
use crate::convert::PdfiumConverter;
use crate::dispatch::{AttachmentRef, ChatChannel, Dispatcher, IncomingMessage};
use crate::error::PaperBotError;
use crate::gemini::GeminiClient;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, Context, CreateAttachment, CreateMessage, EventHandler, GatewayIntents,
    Http, Message, Ready,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A Discord channel plus the HTTP client used to fetch attachments.
pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    downloads: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, downloads: reqwest::Client) -> Self {
        Self {
            http,
            channel_id,
            downloads,
        }
    }
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    async fn download(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, PaperBotError> {
        let response = self
            .downloads
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send_text(&self, text: &str) -> Result<(), PaperBotError> {
        self.channel_id.say(&self.http, text).await?;
        Ok(())
    }

    async fn send_file(&self, text: &str, filename: &str, bytes: Vec<u8>) -> Result<(), PaperBotError> {
        let message = CreateMessage::new()
            .content(text)
            .add_file(CreateAttachment::bytes(bytes, filename));
        self.channel_id.send_message(&self.http, message).await?;
        Ok(())
    }
}

/// serenity event handler wrapping a [`Dispatcher`].
pub struct Handler {
    dispatcher: Dispatcher,
    downloads: reqwest::Client,
    cancel: CancellationToken,
}

impl Handler {
    pub fn new(dispatcher: Dispatcher, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            downloads: reqwest::Client::new(),
            cancel,
        }
    }

    /// Attachments of the message `msg` replies to.
    ///
    /// Discord usually inlines the referenced message; otherwise it is
    /// fetched. A failed fetch is treated as "no referenced attachment".
    async fn referenced_attachments(&self, ctx: &Context, msg: &Message) -> Vec<AttachmentRef> {
        if let Some(referenced) = msg.referenced_message.as_deref() {
            return attachment_refs(referenced);
        }
        let Some(message_id) = msg.message_reference.as_ref().and_then(|r| r.message_id) else {
            return Vec::new();
        };
        debug!("Reference message: {}", message_id);
        match msg.channel_id.message(ctx, message_id).await {
            Ok(referenced) => attachment_refs(&referenced),
            Err(e) => {
                warn!("Could not fetch referenced message {}: {}", message_id, e);
                Vec::new()
            }
        }
    }
}

fn attachment_refs(msg: &Message) -> Vec<AttachmentRef> {
    msg.attachments
        .iter()
        .map(|a| AttachmentRef {
            filename: a.filename.clone(),
            url: a.url.clone(),
        })
        .collect()
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged on as {}!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        debug!("Message from {}: {}", msg.author.name, msg.content);
        // Skip guild traffic before any reference fetch.
        if msg.author.bot || msg.guild_id.is_some() {
            return;
        }

        let incoming = IncomingMessage {
            id: msg.id.to_string(),
            is_direct: msg.guild_id.is_none(),
            from_bot: msg.author.bot,
            content: msg.content.clone(),
            attachments: attachment_refs(&msg),
            referenced_attachments: self.referenced_attachments(&ctx, &msg).await,
        };
        let channel = DiscordChannel::new(ctx.http.clone(), msg.channel_id, self.downloads.clone());

        match self.dispatcher.handle(&incoming, &channel, &self.cancel).await {
            Ok(Some(route)) => debug!("Message {} handled as {:?}", incoming.id, route),
            Ok(None) => {}
            Err(PaperBotError::Cancelled) => info!("Message {} cancelled", incoming.id),
            Err(e) => error!("Message {} failed: {}", incoming.id, e),
        }
    }
}

/// Connect to Discord and serve until `cancel` fires or the gateway closes.
pub async fn run_bot(config: BotConfig, cancel: CancellationToken) -> Result<(), PaperBotError> {
    let token = config.require_discord_token()?.to_string();
    let backend = Arc::new(GeminiClient::new(&config)?);
    let converter = Arc::new(PdfiumConverter::new(config.conversion.clone()));
    let dispatcher = Dispatcher::new(backend, converter, Arc::new(config));

    let intents = GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(dispatcher, cancel.clone()))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        info!("Shutting down Discord client");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;
    Ok(())
}
