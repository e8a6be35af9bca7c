mod action;
mod compose;
mod config;
mod context;
mod event;
mod handler;
mod helper;
mod logging;
mod obs;
mod plugin;
mod presence;
mod replay;
mod session;
mod upload;

use serenity::{all::GatewayIntents, Client};
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(RwLock::new(crate::config::Config::load().await?));
    let token = cfg.read().await.general.discord_token.clone();
    let (session, inbox) = crate::session::channel();

    // Without OBS there is nothing to announce, so don't bother logging in to Discord.
    let observer = crate::obs::Observer::connect(cfg.clone(), session.clone()).await?;
    let handler = handler::Handler::new(cfg.clone(), session, observer.handle());

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    crate::session::Session::new(inbox, cfg, client.http.clone(), client.cache.clone())
        .await
        .spawn();
    observer.spawn();

    client.start().await.map_err(Into::into)
}
