use crate::{
    config::Config, context::Context, event::Event, obs::ObsHandle, session::SessionHandle,
};
use serenity::all::{Interaction, Message, Ready, VoiceState};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Discord event handler
pub struct Handler {
    cfg: Arc<RwLock<Config>>,
    session: SessionHandle,
    obs: ObsHandle,
}

impl<'a> Handler {
    pub fn new(cfg: Arc<RwLock<Config>>, session: SessionHandle, obs: ObsHandle) -> Self {
        Self { cfg, session, obs }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            session: &self.session,
            obs: &self.obs,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn voice_state_update(
        &self,
        discord_ctx: serenity::all::Context,
        old: Option<VoiceState>,
        new: VoiceState,
    ) {
        Event::VoiceStateUpdate { old, new }
            .handle(self.ctx(&discord_ctx))
            .await;
    }

    async fn interaction_create(&self, discord_ctx: serenity::all::Context, interaction: Interaction) {
        // Only buttons for now
        let Interaction::Component(component) = interaction else {
            return;
        };

        Event::Component(component)
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}
