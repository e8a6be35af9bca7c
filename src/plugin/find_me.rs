use crate::{
    event::*,
    helper::{find_in_voice, voice_occupants},
    log_internal,
    plugin::*,
    session::VoiceChange,
};
use anyhow::Result;

/// Pick up the primary user if they were already in voice when the bot started.
///
/// Only the cache is searched, so this finds nothing until Discord has sent the servers' voice
/// states after connecting.
pub struct FindMe;

#[serenity::async_trait]
impl Plugin for FindMe {
    fn name(&self) -> &'static str {
        "find-me"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "look for the primary user in voice channels").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let (primary, guilds) = {
            let cfg = ctx.cfg.read().await;
            (cfg.general.primary_user_id, cfg.general.guilds.clone())
        };

        let Some((guild_id, channel_id)) = find_in_voice(ctx.cache, primary, &guilds) else {
            log_internal!("Primary user not found in any VC");
            msg.reply(ctx.cache_http, "No user found").await?;
            return Ok(EventHandled::Yes);
        };

        ctx.session
            .voice(VoiceChange {
                user_id: primary,
                before: None,
                after: Some(channel_id),
                occupants: voice_occupants(ctx.cache, guild_id, channel_id),
            })
            .await?;

        msg.reply(ctx.cache_http, format!("Found user in <#{}>", channel_id))
            .await?;
        Ok(EventHandled::Yes)
    }
}
