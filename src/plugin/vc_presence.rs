use crate::{event::*, helper::voice_occupants, plugin::*, session::VoiceChange};
use anyhow::Result;

/// Feeds voice channel activity into the recording session
pub struct VcPresence;

#[serenity::async_trait]
impl Plugin for VcPresence {
    fn name(&self) -> &'static str {
        "vc_presence"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::VoiceStateUpdate { old, new } = event else {
            return Ok(EventHandled::No);
        };

        if !ctx.cfg.read().await.watches_guild(new.guild_id) {
            return Ok(EventHandled::No);
        }

        let before = old.as_ref().and_then(|old| old.channel_id);
        let after = new.channel_id;

        // The cache applies the update before handing it to us, so this includes the new state
        let occupants = match (new.guild_id, after) {
            (Some(guild_id), Some(channel_id)) => voice_occupants(ctx.cache, guild_id, channel_id),
            _ => Vec::new(),
        };

        ctx.session
            .voice(VoiceChange {
                user_id: new.user_id,
                before,
                after,
                occupants,
            })
            .await?;

        // Other plugins might also want to act on this event.
        Ok(EventHandled::No)
    }
}
