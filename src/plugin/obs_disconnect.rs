use crate::helper::MessageHelper;
use crate::{event::*, log_obs, plugin::*};
use anyhow::Result;

/// Stop listening to OBS without taking the bot down
pub struct ObsDisconnect;

#[serenity::async_trait]
impl Plugin for ObsDisconnect {
    fn name(&self) -> &'static str {
        "obs-disconnect"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "stop listening to OBS (bot owner only)").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if !msg.is_from_owner(ctx).await {
            msg.reply(ctx.cache_http, "Only bot owners can do that.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        let response = if ctx.obs.disconnect() {
            log_obs!("Disconnect requested by {}", msg.author.name);
            "Disconnected from OBS"
        } else {
            "OBS was not connected"
        };

        msg.reply(ctx.cache_http, response).await?;
        Ok(EventHandled::Yes)
    }
}
