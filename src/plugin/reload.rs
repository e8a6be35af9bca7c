use crate::helper::MessageHelper;
use crate::{event::*, log_internal, plugin::*};
use anyhow::Result;

pub struct Reload;

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "reload config (bot owner only)").await)
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

        // Report a broken file to whoever asked; the running configuration stays in place
        let response = match ctx.cfg.write().await.reload().await {
            Ok(()) => {
                log_internal!("Configuration reloaded");
                "Configuration reloaded successfully.  Presence settings apply after a restart."
                    .to_owned()
            }
            Err(e) => format!("Could not reload configuration: {}", e),
        };

        msg.reply(ctx.cache_http, response).await?;
        Ok(EventHandled::Yes)
    }
}
