use crate::{event::*, log_internal, plugin::*};
use anyhow::Result;
use serenity::all::ActivityData;

/// Sets the bot's status once the connection to Discord is ready.
pub struct Ready;

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Ready(_) = event else {
            return Ok(EventHandled::No);
        };

        let status = ctx.cfg.read().await.general.status.clone();
        ctx.cache_http
            .set_activity(Some(ActivityData::playing(status)));

        log_internal!("------ Bot setup complete ------");
        Ok(EventHandled::Yes)
    }
}
