use crate::{event::*, log_event, logging::*, plugin::*};
use anyhow::Result;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ctx.cache.current_user().color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.author.color(),
                    Glue {}.color(),
                    msg.content,
                );
            }
            Event::VoiceStateUpdate { old, new } => {
                let user = UserName(&cached_user_name(ctx.cache, new.user_id)).color();
                let old_channel = old.as_ref().and_then(|old| old.channel_id);
                match (old_channel, new.channel_id) {
                    (Some(old_id), Some(new_id)) if old_id == new_id => {
                        // State change within same channel, e.g. mute/unmute
                        // Not currently debug logging this
                    }
                    (Some(old_id), Some(new_id)) => log_event!(
                        "{} moved VC channel from \"{}\" to \"{}\"",
                        user,
                        ChannelName(&cached_channel_name(ctx.cache, old_id)).color(),
                        ChannelName(&cached_channel_name(ctx.cache, new_id)).color(),
                    ),
                    (Some(old_id), None) => log_event!(
                        "{} left VC channel \"{}\"",
                        user,
                        ChannelName(&cached_channel_name(ctx.cache, old_id)).color(),
                    ),
                    (None, Some(new_id)) => log_event!(
                        "{} joined VC channel \"{}\"",
                        user,
                        ChannelName(&cached_channel_name(ctx.cache, new_id)).color(),
                    ),
                    (None, None) => log_event!("Unknown voice state update"),
                }
            }
            Event::Component(interaction) => {
                log_event!(
                    "{} pressed \"{}\"",
                    interaction.user.color(),
                    interaction.data.custom_id,
                );
            }
        }

        Ok(EventHandled::No)
    }
}
