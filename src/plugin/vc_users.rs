use crate::{event::*, log_internal, plugin::*};
use anyhow::Result;

/// Who would be listed on a clip saved right now
pub struct VcUsers;

#[serenity::async_trait]
impl Plugin for VcUsers {
    fn name(&self) -> &'static str {
        "vc-users"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "list the people currently being recorded").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let snapshot = ctx.session.snapshot().await?;
        let reply = match snapshot.channel.filter(|_| snapshot.active) {
            None => "Not recording users".to_owned(),
            Some(_) if snapshot.participants.is_empty() => "No users in VC".to_owned(),
            Some(channel_id) => {
                let names = snapshot
                    .participants
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                log_internal!("Current VC users: {}", names);
                match snapshot.departing {
                    0 => format!("Recording in <#{}>: {}", channel_id, names),
                    n => format!(
                        "Recording in <#{}>: {} ({} leaving)",
                        channel_id, names, n
                    ),
                }
            }
        };

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
