use crate::{event::*, plugin::*};
use anyhow::Result;

/// Other bots can't issue commands
pub struct IgnoreBots;

#[serenity::async_trait]
impl Plugin for IgnoreBots {
    fn name(&self) -> &'static str {
        "ignore_bots"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, _ctx: &Context, event: &Event) -> Result<EventHandled> {
        let bot = match event {
            Event::Message(msg) => msg.author.bot,
            Event::Component(interaction) => interaction.user.bot,
            _ => false,
        };

        if bot {
            Ok(EventHandled::Yes)
        } else {
            Ok(EventHandled::No)
        }
    }
}
