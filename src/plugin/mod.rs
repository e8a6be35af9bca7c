use crate::{context::Context, event::EventHandled};
use anyhow::Result;

mod actions;
mod debug;
mod find_me;
mod help;
mod ignore_bots;
mod obs_disconnect;
mod ready;
mod reload;
mod vc_presence;
mod vc_users;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Doubles as the command name for command plugins.
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &crate::event::Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ready::Ready),
        // Presence tracking sees every voice update, so it must come before anything exclusive
        Box::new(vc_presence::VcPresence),
        Box::new(ignore_bots::IgnoreBots),
        // Buttons
        Box::new(actions::Actions),
        // Commands
        Box::new(help::Help),
        Box::new(vc_users::VcUsers),
        Box::new(find_me::FindMe),
        Box::new(obs_disconnect::ObsDisconnect),
        Box::new(reload::Reload),
    ]
}

/// Usage line for a command plugin
async fn command_usage(ctx: &Context<'_>, name: &str, description: &str) -> String {
    let prefix = &ctx.cfg.read().await.general.command_prefix;
    format!("{}{} - {}", prefix, name, description)
}
