//! Miscellaneous convenience methods

use crate::context::Context;
use serenity::all::{Cache, ChannelId, GuildId, UserId};

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_owner(&self, ctx: &Context) -> bool;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// The primary user always counts as an owner.
    async fn is_from_owner(&self, ctx: &Context) -> bool {
        let cfg = ctx.cfg.read().await;
        self.author.id == cfg.general.primary_user_id
            || cfg.general.bot_owners.contains(&self.author.name)
    }
}

/// Everyone the cache believes is in `channel_id`.
pub fn voice_occupants(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId> {
    let Some(guild) = cache.guild(guild_id) else {
        return Vec::new();
    };

    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .map(|state| state.user_id)
        .collect()
}

/// The voice channel `user_id` is in, searching the given servers (all cached ones if empty).
pub fn find_in_voice(
    cache: &Cache,
    user_id: UserId,
    guilds: &[GuildId],
) -> Option<(GuildId, ChannelId)> {
    let guilds = if guilds.is_empty() {
        cache.guilds()
    } else {
        guilds.to_vec()
    };

    guilds.into_iter().find_map(|guild_id| {
        let guild = cache.guild(guild_id)?;
        let channel_id = guild.voice_states.get(&user_id)?.channel_id?;
        Some((guild_id, channel_id))
    })
}
