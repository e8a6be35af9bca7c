use crate::{
    action::{ActionId, CustomId},
    event::*,
    log_internal, log_warn,
    logging::PrintColor,
    plugin::*,
    upload::{upload, TransportError, UploadAffordance, UploadOutcome, UploadTransport},
};
use anyhow::Result;
use serenity::all::{
    ComponentInteraction, CreateAttachment, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, Http,
};
use std::{path::Path, sync::Arc};

/// Dispatches button presses on our messages to the action their custom id names
pub struct Actions;

#[serenity::async_trait]
impl Plugin for Actions {
    fn name(&self) -> &'static str {
        "actions"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Component(interaction) = event else {
            return Ok(EventHandled::No);
        };

        // Not one of ours
        let Some(custom_id) = CustomId::parse(&interaction.data.custom_id) else {
            return Ok(EventHandled::No);
        };

        match custom_id.action {
            ActionId::UploadClip => upload_clip(ctx, interaction).await?,
        }

        Ok(EventHandled::Yes)
    }
}

async fn upload_clip(ctx: &Context<'_>, interaction: &ComponentInteraction) -> Result<()> {
    let (clips_dir, authorized) = {
        let cfg = ctx.cfg.read().await;
        (cfg.clips.path.clone(), cfg.general.primary_user_id)
    };

    let Some(affordance) = UploadAffordance::from_custom_id(
        &interaction.data.custom_id,
        &interaction.message.content,
        &clips_dir,
        authorized,
    ) else {
        log_warn!(
            "Ignoring upload button with malformed id `{}`",
            interaction.data.custom_id
        );
        return Ok(());
    };

    let transport = InteractionTransport {
        interaction,
        http: ctx.http,
    };

    if upload(&affordance, interaction.user.id, &transport).await? == UploadOutcome::Unauthorized {
        log_internal!(
            "Ignored upload of `{}` requested by {}",
            affordance.path.to_string_lossy(),
            interaction.user.color(),
        );
    }

    Ok(())
}

/// Replies through the interaction that pressed the button
struct InteractionTransport<'a> {
    interaction: &'a ComponentInteraction,
    http: &'a Arc<Http>,
}

#[serenity::async_trait]
impl<'a> UploadTransport for InteractionTransport<'a> {
    async fn acknowledge(&self) -> Result<()> {
        // Shows "thinking..." until the first follow-up
        self.interaction
            .create_response(
                self.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
        Ok(())
    }

    async fn send_file(&self, content: &str, path: &Path) -> Result<(), TransportError> {
        let attachment = CreateAttachment::path(path).await?;
        self.interaction
            .create_followup(
                self.http,
                CreateInteractionResponseFollowup::new()
                    .content(content)
                    .add_file(attachment),
            )
            .await?;
        Ok(())
    }

    async fn reply_private(&self, content: &str) -> Result<()> {
        self.interaction
            .create_followup(
                self.http,
                CreateInteractionResponseFollowup::new()
                    .content(content)
                    .ephemeral(true),
            )
            .await?;
        Ok(())
    }
}
