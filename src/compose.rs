//! Clip announcements

use crate::{
    action::{ActionId, CustomId},
    replay::ReplayEvent,
};
use anyhow::{anyhow, Result};
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, CreateMessage, UserId};

const NO_USERS: &str = "No users";

/// Someone in the recorded voice channel when the replay was saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
}

pub struct Announcement {
    /// Posted in the clips channel
    pub content: String,
    /// Logged, with names instead of mentions
    pub names: String,
    /// Custom id of the upload button
    pub custom_id: String,
    mentions: String,
    file_info: String,
}

impl Announcement {
    /// `participants` is `None` when nobody is being recorded.
    pub fn compose(event: &ReplayEvent, participants: Option<&[Participant]>) -> Result<Self> {
        let captured_at = event
            .captured_at
            .ok_or(anyhow!("No timestamp in file name `{}`", event.file_name))?;

        let mut participants = participants.map(<[Participant]>::to_vec).unwrap_or_default();
        participants.sort_by(|a, b| a.name.cmp(&b.name));

        let (mentions, names) = if participants.is_empty() {
            (NO_USERS.to_owned(), NO_USERS.to_owned())
        } else {
            (
                participants
                    .iter()
                    .map(|p| format!("<@{}>", p.id))
                    .collect::<Vec<_>>()
                    .join(", "),
                participants
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };

        let file_info = format!("`{}` ({:?} MB)", event.file_name, event.size_mb);
        let content = format!(
            "Replay saved! (<t:{}:f>)\n\
             People in VC: {}\n\
             Active window: {}\n\
             File info: {}",
            captured_at.timestamp(),
            mentions,
            event.active_window,
            file_info,
        );

        Ok(Self {
            content,
            names,
            custom_id: CustomId::new(ActionId::UploadClip, &event.file_name).to_string(),
            mentions,
            file_info,
        })
    }

    pub fn create_message(&self) -> CreateMessage {
        let button = CreateButton::new(&self.custom_id)
            .label("Upload Clip")
            .style(ButtonStyle::Primary);

        CreateMessage::new()
            .content(&self.content)
            .components(vec![CreateActionRow::Buttons(vec![button])])
    }

    /// Sent instead when the full announcement is rejected
    pub fn fallback_message(&self, error: &dyn std::fmt::Display) -> CreateMessage {
        CreateMessage::new().content(format!(
            "Replay saved! People in VC: {}\nFile info: {}\nError: {}",
            self.mentions, self.file_info, error
        ))
    }
}
