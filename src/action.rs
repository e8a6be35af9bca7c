//! Message component actions
//!
//! Buttons outlive the process that posted them, so everything an action needs must be
//! recoverable from the interaction itself.  A button's custom id is `<action-id>:<token>`, where
//! the action id selects the handler and the token carries its argument.

use regex::Regex;
use std::sync::LazyLock;

/// Stable identifiers of every action the bot attaches to its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionId {
    UploadClip,
}

/// Ordered list of registered actions
pub const ACTIONS: &[ActionId] = &[ActionId::UploadClip];

/// OBS replay file name.  Also guards against path traversal through a forged custom id.
static CLIP_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Replay_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}\.(mp4|mkv)").expect("valid regex")
});

impl ActionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::UploadClip => "upload-clip",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        ACTIONS.iter().copied().find(|action| action.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomId<'a> {
    pub action: ActionId,
    pub token: &'a str,
}

impl<'a> CustomId<'a> {
    pub fn new(action: ActionId, token: &'a str) -> Self {
        Self { action, token }
    }

    pub fn parse(custom_id: &'a str) -> Option<Self> {
        let (action, token) = custom_id.split_once(':')?;
        Some(Self {
            action: ActionId::parse(action)?,
            token,
        })
    }
}

impl std::fmt::Display for CustomId<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.action.as_str(), self.token)
    }
}

/// Find a replay file name in `text`.  The whole text must be the file name; anything around it
/// would not survive as a path component.
///
/// [`crate::upload::UploadAffordance::from_custom_id`] builds on this to rebuild the whole upload
/// affordance from a pressed button.
pub fn parse_token(text: &str) -> Option<&str> {
    CLIP_TOKEN
        .find(text)
        .filter(|m| m.start() == 0 && m.end() == text.len())
        .map(|m| m.as_str())
}
