//! The recording session
//!
//! One task owns the [`PresenceTracker`].  Discord's voice events, OBS's replay notifications and
//! the tracker's own timers all arrive as messages on its inbox and are applied one at a time, so
//! nothing else ever touches presence state.

use crate::{
    compose::{Announcement, Participant},
    config::Config,
    log_error, log_event, log_internal, log_warn,
    logging::{cached_channel_name, cached_user_name, ChannelName, PrintColor, UserName},
    presence::{Expiry, Outcome, PresenceTracker},
    replay::ReplayEvent,
};
use anyhow::{anyhow, Result};
use serenity::all::{
    Cache, ChannelId, CreateAttachment, EditAttachments, EditMessage, Http, MessageId, UserId,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, RwLock},
    time::Instant,
};

const INBOX_CAPACITY: usize = 64;

/// A voice state change, as seen by the bot.
#[derive(Debug, Clone)]
pub struct VoiceChange {
    pub user_id: UserId,
    pub before: Option<ChannelId>,
    pub after: Option<ChannelId>,
    /// Everyone in `after` once the change applied
    pub occupants: Vec<UserId>,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub active: bool,
    pub channel: Option<ChannelId>,
    pub participants: Vec<Participant>,
    /// Departures still inside their grace period
    pub departing: usize,
}

/// An announcement the bot posted during the current session
#[derive(Debug, Clone)]
pub struct PostedClip {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub path: PathBuf,
    /// Session the clip was saved in
    epoch: u64,
}

/// Where clip announcements are posted and later edited.
#[serenity::async_trait]
pub trait ClipsChannel: Send + Sync {
    /// Post the announcement with its upload button.
    async fn announce(
        &self,
        channel_id: ChannelId,
        announcement: &Announcement,
    ) -> Result<MessageId>;

    /// Post the plain-text fallback after [`ClipsChannel::announce`] failed with `error`.
    async fn announce_plain(
        &self,
        channel_id: ChannelId,
        announcement: &Announcement,
        error: &anyhow::Error,
    ) -> Result<()>;

    /// Add the clip file to its announcement.
    async fn attach(&self, clip: &PostedClip) -> Result<()>;
}

pub struct DiscordClips {
    http: Arc<Http>,
}

#[serenity::async_trait]
impl ClipsChannel for DiscordClips {
    async fn announce(
        &self,
        channel_id: ChannelId,
        announcement: &Announcement,
    ) -> Result<MessageId> {
        let channel = channel_id
            .to_channel(&self.http)
            .await
            .map_err(|e| anyhow!("Could not find clips channel {}: {}", channel_id, e))?
            .guild()
            .ok_or(anyhow!("Clips channel {} is not a server channel", channel_id))?;

        let msg = channel
            .send_message(&self.http, announcement.create_message())
            .await?;
        log_event!(
            "Announced clip in {}",
            ChannelName(&channel.name).color()
        );
        Ok(msg.id)
    }

    async fn announce_plain(
        &self,
        channel_id: ChannelId,
        announcement: &Announcement,
        error: &anyhow::Error,
    ) -> Result<()> {
        channel_id
            .send_message(&self.http, announcement.fallback_message(error))
            .await?;
        Ok(())
    }

    async fn attach(&self, clip: &PostedClip) -> Result<()> {
        let msg = clip.channel_id.message(&self.http, clip.message_id).await?;
        let attachment = CreateAttachment::path(&clip.path).await?;
        let edit = EditMessage::new()
            .content(format!("{}\n[Clip attached]", msg.content))
            .attachments(EditAttachments::keep_all(&msg).add(attachment));

        clip.channel_id
            .edit_message(&self.http, clip.message_id, edit)
            .await?;
        Ok(())
    }
}

enum Command {
    Voice(VoiceChange),
    ReplaySaved(ReplayEvent),
    ClipPosted(PostedClip),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cheap, cloneable way in to the session task.  Safe to use from any task or thread.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

/// Receiving end, until [`Session::spawn`] takes it over.  The session stops once every
/// [`SessionHandle`] is gone.
pub struct SessionInbox {
    rx: mpsc::Receiver<Command>,
    tx: mpsc::WeakSender<Command>,
}

pub fn channel() -> (SessionHandle, SessionInbox) {
    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
    let weak = tx.downgrade();
    (SessionHandle { tx }, SessionInbox { rx, tx: weak })
}

impl SessionHandle {
    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("Session task is gone"))
    }

    pub async fn voice(&self, change: VoiceChange) -> Result<()> {
        self.send(Command::Voice(change)).await
    }

    pub async fn replay_saved(&self, event: ReplayEvent) -> Result<()> {
        self.send(Command::ReplaySaved(event)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| anyhow!("Session task dropped snapshot request"))
    }

    async fn clip_posted(&self, clip: PostedClip) -> Result<()> {
        self.send(Command::ClipPosted(clip)).await
    }
}

pub struct Session {
    tracker: PresenceTracker<UserId, ChannelId>,
    inbox: SessionInbox,
    expiries: mpsc::UnboundedReceiver<Expiry<UserId>>,
    cfg: Arc<RwLock<Config>>,
    clips: Arc<dyn ClipsChannel>,
    cache: Arc<Cache>,
    /// Bumped whenever a session starts
    epoch: u64,
    posted: Vec<PostedClip>,
}

impl Session {
    pub async fn new(
        inbox: SessionInbox,
        cfg: Arc<RwLock<Config>>,
        http: Arc<Http>,
        cache: Arc<Cache>,
    ) -> Self {
        let (primary, grace) = {
            let cfg = cfg.read().await;
            (
                cfg.general.primary_user_id,
                Duration::from_secs(cfg.presence.grace_period_seconds),
            )
        };
        let (expiry_tx, expiries) = mpsc::unbounded_channel();

        Self {
            tracker: PresenceTracker::new(primary, grace, expiry_tx),
            inbox,
            expiries,
            cfg,
            clips: Arc::new(DiscordClips { http }),
            cache,
            epoch: 0,
            posted: Vec::new(),
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.inbox.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(expiry) = self.expiries.recv() => {
                    self.handle_expiry(expiry).await;
                }
            }
        }
        log_internal!("Session task stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Voice(change) => self.apply_voice(change),
            Command::ReplaySaved(event) => {
                self.announce(event).await;
            }
            Command::ClipPosted(clip) => self.clip_posted(clip),
            Command::Snapshot(reply) => {
                // Requester may have given up
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Returns the clip attachment task if the session ended with clips to attach.
    async fn handle_expiry(
        &mut self,
        expiry: Expiry<UserId>,
    ) -> Option<tokio::task::JoinHandle<usize>> {
        match self.tracker.on_expired(expiry)? {
            Outcome::Removed(user_id) => {
                log_internal!(
                    "Removed {} from the session after the grace period",
                    self.user(user_id),
                );
                None
            }
            Outcome::SessionEnded => {
                log_internal!(
                    "{} has left the channel, stopping recording",
                    self.user(*self.tracker.primary()),
                );
                self.finalize().await
            }
        }
    }

    fn apply_voice(&mut self, change: VoiceChange) {
        let VoiceChange {
            user_id,
            before,
            after,
            occupants,
        } = change;

        // Mute, deafen, streaming...
        if before == after {
            return;
        }

        let is_primary = user_id == *self.tracker.primary();

        // A move between channels is a leave followed by a join
        if let Some(before) = before {
            let scheduled = if is_primary {
                self.tracker.on_primary_left(&before)
            } else {
                self.tracker.on_other_left(user_id, &before)
            };
            let deadline = self
                .tracker
                .pending_deadline(&user_id)
                .filter(|_| scheduled);
            if let Some(deadline) = deadline {
                log_internal!(
                    "{} left {}, removing in {}s unless they return",
                    self.user(user_id),
                    self.channel(before),
                    deadline.saturating_duration_since(Instant::now()).as_secs(),
                );
            }
        }

        if let Some(after) = after {
            if is_primary {
                if !self.tracker.is_active() {
                    self.epoch += 1;
                    self.posted.clear();
                }
                self.tracker.on_primary_joined(after, occupants);
                log_internal!(
                    "{} joined {}, recording people: {}",
                    self.user(user_id),
                    self.channel(after),
                    self.participant_names(),
                );
            } else if self.tracker.on_other_joined(user_id, &after) {
                log_internal!(
                    "{} joined {}, recording people: {}",
                    self.user(user_id),
                    self.channel(after),
                    self.participant_names(),
                );
            }
        }
    }

    async fn announce(&mut self, event: ReplayEvent) -> tokio::task::JoinHandle<()> {
        let participants = self.tracker.is_active().then(|| self.participants());
        let channel_id = self.cfg.read().await.clips.channel_id;
        let clips = self.clips.clone();
        // Only clips saved during a session are worth attaching later
        let reply = self
            .tracker
            .is_active()
            .then(|| self.inbox.tx.upgrade())
            .flatten()
            .map(|tx| (SessionHandle { tx }, self.epoch));

        // Posting goes over the network; keep the inbox moving meanwhile.
        tokio::spawn(async move {
            if let Err(e) =
                post_announcement(clips.as_ref(), channel_id, event, participants, reply).await
            {
                log_error!("Could not announce clip: {}", e);
            }
        })
    }

    fn clip_posted(&mut self, clip: PostedClip) {
        // The session it belongs to may have ended while the message was being sent
        if self.tracker.is_active() && clip.epoch == self.epoch {
            self.posted.push(clip);
        }
    }

    async fn finalize(&mut self) -> Option<tokio::task::JoinHandle<usize>> {
        let posted = std::mem::take(&mut self.posted);
        if !self.cfg.read().await.clips.attach_on_session_end || posted.is_empty() {
            return None;
        }

        let clips = self.clips.clone();
        Some(tokio::spawn(
            async move { attach_clips(clips.as_ref(), posted).await },
        ))
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.tracker.is_active(),
            channel: self.tracker.channel().copied(),
            participants: self.participants(),
            departing: self.tracker.pending_count(),
        }
    }

    fn participants(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self
            .tracker
            .current_participants()
            .into_iter()
            .map(|id| Participant {
                id,
                name: cached_user_name(&self.cache, id),
            })
            .collect();
        participants.sort_by(|a, b| a.name.cmp(&b.name));
        participants
    }

    fn participant_names(&self) -> String {
        self.participants()
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn user(&self, user_id: UserId) -> String {
        UserName(&cached_user_name(&self.cache, user_id)).color()
    }

    fn channel(&self, channel_id: ChannelId) -> String {
        ChannelName(&cached_channel_name(&self.cache, channel_id)).color()
    }
}

async fn post_announcement(
    clips: &dyn ClipsChannel,
    channel_id: ChannelId,
    event: ReplayEvent,
    participants: Option<Vec<Participant>>,
    reply: Option<(SessionHandle, u64)>,
) -> Result<()> {
    let announcement = Announcement::compose(&event, participants.as_deref())?;
    log_internal!("Members in VC: {}", announcement.names);

    let message_id = match clips.announce(channel_id, &announcement).await {
        Ok(id) => id,
        Err(e) => {
            log_error!("Could not send clip announcement: {}", e);
            return clips.announce_plain(channel_id, &announcement, &e).await;
        }
    };

    let Some((handle, epoch)) = reply else {
        return Ok(());
    };
    handle
        .clip_posted(PostedClip {
            channel_id,
            message_id,
            path: event.path,
            epoch,
        })
        .await
}

/// Returns how many clips were attached.
async fn attach_clips(clips: &dyn ClipsChannel, posted: Vec<PostedClip>) -> usize {
    log_internal!("Attaching {} clip(s) to their announcements", posted.len());

    let mut attached = 0;
    for clip in posted {
        match attach_clip(clips, &clip).await {
            Ok(true) => {
                attached += 1;
                log_internal!(
                    "Attached `{}` to message {}",
                    clip.path.to_string_lossy(),
                    clip.message_id
                );
            }
            Ok(false) => log_warn!("File not found: `{}`", clip.path.to_string_lossy()),
            Err(e) => log_error!("Could not edit message {}: {}", clip.message_id, e),
        }
    }

    log_internal!("Finished attaching clips");
    attached
}

/// Returns false if the clip no longer exists.
async fn attach_clip(clips: &dyn ClipsChannel, clip: &PostedClip) -> Result<bool> {
    if !tokio::fs::try_exists(&clip.path).await.unwrap_or(false) {
        return Ok(false);
    }

    clips.attach(clip).await?;
    Ok(true)
}
