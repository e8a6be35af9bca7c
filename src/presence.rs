//! Debounced voice channel presence.
//!
//! Departures do not take effect immediately.  Each one schedules a removal that only applies
//! once the grace period runs out without the member coming back, which absorbs short
//! disconnects such as voice server migrations.
//!
//! The tracker does not own a task of its own.  Timers are spawned onto the tokio runtime and
//! report back through an unbounded channel; whoever owns the tracker feeds those [`Expiry`]
//! messages back into [`PresenceTracker::on_expired`].  Only the owner ever mutates the tracker.

use std::{collections::HashMap, collections::HashSet, hash::Hash, time::Duration};
use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::Instant,
};

/// Default time a departure has to stick before it is applied.
pub const GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Whether the primary user is in a voice channel we are recording, and who is in there.
#[derive(Debug)]
pub struct TrackedSession<M, C> {
    active: bool,
    channel: Option<C>,
    participants: HashSet<M>,
}

/// A scheduled, cancellable departure for one member.
struct PendingRemoval {
    generation: u64,
    expires_at: Instant,
    timer: JoinHandle<()>,
}

/// Sent by a timer task when its grace period runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<M> {
    pub member: M,
    pub generation: u64,
}

/// Effect of an applied expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<M> {
    /// A participant did not come back in time.
    Removed(M),
    /// The primary user did not come back in time.  Recording is over.
    SessionEnded,
}

pub struct PresenceTracker<M, C> {
    primary: M,
    grace: Duration,
    session: TrackedSession<M, C>,
    pending: HashMap<M, PendingRemoval>,
    next_generation: u64,
    expiry_tx: UnboundedSender<Expiry<M>>,
}

impl<M, C> PresenceTracker<M, C>
where
    M: Eq + Hash + Clone + Send + 'static,
    C: Eq + Clone,
{
    pub fn new(primary: M, grace: Duration, expiry_tx: UnboundedSender<Expiry<M>>) -> Self {
        Self {
            primary,
            grace,
            session: TrackedSession {
                active: false,
                channel: None,
                participants: HashSet::new(),
            },
            pending: HashMap::new(),
            next_generation: 0,
            expiry_tx,
        }
    }

    pub fn primary(&self) -> &M {
        &self.primary
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn channel(&self) -> Option<&C> {
        self.session.channel.as_ref()
    }

    pub fn current_participants(&self) -> HashSet<M> {
        self.session.participants.clone()
    }

    #[cfg(test)]
    pub fn is_pending(&self, member: &M) -> bool {
        self.pending.contains_key(member)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// When the pending removal for `member` is due, if there is one.
    pub fn pending_deadline(&self, member: &M) -> Option<Instant> {
        self.pending.get(member).map(|p| p.expires_at)
    }

    /// The primary user joined `channel`.  `occupants` is everyone in it right now.
    pub fn on_primary_joined(&mut self, channel: C, occupants: impl IntoIterator<Item = M>) {
        // The fresh occupant list supersedes every pending departure, including our own.
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }

        let mut participants: HashSet<M> = occupants.into_iter().collect();
        participants.insert(self.primary.clone());

        self.session.active = true;
        self.session.channel = Some(channel);
        self.session.participants = participants;
    }

    /// The primary user left `channel`.  Returns whether a deactivation was scheduled.  Leaving
    /// a channel other than the tracked one means the join elsewhere already arrived.
    pub fn on_primary_left(&mut self, channel: &C) -> bool {
        if !self.tracks(channel) {
            return false;
        }

        let primary = self.primary.clone();
        self.schedule(primary);
        true
    }

    /// Someone other than the primary user joined `channel`.  Returns whether anything changed.
    pub fn on_other_joined(&mut self, member: M, channel: &C) -> bool {
        if !self.tracks(channel) {
            return false;
        }

        if self.cancel(&member) {
            return true;
        }

        self.session.participants.insert(member)
    }

    /// Someone other than the primary user left `channel`.  Returns whether a removal was
    /// scheduled.
    pub fn on_other_left(&mut self, member: M, channel: &C) -> bool {
        if !self.tracks(channel) || !self.session.participants.contains(&member) {
            return false;
        }

        self.schedule(member);
        true
    }

    /// Apply a fired timer.  Expiries whose removal was cancelled or replaced in the meantime
    /// are ignored.
    pub fn on_expired(&mut self, expiry: Expiry<M>) -> Option<Outcome<M>> {
        match self.pending.get(&expiry.member) {
            Some(pending) if pending.generation == expiry.generation => {}
            _ => return None,
        }
        self.pending.remove(&expiry.member);

        if expiry.member == self.primary {
            for (_, pending) in self.pending.drain() {
                pending.timer.abort();
            }
            self.session.active = false;
            self.session.channel = None;
            self.session.participants.clear();
            return Some(Outcome::SessionEnded);
        }

        self.session
            .participants
            .remove(&expiry.member)
            .then_some(Outcome::Removed(expiry.member))
    }

    fn tracks(&self, channel: &C) -> bool {
        self.session.active && self.session.channel.as_ref() == Some(channel)
    }

    /// Returns whether there was something to cancel.
    fn cancel(&mut self, member: &M) -> bool {
        match self.pending.remove(member) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    fn schedule(&mut self, member: M) {
        // Never stack two timers for one member
        self.cancel(&member);

        let generation = self.next_generation;
        self.next_generation += 1;
        let expires_at = Instant::now() + self.grace;

        let tx = self.expiry_tx.clone();
        let expiry = Expiry {
            member: member.clone(),
            generation,
        };
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            // The owner may be gone during shutdown
            let _ = tx.send(expiry);
        });

        self.pending.insert(
            member,
            PendingRemoval {
                generation,
                expires_at,
                timer,
            },
        );
    }
}

impl<M, C> Drop for PresenceTracker<M, C> {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    const PRIMARY: u64 = 1;
    const A: u64 = 10;
    const B: u64 = 11;
    const C: u64 = 12;
    const CHANNEL: u64 = 100;
    const OTHER_CHANNEL: u64 = 200;

    fn tracker() -> (PresenceTracker<u64, u64>, UnboundedReceiver<Expiry<u64>>) {
        let (tx, rx) = unbounded_channel();
        (PresenceTracker::new(PRIMARY, GRACE_PERIOD, tx), rx)
    }

    fn set(members: &[u64]) -> HashSet<u64> {
        members.iter().copied().collect()
    }

    /// Nothing fires within `wait`.
    async fn assert_quiet(rx: &mut UnboundedReceiver<Expiry<u64>>, wait: Duration) {
        let fired = tokio::time::timeout(wait, rx.recv()).await;
        assert!(fired.is_err(), "unexpected expiry: {:?}", fired);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_inactive() {
        let (t, _rx) = tracker();
        assert!(!t.is_active());
        assert_eq!(t.channel(), None);
        assert!(t.current_participants().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn primary_join_snapshots_occupants() {
        let (mut t, _rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);

        assert!(t.is_active());
        assert_eq!(t.channel(), Some(&CHANNEL));
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));

        // Repeated join to the same channel changes nothing
        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));
        assert_eq!(t.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_leave_while_inactive_is_ignored() {
        let (mut t, mut rx) = tracker();
        assert!(!t.on_primary_left(&CHANNEL));
        assert_eq!(t.pending_count(), 0);
        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn primary_leaving_a_stale_channel_is_ignored() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);

        // Switch reported as join(other) before leave(old)
        t.on_primary_joined(OTHER_CHANNEL, [PRIMARY, B]);
        assert!(!t.on_primary_left(&CHANNEL));
        assert_eq!(t.pending_count(), 0);

        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
        assert!(t.is_active());
        assert_eq!(t.channel(), Some(&OTHER_CHANNEL));
    }

    #[tokio::test(start_paused = true)]
    async fn primary_never_has_more_than_one_timer() {
        let (mut t, _rx) = tracker();
        t.on_primary_joined(CHANNEL, [A]);

        for _ in 0..5 {
            assert!(t.on_primary_left(&CHANNEL));
            assert!(t.on_primary_left(&CHANNEL));
            assert_eq!(t.pending_count(), 1);
            t.on_primary_joined(CHANNEL, [A]);
            assert_eq!(t.pending_count(), 0);
        }
        t.on_primary_left(&CHANNEL);
        assert_eq!(t.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_rejoin_within_grace_keeps_session() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);
        t.on_primary_left(&CHANNEL);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(t.is_active());
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));

        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);
        assert!(!t.is_pending(&PRIMARY));
        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
        assert!(t.is_active());
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));
    }

    #[tokio::test(start_paused = true)]
    async fn primary_absence_ends_session_once() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);
        let start = Instant::now();
        t.on_primary_left(&CHANNEL);

        let expiry = rx.recv().await.unwrap();
        assert!(Instant::now() - start >= GRACE_PERIOD);
        assert_eq!(t.on_expired(expiry.clone()), Some(Outcome::SessionEnded));
        assert!(!t.is_active());
        assert_eq!(t.channel(), None);
        assert!(t.current_participants().is_empty());

        // A duplicate delivery does nothing
        assert_eq!(t.on_expired(expiry), None);
        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn other_blip_keeps_participation() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);

        assert!(t.on_other_left(A, &CHANNEL));
        assert!(t.is_pending(&A));
        assert!(t.current_participants().contains(&A));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(t.on_other_joined(A, &CHANNEL));
        assert!(!t.is_pending(&A));

        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
        assert_eq!(t.current_participants(), set(&[PRIMARY, A]));
    }

    #[tokio::test(start_paused = true)]
    async fn other_absence_removes_member() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);
        t.on_other_left(B, &CHANNEL);

        let expiry = rx.recv().await.unwrap();
        assert_eq!(expiry.member, B);
        assert_eq!(t.on_expired(expiry), Some(Outcome::Removed(B)));
        assert_eq!(t.current_participants(), set(&[PRIMARY, A]));
        assert!(t.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous_timer() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);
        t.on_other_left(A, &CHANNEL);
        let first = t.pending_deadline(&A).unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        t.on_other_left(A, &CHANNEL);
        let second = t.pending_deadline(&A).unwrap();
        assert!(second > first);
        assert_eq!(t.pending_count(), 1);

        // Only the replacement fires, and only at its own deadline
        let expiry = rx.recv().await.unwrap();
        assert!(Instant::now() >= second);
        assert_eq!(t.on_expired(expiry), Some(Outcome::Removed(A)));
        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiry_is_ignored() {
        let (mut t, _rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);
        t.on_other_left(A, &CHANNEL);
        t.on_other_joined(A, &CHANNEL);

        // Queued before the cancel took effect
        let stale = Expiry {
            member: A,
            generation: 0,
        };
        assert_eq!(t.on_expired(stale), None);
        assert!(t.current_participants().contains(&A));
    }

    #[tokio::test(start_paused = true)]
    async fn untracked_events_are_ignored() {
        let (mut t, _rx) = tracker();

        // Inactive session
        assert!(!t.on_other_joined(A, &CHANNEL));
        assert!(!t.on_other_left(A, &CHANNEL));

        t.on_primary_joined(CHANNEL, [PRIMARY]);

        // Another channel
        assert!(!t.on_other_joined(A, &OTHER_CHANNEL));
        assert!(!t.on_other_left(A, &OTHER_CHANNEL));
        // Not a participant
        assert!(!t.on_other_left(C, &CHANNEL));

        assert_eq!(t.current_participants(), set(&[PRIMARY]));
        assert_eq!(t.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn participants_follow_last_occupancy() {
        let (mut t, _rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A, B]);
        t.on_other_left(A, &CHANNEL);

        // Moving to another channel replaces the snapshot and drops stale timers
        t.on_primary_joined(OTHER_CHANNEL, [PRIMARY, C]);
        assert_eq!(t.current_participants(), set(&[PRIMARY, C]));
        assert_eq!(t.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_end_discards_member_timers() {
        let (mut t, mut rx) = tracker();
        t.on_primary_joined(CHANNEL, [PRIMARY, A]);
        t.on_primary_left(&CHANNEL);
        tokio::time::advance(Duration::from_secs(5)).await;
        t.on_other_left(A, &CHANNEL);

        let expiry = rx.recv().await.unwrap();
        assert_eq!(expiry.member, PRIMARY);
        assert_eq!(t.on_expired(expiry), Some(Outcome::SessionEnded));
        assert_eq!(t.pending_count(), 0);
        assert_quiet(&mut rx, GRACE_PERIOD * 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_scenario() {
        let (mut t, mut rx) = tracker();

        t.on_primary_joined(CHANNEL, [A, B]);
        assert!(t.is_active());
        assert_eq!(t.channel(), Some(&CHANNEL));
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));

        t.on_other_left(A, &CHANNEL);
        assert!(t.is_pending(&A));

        tokio::time::advance(Duration::from_secs(5)).await;
        t.on_other_joined(A, &CHANNEL);
        assert!(!t.is_pending(&A));
        assert_eq!(t.current_participants(), set(&[PRIMARY, A, B]));

        t.on_primary_left(&CHANNEL);
        tokio::time::advance(Duration::from_secs(31)).await;

        let mut ended = 0;
        while let Ok(Some(expiry)) =
            tokio::time::timeout(Duration::from_secs(1), rx.recv()).await
        {
            if t.on_expired(expiry) == Some(Outcome::SessionEnded) {
                ended += 1;
            }
        }

        assert_eq!(ended, 1);
        assert!(!t.is_active());
        assert!(t.current_participants().is_empty());
    }
}
