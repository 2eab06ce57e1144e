// src/services/follow_up.rs

//! Applies outbox events: counter deltas and notification changes owed after
//! a comment write.
//!
//! Every effect is idempotent (counter deltas carry a key, notifications a
//! dedupe key, cleanup is naturally repeatable), so an event may be applied
//! any number of times. Requests dispatch their own event inline; the
//! background loop picks up whatever failed.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::AppError,
    models::{
        identity::{BlogId, CommentId, UserId},
        outbox::{FollowUp, OutboxEvent, OutboxStatus},
    },
    services::{
        fanout::{NotificationFanOut, ReplyNotice},
        ledger::{self, Delta},
    },
    store::{CommentRepository, CounterLedger, Outbox},
};

/// Events fetched per background pass.
const BATCH_SIZE: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ApplyDelta { key: String, delta: Delta },
    NotifyComment {
        blog_id: BlogId,
        recipient_id: UserId,
        actor_id: UserId,
        comment_id: CommentId,
    },
    NotifyReply(ReplyNotice),
    CleanupNotifications { comment_id: CommentId },
}

impl Effect {
    fn is_counter(&self) -> bool {
        matches!(self, Effect::ApplyDelta { .. })
    }
}

fn keyed(stage: &str, comment_id: CommentId, deltas: Vec<Delta>) -> impl Iterator<Item = Effect> {
    let stage = stage.to_string();
    deltas.into_iter().map(move |delta| Effect::ApplyDelta {
        key: format!("{}:{}:{}", stage, comment_id, delta.field),
        delta,
    })
}

/// Expands a recorded follow-up into the effects it owes.
pub fn expand(follow_up: &FollowUp) -> Vec<Effect> {
    match follow_up {
        FollowUp::CommentCreated {
            comment_id,
            blog_id,
            blog_author_id,
            author_id,
            parent_comment_id,
            parent_author_id,
            in_flight_notification_id,
        } => {
            let mut effects: Vec<Effect> = keyed(
                "created",
                *comment_id,
                ledger::on_comment_created(*blog_id, parent_comment_id.is_some()),
            )
            .collect();

            match (parent_comment_id, parent_author_id) {
                (Some(parent_comment_id), Some(parent_author_id)) => {
                    effects.push(Effect::NotifyReply(ReplyNotice {
                        blog_id: *blog_id,
                        recipient_hint: *blog_author_id,
                        actor_id: *author_id,
                        comment_id: *comment_id,
                        parent_comment_id: *parent_comment_id,
                        parent_author_id: *parent_author_id,
                        update_notification_id: *in_flight_notification_id,
                    }));
                }
                _ => effects.push(Effect::NotifyComment {
                    blog_id: *blog_id,
                    recipient_id: *blog_author_id,
                    actor_id: *author_id,
                    comment_id: *comment_id,
                }),
            }

            effects
        }
        FollowUp::CommentsDeleted { blog_id, removed } => {
            let mut effects = Vec::new();
            for node in removed {
                effects.extend(keyed(
                    "deleted",
                    node.id,
                    ledger::on_comment_removed(*blog_id, node.is_reply),
                ));
                effects.push(Effect::CleanupNotifications {
                    comment_id: node.id,
                });
            }
            effects
        }
    }
}

#[derive(Clone)]
pub struct FollowUpDispatcher {
    outbox: Arc<dyn Outbox>,
    ledger: Arc<dyn CounterLedger>,
    comments: Arc<dyn CommentRepository>,
    fanout: NotificationFanOut,
    max_attempts: i32,
}

impl FollowUpDispatcher {
    pub fn new(
        outbox: Arc<dyn Outbox>,
        ledger: Arc<dyn CounterLedger>,
        comments: Arc<dyn CommentRepository>,
        fanout: NotificationFanOut,
        max_attempts: i32,
    ) -> Self {
        Self {
            outbox,
            ledger,
            comments,
            fanout,
            max_attempts,
        }
    }

    /// Applies one event right after its primary write. Failures are logged
    /// and left to the background loop; they never reach the caller.
    pub async fn dispatch(&self, event_id: i64) {
        match self.outbox.fetch_event(event_id).await {
            Ok(Some(event)) if event.status == OutboxStatus::Pending => {
                self.process(&event).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not load outbox event {}: {}", event_id, e),
        }
    }

    /// One pass over pending events. Returns how many were completed.
    pub async fn run_pending(&self) -> Result<usize, AppError> {
        let events = self.outbox.pending_events(BATCH_SIZE).await?;
        let mut completed = 0;
        for event in &events {
            if self.process(event).await {
                completed += 1;
            }
        }
        Ok(completed)
    }

    /// Background loop; runs until the task is dropped.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.run_pending().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Applied {} pending follow-ups", n),
                Err(e) => tracing::warn!("Outbox pass failed: {}", e),
            }
        }
    }

    async fn process(&self, event: &OutboxEvent) -> bool {
        let (counters, notices): (Vec<Effect>, Vec<Effect>) = expand(&event.follow_up.0)
            .into_iter()
            .partition(Effect::is_counter);

        // Counter and notification work do not depend on each other.
        let (counter_errors, notice_errors) =
            tokio::join!(self.apply_all(&counters), self.apply_all(&notices));

        let errors: Vec<String> = counter_errors.into_iter().chain(notice_errors).collect();

        if errors.is_empty() {
            if let Err(e) = self.outbox.complete_event(event.id).await {
                tracing::warn!("Could not complete outbox event {}: {}", event.id, e);
                return false;
            }
            return true;
        }

        let message = errors.join("; ");
        match self
            .outbox
            .fail_event(event.id, &message, self.max_attempts)
            .await
        {
            Ok(OutboxStatus::Dead) => tracing::error!(
                "Giving up on outbox event {} after {} attempts: {}",
                event.id,
                self.max_attempts,
                message
            ),
            Ok(_) => tracing::warn!("Follow-up {} failed, will retry: {}", event.id, message),
            Err(e) => tracing::warn!("Could not record failure of event {}: {}", event.id, e),
        }
        false
    }

    /// Applies effects in order, carrying on past failures.
    async fn apply_all(&self, effects: &[Effect]) -> Vec<String> {
        let mut errors = Vec::new();
        for effect in effects {
            if let Err(e) = self.apply(effect).await {
                errors.push(e.to_string());
            }
        }
        errors
    }

    async fn apply(&self, effect: &Effect) -> Result<(), AppError> {
        match effect {
            Effect::ApplyDelta { key, delta } => {
                self.ledger
                    .apply_delta_once(key, delta.entity, delta.field, delta.delta)
                    .await?;
            }
            Effect::NotifyComment {
                blog_id,
                recipient_id,
                actor_id,
                comment_id,
            } => {
                if self.still_exists(*comment_id).await? {
                    self.fanout
                        .notify_comment(*blog_id, *recipient_id, *actor_id, *comment_id)
                        .await?;
                }
            }
            Effect::NotifyReply(notice) => {
                if self.still_exists(notice.comment_id).await? {
                    self.fanout.notify_reply(notice.clone()).await?;
                }
            }
            Effect::CleanupNotifications { comment_id } => {
                self.fanout.delete_for_comment(*comment_id).await?;
            }
        }
        Ok(())
    }

    /// A retried notification must not resurrect a comment deleted meanwhile.
    async fn still_exists(&self, comment_id: CommentId) -> Result<bool, AppError> {
        Ok(self.comments.find_comment(comment_id).await?.is_some())
    }
}
