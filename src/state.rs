use crate::config::Config;
use crate::services::{
    comments::CommentService,
    engagement::EngagementService,
    fanout::NotificationFanOut,
    follow_up::FollowUpDispatcher,
    tree::CommentTree,
};
use crate::store::Stores;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub comments: CommentService,
    pub engagement: EngagementService,
    pub notifications: NotificationFanOut,
    pub config: Config,
}

impl AppState {
    /// Wires every service on top of one set of stores.
    pub fn new(stores: Stores, config: Config) -> Self {
        let notifications = NotificationFanOut::new(stores.notifications.clone());

        let dispatcher = FollowUpDispatcher::new(
            stores.outbox.clone(),
            stores.ledger.clone(),
            stores.comments.clone(),
            notifications.clone(),
            config.outbox_max_attempts,
        );

        let comments = CommentService::new(
            CommentTree::new(stores.comments.clone()),
            stores.blogs.clone(),
            stores.accounts.clone(),
            dispatcher,
        );

        let engagement =
            EngagementService::new(stores.blogs, stores.ledger, notifications.clone());

        Self {
            comments,
            engagement,
            notifications,
            config,
        }
    }

    pub fn dispatcher(&self) -> FollowUpDispatcher {
        self.comments.dispatcher().clone()
    }
}

impl FromRef<AppState> for CommentService {
    fn from_ref(state: &AppState) -> Self {
        state.comments.clone()
    }
}

impl FromRef<AppState> for EngagementService {
    fn from_ref(state: &AppState) -> Self {
        state.engagement.clone()
    }
}

impl FromRef<AppState> for NotificationFanOut {
    fn from_ref(state: &AppState) -> Self {
        state.notifications.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
