//! Pure state transitions. `reduce` never performs I/O; timestamps and other
//! inputs from the outside world travel inside the action.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::state::{AppState, Favourite, PersistedState, SavedMessage, TopicMessage, WatchEntry};
use crate::session::{BrokerConfig, ConnectionStatus};
use crate::topics::{add_filter, edit_filter, ensure_default_filters, ingest, toggle_expansion, ExcludeFilter};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replaces the persisted slices with what storage returned.
    Hydrate(PersistedState),
    Status(ConnectionStatus),
    Subscription { filter_label: String, summary: String },
    Message { topic: String, payload: String, received_at: DateTime<Utc> },
    SetSearch(String),
    SetExcludeFilters(Vec<ExcludeFilter>),
    /// Blank patterns are ignored; callers validate first.
    AddExcludeFilter(String),
    EditExcludeFilter { index: usize, pattern: String },
    ToggleExpansion(String),
    SetPaused(bool),
    /// Adds the topic to favourites, or removes it when already there.
    ToggleFavourite(String),
    RemoveFavourite(String),
    /// A blank alias clears it.
    RenameFavourite { topic: String, alias: String },
    /// Adds the entry to the watchlist, or removes it when already there.
    ToggleWatch(WatchEntry),
    SaveMessage(SavedMessage),
    DeleteSavedMessage(usize),
    SetBroker(BrokerConfig),
}

impl Action {
    /// Whether applying this action may change a persisted slice.
    pub fn touches_persisted(&self) -> bool {
        matches!(
            self,
            Action::SetExcludeFilters(_)
                | Action::AddExcludeFilter(_)
                | Action::EditExcludeFilter { .. }
                | Action::ToggleFavourite(_)
                | Action::RemoveFavourite(_)
                | Action::RenameFavourite { .. }
                | Action::ToggleWatch(_)
                | Action::SaveMessage(_)
                | Action::DeleteSavedMessage(_)
                | Action::SetBroker(_)
        )
    }
}

pub fn reduce(state: AppState, action: Action) -> AppState {
    match action {
        Action::Hydrate(persisted) => AppState {
            broker: persisted.broker,
            favourites: persisted.favourites,
            watchlist: persisted.watchlist,
            saved_messages: persisted.saved_messages,
            exclude_filters: ensure_default_filters(persisted.exclude_filters),
            ..state
        },
        Action::Status(status) => AppState { status, ..state },
        Action::Subscription { filter_label, summary } => AppState {
            last_subscription: Some(filter_label),
            subscription_info: Some(summary),
            ..state
        },
        Action::Message { topic, payload, received_at } => {
            if state.updates_paused {
                return state;
            }
            let mut state = state;
            if state.topics.binary_search(&topic).is_err() {
                let topics = Arc::make_mut(&mut state.topics);
                *topics = ingest(std::mem::take(topics), &topic);
            }
            let message = TopicMessage::parse(topic.clone(), payload, received_at);
            Arc::make_mut(&mut state.messages).insert(topic.clone(), Arc::new(message));
            state.message_count += 1;
            state.last_message_topic = Some(topic);
            state.last_message_at = Some(received_at);
            state
        }
        Action::SetSearch(query) => AppState { search_query: query, ..state },
        Action::SetExcludeFilters(filters) => AppState { exclude_filters: filters, ..state },
        Action::AddExcludeFilter(pattern) => match add_filter(&state.exclude_filters, &pattern) {
            Ok(exclude_filters) => AppState { exclude_filters, ..state },
            Err(_) => state,
        },
        Action::EditExcludeFilter { index, pattern } => match edit_filter(&state.exclude_filters, index, &pattern) {
            Ok(exclude_filters) => AppState { exclude_filters, ..state },
            Err(_) => state,
        },
        Action::ToggleExpansion(path) => {
            let expansion = toggle_expansion(&state.expansion, &path);
            AppState { expansion, ..state }
        }
        Action::SetPaused(paused) => AppState { updates_paused: paused, ..state },
        Action::ToggleFavourite(topic) => {
            let mut state = state;
            if state.is_favourite(&topic) {
                state.favourites.retain(|f| f.topic != topic);
            } else {
                state.favourites.push(Favourite { topic, alias: None });
            }
            state
        }
        Action::RemoveFavourite(topic) => {
            let mut state = state;
            state.favourites.retain(|f| f.topic != topic);
            state
        }
        Action::RenameFavourite { topic, alias } => {
            let mut state = state;
            let alias = alias.trim();
            for favourite in state.favourites.iter_mut().filter(|f| f.topic == topic) {
                favourite.alias = (!alias.is_empty()).then(|| alias.to_string());
            }
            state
        }
        Action::ToggleWatch(entry) => {
            let mut state = state;
            if state.watchlist.contains(&entry) {
                state.watchlist.retain(|w| w != &entry);
            } else {
                state.watchlist.push(entry);
            }
            state
        }
        Action::SaveMessage(message) => {
            let mut state = state;
            state.saved_messages.push(message);
            state
        }
        Action::DeleteSavedMessage(index) => {
            let mut state = state;
            if index < state.saved_messages.len() {
                state.saved_messages.remove(index);
            }
            state
        }
        Action::SetBroker(broker) => AppState { broker, ..state },
    }
}
