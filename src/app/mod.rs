//! Application core: immutable state, a pure reducer, derived views and the
//! task that owns them.

pub mod orchestrator;
pub mod reducer;
pub mod selectors;
pub mod state;

pub use orchestrator::{validate_publish_topic, ActionSink, Orchestrator};
pub use reducer::{reduce, Action};
pub use state::{AppState, Favourite, PersistedState, SavedMessage, TopicMessage, WatchEntry};
