//! Per-guild queue and idle timer state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serenity::model::id::GuildId;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Queue and idle timer of a single guild.
#[derive(Debug)]
pub struct GuildMusicState<T> {
    /// Tracks waiting to be played, front first.
    pub queue: VecDeque<T>,

    /// Pending idle-disconnect task.
    idle_task: Option<JoinHandle<()>>,
}

impl<T> Default for GuildMusicState<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            idle_task: None,
        }
    }
}

impl<T> GuildMusicState<T> {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the pending idle task, if any.
    pub fn cancel_idle(&mut self) {
        if let Some(task) = self.idle_task.take()
            && !task.is_finished()
        {
            task.abort();
        }
    }

    /// Replaces the idle task, aborting the previous one.
    pub fn set_idle_task(&mut self, task: JoinHandle<()>) {
        self.cancel_idle();
        self.idle_task = Some(task);
    }

    /// Whether an idle task is scheduled and still running.
    #[must_use]
    pub fn has_idle_task(&self) -> bool {
        self.idle_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Removes the track at a 1-based position.
    pub fn remove_position(&mut self, position: i64) -> Option<T> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        self.queue.remove(index)
    }
}

/// Shared handle to one guild's state.
pub type SharedGuildState<T> = Arc<Mutex<GuildMusicState<T>>>;

/// Registry of guild states, created lazily on first access.
#[derive(Debug)]
pub struct GuildStates<T> {
    states: RwLock<HashMap<GuildId, SharedGuildState<T>>>,
}

impl<T> Default for GuildStates<T> {
    fn default() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> GuildStates<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of a guild, creating it if needed.
    pub async fn get(&self, guild_id: GuildId) -> SharedGuildState<T> {
        if let Some(state) = self.states.read().await.get(&guild_id) {
            return Arc::clone(state);
        }

        let mut states = self.states.write().await;
        Arc::clone(
            states
                .entry(guild_id)
                .or_insert_with(|| Arc::new(Mutex::new(GuildMusicState::new()))),
        )
    }

    /// Number of guilds with state.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Whether no guild has state yet.
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_get_creates_once() {
        let states: GuildStates<String> = GuildStates::new();
        assert!(states.is_empty().await);

        let first = states.get(GuildId::new(1)).await;
        first.lock().await.queue.push_back("a".to_owned());

        let again = states.get(GuildId::new(1)).await;
        assert_eq!(again.lock().await.queue.len(), 1);
        assert_eq!(states.len().await, 1);

        let other = states.get(GuildId::new(2)).await;
        assert!(other.lock().await.queue.is_empty());
        assert_eq!(states.len().await, 2);
    }

    #[test]
    fn test_remove_position_bounds() {
        let mut state = GuildMusicState::new();
        state.queue.extend(["a", "b", "c"]);

        assert_eq!(state.remove_position(0), None);
        assert_eq!(state.remove_position(-1), None);
        assert_eq!(state.remove_position(4), None);
        assert_eq!(state.remove_position(2), Some("b"));
        assert_eq!(state.queue, VecDeque::from(["a", "c"]));
    }

    #[tokio::test]
    async fn test_cancel_idle_aborts_task() {
        let mut state: GuildMusicState<()> = GuildMusicState::new();
        state.set_idle_task(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));
        assert!(state.has_idle_task());

        state.cancel_idle();
        assert!(!state.has_idle_task());
    }
}
