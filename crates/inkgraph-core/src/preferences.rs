//! Per-user preferences shared by every editor a user has open.

use crate::error::Result;
use crate::shapes::SerializableColor;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What a user has chosen, independent of any document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub user_name: String,
    /// Stroke color for newly drawn shapes.
    pub color: SerializableColor,
    /// Snap translated shapes to the grid.
    pub is_snap_mode: bool,
    pub is_dark_mode: bool,
    /// Wheel zooms instead of panning, without the accelerator key.
    pub is_wheel_zoom: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_name: String::from("New User"),
            color: SerializableColor::black(),
            is_snap_mode: false,
            is_dark_mode: false,
            is_wheel_zoom: false,
        }
    }
}

impl Preferences {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

type Subscriber = Arc<dyn Fn(&Preferences) + Send + Sync>;

/// Identifies a preferences subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Shared {
    value: Preferences,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

/// Shared handle to one user's preferences.
///
/// Cloning the handle shares the preferences; pass a clone to every editor
/// the user opens.
#[derive(Clone, Default)]
pub struct UserPreferences {
    shared: Arc<RwLock<Shared>>,
}

impl fmt::Debug for UserPreferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.read();
        f.debug_struct("UserPreferences")
            .field("value", &shared.value)
            .field("subscribers", &shared.subscribers.len())
            .finish()
    }
}

impl UserPreferences {
    pub fn new(value: Preferences) -> Self {
        Self {
            shared: Arc::new(RwLock::new(Shared {
                value,
                ..Shared::default()
            })),
        }
    }

    /// A copy of the current preferences.
    pub fn get(&self) -> Preferences {
        self.shared.read().value.clone()
    }

    /// Edit the preferences and notify subscribers if anything changed.
    pub fn update(&self, edit: impl FnOnce(&mut Preferences)) {
        let (value, subscribers) = {
            let mut shared = self.shared.write();
            let before = shared.value.clone();
            edit(&mut shared.value);
            if shared.value == before {
                return;
            }
            let subscribers: Vec<Subscriber> = shared.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect();
            (shared.value.clone(), subscribers)
        };
        log::debug!("preferences updated");
        for subscriber in subscribers {
            subscriber(&value);
        }
    }

    /// Call `subscriber` with the new value after every change.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Preferences) + Send + Sync + 'static,
    {
        let mut shared = self.shared.write();
        shared.next_id += 1;
        let id = SubscriptionId(shared.next_id);
        shared.subscribers.push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut shared = self.shared.write();
        let before = shared.subscribers.len();
        shared.subscribers.retain(|(sid, _)| *sid != id);
        shared.subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_update_is_shared_and_notifies() {
        let prefs = UserPreferences::default();
        let other = prefs.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = prefs.subscribe(move |p| {
            assert!(p.is_snap_mode);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        other.update(|p| p.is_snap_mode = true);
        assert!(prefs.get().is_snap_mode);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No change, no notification.
        other.update(|p| p.is_snap_mode = true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(prefs.unsubscribe(id));
        assert!(!prefs.unsubscribe(id));
    }

    #[test]
    fn test_preferences_json() {
        let prefs = Preferences::from_json(r#"{"userName":"ada","isSnapMode":true}"#).unwrap();
        assert_eq!(prefs.user_name, "ada");
        assert!(prefs.is_snap_mode);
        assert_eq!(prefs.color, SerializableColor::black());
        let back = Preferences::from_json(&prefs.to_json().unwrap()).unwrap();
        assert_eq!(back, prefs);
    }
}
