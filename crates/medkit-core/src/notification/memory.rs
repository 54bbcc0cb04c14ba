//! In-process notification platform.
//!
//! Keeps triggers in memory. Used by tests and by headless hosts that have
//! no OS notification service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{NotificationDescriptor, NotificationPlatform, PlatformError, PlatformResult};

#[derive(Debug)]
struct State {
    permission: bool,
    exact_alarms: bool,
    pending: BTreeMap<String, NotificationDescriptor>,
    failing: BTreeSet<String>,
    cancel_all_calls: usize,
}

/// [`NotificationPlatform`] holding pending triggers in a map.
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// Platform with permission granted and nothing pending.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                permission: true,
                exact_alarms: true,
                pending: BTreeMap::new(),
                failing: BTreeSet::new(),
                cancel_all_calls: 0,
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_permission(&self, granted: bool) {
        self.with_state(|s| s.permission = granted);
    }

    pub fn set_exact_alarms(&self, allowed: bool) {
        self.with_state(|s| s.exact_alarms = allowed);
    }

    /// Make scheduling of `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.with_state(|s| s.failing.insert(id.to_string()));
    }

    /// Pending ids in sorted order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.with_state(|s| s.pending.keys().cloned().collect())
    }

    pub fn pending(&self, id: &str) -> Option<NotificationDescriptor> {
        self.with_state(|s| s.pending.get(id).cloned())
    }

    pub fn cancel_all_calls(&self) -> usize {
        self.with_state(|s| s.cancel_all_calls)
    }
}

#[async_trait]
impl NotificationPlatform for InMemoryPlatform {
    async fn check_permission(&self) -> bool {
        self.with_state(|s| s.permission)
    }

    async fn request_permission(&self) -> bool {
        self.with_state(|s| {
            s.permission = true;
            true
        })
    }

    async fn can_schedule_exact_alarms(&self) -> bool {
        self.with_state(|s| s.exact_alarms)
    }

    async fn schedule_notification(&self, notification: &NotificationDescriptor) -> PlatformResult<()> {
        self.with_state(|s| {
            if !s.permission {
                return Err(PlatformError::PermissionDenied);
            }
            if s.failing.contains(&notification.id) {
                return Err(PlatformError::Other(format!("rejected {}", notification.id)));
            }
            s.pending
                .insert(notification.id.clone(), notification.clone());
            Ok(())
        })
    }

    async fn cancel_notification(&self, id: &str) -> PlatformResult<()> {
        self.with_state(|s| match s.pending.remove(id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound(id.to_string())),
        })
    }

    async fn cancel_all_notifications(&self) -> PlatformResult<()> {
        self.with_state(|s| {
            s.pending.clear();
            s.cancel_all_calls += 1;
        });
        Ok(())
    }

    async fn get_trigger_notifications(&self) -> PlatformResult<Vec<NotificationDescriptor>> {
        self.with_state(|s| Ok(s.pending.values().cloned().collect()))
    }
}
