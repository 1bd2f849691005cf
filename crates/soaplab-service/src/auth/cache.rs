use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::Profile;
use crate::repositories::ProfileRepository;

/// Session changes that make cached profiles stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedOut(Uuid),
    /// Raised by embedders that swap the signed-in user on a long-lived
    /// state, such as a desktop shell sharing one `ProfileCache`.
    UserChanged { previous: Option<Uuid>, current: Uuid },
    ProfileUpdated(Uuid),
}

/// User → profile lookups shared by the profile endpoints. Each application
/// state owns its own instance.
#[derive(Clone, Default)]
pub struct ProfileCache {
    entries: Arc<DashMap<Uuid, Profile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: Uuid) -> Option<Profile> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, profile: Profile) {
        self.entries.insert(profile.id, profile);
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.entries.remove(&user_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn on_auth_event(&self, event: AuthEvent) {
        debug!(?event, "Invalidating cached profiles");
        match event {
            AuthEvent::SignedOut(user_id) | AuthEvent::ProfileUpdated(user_id) => {
                self.invalidate(user_id)
            }
            AuthEvent::UserChanged { previous, current } => {
                if let Some(previous) = previous {
                    self.invalidate(previous);
                }
                self.invalidate(current);
            }
        }
    }

    /// Cached profile for `user_id`, loading and remembering it on a miss.
    /// Misses that find no profile are not cached.
    pub async fn get_or_load<P: ProfileRepository>(
        &self,
        profiles: &P,
        user_id: Uuid,
    ) -> Result<Option<Profile>, StoreError> {
        if let Some(profile) = self.get(user_id) {
            return Ok(Some(profile));
        }

        let profile = profiles.find_by_user_id(user_id).await?;
        if let Some(profile) = &profile {
            self.insert(profile.clone());
        }
        Ok(profile)
    }
}
