//! Profile mutations with change notification.

use domain::models::profile::{NewProfile, ProfileEvent, UserProfile};
use persistence::repositories::{HistoryAppend, ProfileRepository};
use sqlx::PgPool;

use super::profile_events::ProfileEvents;

/// Wraps [`ProfileRepository`] so that every successful mutation is
/// published on the [`ProfileEvents`] hub.
#[derive(Clone)]
pub struct ProfileService {
    repo: ProfileRepository,
    events: ProfileEvents,
}

impl ProfileService {
    pub fn new(pool: PgPool, events: ProfileEvents) -> Self {
        Self {
            repo: ProfileRepository::new(pool),
            events,
        }
    }

    /// Returns the caller's profile, creating it on first access.
    pub async fn ensure(&self, profile: &NewProfile) -> Result<UserProfile, sqlx::Error> {
        let (entity, created) = self.repo.ensure_profile(profile).await?;
        let profile: UserProfile = entity.into();

        if created {
            tracing::info!(user_id = %profile.uid, "Profile created");
            self.events.publish(ProfileEvent::Created {
                profile: profile.clone(),
            });
        }

        Ok(profile)
    }

    pub async fn find(&self, uid: &str) -> Result<Option<UserProfile>, sqlx::Error> {
        Ok(self.repo.find_by_uid(uid).await?.map(Into::into))
    }

    /// Sets the username. A name taken by another user is a unique violation.
    pub async fn set_username(
        &self,
        uid: &str,
        username: &str,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        let updated = self.repo.set_username(uid, username).await?;
        Ok(self.publish_updated(updated))
    }

    pub async fn update(
        &self,
        uid: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        let updated = self.repo.update_profile(uid, display_name, photo_url).await?;
        Ok(self.publish_updated(updated))
    }

    /// Prepends a history entry and refreshes stats.
    ///
    /// Returns `None` if the user has no profile.
    pub async fn append_history(
        &self,
        uid: &str,
        append: &HistoryAppend,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        let Some(entity) = self.repo.append_history(uid, append).await? else {
            return Ok(None);
        };
        let profile: UserProfile = entity.into();

        tracing::debug!(
            user_id = %uid,
            history_id = %append.item.id,
            kind = %append.item.kind,
            total_score = profile.stats.total_score,
            "History entry added"
        );
        self.events.publish(ProfileEvent::HistoryAdded {
            uid: uid.to_string(),
            item: append.item.clone(),
            stats: profile.stats.clone(),
        });

        Ok(Some(profile))
    }

    fn publish_updated(
        &self,
        updated: Option<persistence::entities::UserEntity>,
    ) -> Option<UserProfile> {
        let profile: UserProfile = updated?.into();
        self.events.publish(ProfileEvent::Updated {
            profile: profile.clone(),
        });
        Some(profile)
    }
}
