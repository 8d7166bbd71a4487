//! Profile persistence.
//!
//! Profiles live under two keys of a [`KeyValueStore`]:
//! - `profiles`: JSON array of every durable profile
//! - `currentProfile`: JSON of the last active durable profile
//!
//! Guest profiles are never written.

use crate::achievements::AchievementPolicy;
use crate::storage::{get_json, set_json, KeyValueStore};
use crate::{Achievement, Error, Phase, Profile, Result, SessionStats, GUEST_PROFILE_ID};
use chrono::{DateTime, Utc};

pub const PROFILES_KEY: &str = "profiles";
pub const CURRENT_PROFILE_KEY: &str = "currentProfile";

/// Outcome of resolving the profile at startup
#[derive(Clone, Debug, PartialEq)]
pub enum StartupProfile {
    /// A guest, a stored profile matching the requested id, or the saved
    /// current profile
    Selected(Profile),
    /// An id was requested but no stored profile has it; callers should
    /// drop it from navigation state
    UnknownId(String),
    /// Nothing requested and nothing saved
    NoneSaved,
}

impl StartupProfile {
    pub fn into_profile(self) -> Option<Profile> {
        match self {
            StartupProfile::Selected(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Trim a candidate name and reject empty or duplicate names
///
/// Duplicates are compared case-insensitively.
pub fn validate_name(name: &str, existing: &[Profile]) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Profile("Profile name cannot be empty".into()));
    }
    let lowered = trimmed.to_lowercase();
    if existing.iter().any(|p| p.name.to_lowercase() == lowered) {
        return Err(Error::Profile(format!(
            "A profile named {:?} already exists",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Sole writer of durable profile records
#[derive(Clone, Debug)]
pub struct ProfileStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProfileStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Vec<Profile> {
        get_json(&self.store, PROFILES_KEY, Vec::new())
    }

    pub fn find(&self, id: &str) -> Option<Profile> {
        self.list().into_iter().find(|p| p.id == id)
    }

    pub fn current(&self) -> Option<Profile> {
        get_json(&self.store, CURRENT_PROFILE_KEY, None)
    }

    /// Pick the profile to start with
    ///
    /// `"guest"` yields a fresh guest, another id must match a stored
    /// profile, and no id falls back to the saved current profile.
    pub fn resolve_startup(&self, profile_id: Option<&str>, now: DateTime<Utc>) -> StartupProfile {
        match profile_id {
            Some(GUEST_PROFILE_ID) => StartupProfile::Selected(Profile::guest(now)),
            Some(id) => match self.find(id) {
                Some(profile) => StartupProfile::Selected(profile),
                None => {
                    tracing::warn!("Requested profile {} not found", id);
                    StartupProfile::UnknownId(id.to_string())
                }
            },
            None => match self.current() {
                Some(profile) => StartupProfile::Selected(profile),
                None => StartupProfile::NoneSaved,
            },
        }
    }

    /// Create and persist a named profile
    pub fn create(&mut self, name: &str, now: DateTime<Utc>) -> Result<Profile> {
        let existing = self.list();
        let name = validate_name(name, &existing)?;

        let mut millis = now.timestamp_millis();
        while existing.iter().any(|p| p.id == millis.to_string()) {
            millis += 1;
        }

        let profile = Profile::new(millis.to_string(), name, now);
        self.save(&profile);
        tracing::info!("Created profile {} ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Upsert a profile and make it current; guests are ignored
    pub fn save(&mut self, profile: &Profile) {
        if profile.is_guest {
            tracing::debug!("Not persisting guest profile");
            return;
        }

        let mut profiles = self.list();
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }

        set_json(&mut self.store, PROFILES_KEY, &profiles);
        set_json(&mut self.store, CURRENT_PROFILE_KEY, profile);
    }

    /// Make `profile` the active one
    pub fn switch_to(&mut self, profile: &mut Profile, now: DateTime<Utc>) {
        profile.last_used = now;
        self.save(profile);
        tracing::info!("Switched to profile {} ({})", profile.name, profile.id);
    }

    /// Remove a profile; returns whether it existed
    pub fn delete(&mut self, id: &str) -> bool {
        let mut profiles = self.list();
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        let removed = profiles.len() != before;
        set_json(&mut self.store, PROFILES_KEY, &profiles);

        if self.current().is_some_and(|p| p.id == id) {
            self.store.remove(CURRENT_PROFILE_KEY);
        }

        if removed {
            tracing::info!("Deleted profile {}", id);
        }
        removed
    }

    /// Append a finished test run to `profile` and award achievements
    ///
    /// Returns the newly earned achievements. Non-test stats are ignored.
    pub fn record_test(
        &mut self,
        profile: &mut Profile,
        stats: SessionStats,
        policy: &AchievementPolicy,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        if stats.phase != Phase::Test {
            tracing::debug!("Only test runs are recorded, ignoring {} stats", stats.phase);
            return Vec::new();
        }

        let earned = policy.evaluate(profile, &stats, now);
        profile.stats.push(stats);
        profile.achievements.extend(earned.iter().cloned());
        profile.last_used = now;
        self.save(profile);

        earned
    }
}
