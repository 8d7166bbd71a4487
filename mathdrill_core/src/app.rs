//! Application controller.
//!
//! Wires the session, the profile store and the rainbow countdown together.
//! Front-ends drive it with navigation snapshots, answers and clock ticks.

use crate::achievements::should_offer_rainbow_challenge;
use crate::countdown::{Countdown, CountdownTimer};
use crate::navigation::NavState;
use crate::profile::{ProfileStore, StartupProfile};
use crate::session::{Feedback, FeedbackSink, Session};
use crate::storage::KeyValueStore;
use crate::{Achievement, Config, DrillConfig, Phase, Profile, Result};
use chrono::{DateTime, Utc};

pub struct App<S> {
    session: Session,
    profiles: ProfileStore<S>,
    profile: Option<Profile>,
    timer: CountdownTimer,
    config: Config,
    rainbow_forfeited: bool,
    recorded: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self::with_session(store, config, Session::new())
    }

    /// Controller with a deterministic shuffle order
    pub fn with_seed(store: S, config: Config, seed: u64) -> Self {
        Self::with_session(store, config, Session::with_seed(seed))
    }

    fn with_session(store: S, config: Config, session: Session) -> Self {
        Self {
            session,
            profiles: ProfileStore::new(store),
            profile: None,
            timer: CountdownTimer::new(),
            config,
            rainbow_forfeited: false,
            recorded: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Direct access for learning-table toggles
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn profiles(&self) -> &ProfileStore<S> {
        &self.profiles
    }

    pub fn profiles_mut(&mut self) -> &mut ProfileStore<S> {
        &mut self.profiles
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.timer.countdown()
    }

    pub fn rainbow_forfeited(&self) -> bool {
        self.rainbow_forfeited
    }

    /// Restore state from a navigation snapshot
    ///
    /// Returns the snapshot to write back: an unknown profile id is dropped
    /// from it.
    pub fn startup(&mut self, nav: &NavState, now: DateTime<Utc>) -> NavState {
        let mut cleaned = nav.clone();

        match self.profiles.resolve_startup(nav.profile_id.as_deref(), now) {
            StartupProfile::Selected(mut profile) => {
                self.profiles.switch_to(&mut profile, now);
                self.profile = Some(profile);
            }
            StartupProfile::UnknownId(_) => {
                cleaned.profile_id = None;
                self.profile = None;
            }
            StartupProfile::NoneSaved => self.profile = None,
        }

        if nav.has_drill_parameters() {
            let fallback = if self.session.config().is_configured() {
                self.session.config().clone()
            } else {
                self.config.drill.to_drill_config()
            };
            if let Err(e) = self.configure(nav.reconcile(&fallback)) {
                tracing::warn!("Ignoring drill parameters from navigation: {}", e);
            }
        }

        self.enter_phase(nav.phase, nav.rainbow, now);

        if let Some(index) = nav.current_index {
            if index < self.session.calculations().len() {
                self.session.set_current_index(index);
            } else {
                tracing::debug!("Ignoring out-of-range index {} from navigation", index);
                cleaned.current_index = None;
            }
        }

        cleaned
    }

    /// Make `profile` the active one
    pub fn select_profile(&mut self, mut profile: Profile, now: DateTime<Utc>) {
        self.profiles.switch_to(&mut profile, now);
        self.profile = Some(profile);
    }

    /// Adopt a drill configuration; returns whether a new set was generated
    ///
    /// Base numbers and range values outside the accepted bounds are
    /// rejected before anything is generated.
    pub fn configure(&mut self, config: DrillConfig) -> Result<bool> {
        config.validate()?;
        let regenerated = self.session.configure(config);
        if regenerated {
            self.timer.cancel();
            self.rainbow_forfeited = false;
            self.recorded = false;
        }
        Ok(regenerated)
    }

    /// Start a fresh run in `phase`
    ///
    /// In a test with `rainbow` requested, the countdown starts when the
    /// active profile qualifies for the challenge. Returns whether it did.
    pub fn enter_phase(&mut self, phase: Phase, rainbow: bool, now: DateTime<Utc>) -> bool {
        self.timer.cancel();
        self.rainbow_forfeited = false;
        self.recorded = false;
        self.session.move_to_phase(phase);

        let offer = phase == Phase::Test
            && rainbow
            && should_offer_rainbow_challenge(
                self.profile.as_ref(),
                self.session.config().base_number,
                self.session.calculations().len(),
            );
        if offer {
            self.timer
                .start(self.config.achievements.rainbow_duration(), now);
            tracing::info!(
                "Rainbow challenge started for base {}",
                self.session.config().base_number
            );
        }
        offer
    }

    pub fn submit(&mut self, value: f64, sink: Option<&mut dyn FeedbackSink>) -> Option<Feedback> {
        self.session.submit_answer(value, sink)
    }

    pub fn skip(&mut self) {
        self.session.skip_question();
    }

    /// Advance the countdown; returns true when it expired on this tick
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.timer.poll(now).is_some() {
            self.rainbow_forfeited = true;
            tracing::info!("Rainbow challenge timed out");
            return true;
        }
        false
    }

    /// Record a completed test run against the active profile
    ///
    /// Returns the newly earned achievements once per run; `None` when the
    /// run is not a complete test, there is no profile, or it was already
    /// recorded.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<Vec<Achievement>> {
        if self.recorded || self.session.phase() != Phase::Test {
            return None;
        }
        let stats = self.session.stats(now)?;

        self.tick(now);
        self.timer.cancel();

        let profile = self.profile.as_mut()?;
        let mut policy = self.config.achievements.policy();
        policy.allow_rainbow = !self.rainbow_forfeited;

        let earned = self.profiles.record_test(profile, stats, &policy, now);
        self.recorded = true;
        Some(earned)
    }

    /// Snapshot of the current state for the navigation layer
    pub fn nav_state(&self) -> NavState {
        let mut nav = NavState::for_drill(self.session.phase(), self.session.config());
        if !self.session.calculations().is_empty() {
            nav.current_index = Some(self.session.current_index());
        }
        nav.profile_id = self.profile.as_ref().map(|p| p.id.clone());
        nav.rainbow = self.timer.is_running();
        nav
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{AchievementOperation, AchievementType, Operation};
    use chrono::Duration;

    fn app() -> App<MemoryStore> {
        App::with_seed(MemoryStore::new(), Config::default(), 7)
    }

    fn answer_all(app: &mut App<MemoryStore>) {
        while !app.session().is_complete() {
            let answer = app.session().current().unwrap().answer;
            app.submit(answer as f64, None);
        }
    }

    fn gold(operation: Operation, base: i64) -> Achievement {
        Achievement {
            id: format!("{}-{}-19-0", operation, base),
            kind: AchievementType::Gold,
            operation: AchievementOperation::Op(operation),
            base_number: base,
            total_questions: 19,
            earned_at: Utc::now(),
        }
    }

    #[test]
    fn test_startup_from_navigation() {
        let mut app = app();
        let nav = NavState::parse("phase=practice&operation=addition&baseNumber=4&currentIndex=2");
        let cleaned = app.startup(&nav, Utc::now());

        assert_eq!(cleaned, nav);
        assert_eq!(app.session().phase(), Phase::Practice);
        assert_eq!(app.session().config().base_number, 4);
        // Missing range falls back to config defaults
        assert_eq!(app.session().calculations().len(), 9);
        assert_eq!(app.session().current_index(), 2);
        assert!(app.profile().is_none());
    }

    #[test]
    fn test_startup_drops_unknown_profile() {
        let mut app = app();
        let nav = NavState::parse("profileId=12345&phase=learning");
        let cleaned = app.startup(&nav, Utc::now());

        assert_eq!(cleaned.profile_id, None);
        assert!(app.profile().is_none());
    }

    #[test]
    fn test_startup_uses_saved_profile_or_guest() {
        let mut app = app();
        let ada = app.profiles_mut().create("Ada", Utc::now()).unwrap();

        app.startup(&NavState::default(), Utc::now());
        assert_eq!(app.profile().unwrap().id, ada.id);

        app.startup(&NavState::parse("profileId=guest"), Utc::now());
        assert!(app.profile().unwrap().is_guest);
    }

    #[test]
    fn test_finish_records_once() {
        let mut app = app();
        let ada = app.profiles_mut().create("Ada", Utc::now()).unwrap();
        app.select_profile(ada.clone(), Utc::now());
        app.configure(DrillConfig::new(Operation::Multiplication, 3, 2, 10)).unwrap();

        app.enter_phase(Phase::Test, false, Utc::now());
        assert_eq!(app.finish(Utc::now()), None);

        answer_all(&mut app);
        let earned = app.finish(Utc::now()).unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].kind, AchievementType::Bronze);
        assert_eq!(app.finish(Utc::now()), None);

        let stored = app.profiles().find(&ada.id).unwrap();
        assert_eq!(stored.stats.len(), 1);
        assert_eq!(stored.achievements.len(), 1);
    }

    #[test]
    fn test_practice_is_never_recorded() {
        let mut app = app();
        let ada = app.profiles_mut().create("Ada", Utc::now()).unwrap();
        app.select_profile(ada, Utc::now());
        app.configure(DrillConfig::new(Operation::Addition, 2, 2, 4)).unwrap();
        app.enter_phase(Phase::Practice, false, Utc::now());
        answer_all(&mut app);

        assert_eq!(app.finish(Utc::now()), None);
    }

    fn gold_holder(app: &mut App<MemoryStore>) -> Profile {
        let mut ada = app.profiles_mut().create("Ada", Utc::now()).unwrap();
        ada.achievements.push(gold(Operation::Addition, 5));
        app.profiles_mut().save(&ada);
        app.select_profile(ada.clone(), Utc::now());
        ada
    }

    #[test]
    fn test_rainbow_within_time() {
        let mut app = app();
        gold_holder(&mut app);
        app.configure(DrillConfig::new(Operation::Subtraction, 5, 2, 20)).unwrap();

        let start = Utc::now();
        assert!(app.enter_phase(Phase::Test, true, start));
        assert!(app.countdown().is_some());
        assert!(app.nav_state().rainbow);

        answer_all(&mut app);
        assert!(!app.tick(start + Duration::seconds(30)));
        let earned = app.finish(start + Duration::seconds(30)).unwrap();

        let kinds: Vec<_> = earned.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AchievementType::Gold, AchievementType::Rainbow]);
        assert!(app.countdown().is_none());
    }

    #[test]
    fn test_rainbow_forfeited_after_timeout() {
        let mut app = app();
        gold_holder(&mut app);
        app.configure(DrillConfig::new(Operation::Subtraction, 5, 2, 20)).unwrap();

        let start = Utc::now();
        app.enter_phase(Phase::Test, true, start);
        answer_all(&mut app);
        assert!(app.tick(start + Duration::seconds(61)));
        assert!(app.rainbow_forfeited());

        let earned = app.finish(start + Duration::seconds(62)).unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].kind, AchievementType::Gold);
    }

    #[test]
    fn test_rainbow_not_offered_without_gold() {
        let mut app = app();
        let ada = app.profiles_mut().create("Ada", Utc::now()).unwrap();
        app.select_profile(ada, Utc::now());
        app.configure(DrillConfig::new(Operation::Addition, 5, 2, 20)).unwrap();

        assert!(!app.enter_phase(Phase::Test, true, Utc::now()));
        assert!(app.countdown().is_none());
    }

    #[test]
    fn test_reentering_phase_cancels_countdown() {
        let mut app = app();
        gold_holder(&mut app);
        app.configure(DrillConfig::new(Operation::Addition, 5, 2, 20)).unwrap();

        let start = Utc::now();
        app.enter_phase(Phase::Test, true, start);
        app.enter_phase(Phase::Practice, false, start + Duration::seconds(1));

        assert!(!app.tick(start + Duration::seconds(120)));
        assert!(!app.rainbow_forfeited());
    }

    #[test]
    fn test_configure_keeps_identical_set() {
        let mut app = app();
        let config = DrillConfig::new(Operation::Division, 4, 2, 6);
        assert!(app.configure(config.clone()).unwrap());
        let before = app.session().calculations().to_vec();
        assert!(!app.configure(config).unwrap());
        assert_eq!(app.session().calculations(), before.as_slice());
    }

    #[test]
    fn test_configure_rejects_out_of_bounds_values() {
        let mut app = app();
        let huge = DrillConfig::new(Operation::Multiplication, i64::MAX, 2, 3);
        assert!(matches!(app.configure(huge), Err(crate::Error::Other(_))));

        let wide = DrillConfig::new(Operation::Addition, 2, 2, 1_000_000);
        assert!(app.configure(wide).is_err());
        assert!(app.session().calculations().is_empty());
    }

    #[test]
    fn test_startup_clamps_navigation_values() {
        let mut app = app();
        let nav = NavState::parse("phase=test&operation=addition&baseNumber=500&rangeMax=100000");
        app.startup(&nav, Utc::now());

        assert_eq!(app.session().config().base_number, 20);
        assert_eq!(app.session().config().range_max, 20);
        assert_eq!(app.session().calculations().len(), 19);
    }

    #[test]
    fn test_reconfigure_mid_test_starts_over() {
        let mut app = app();
        app.configure(DrillConfig::new(Operation::Addition, 2, 2, 20)).unwrap();
        app.enter_phase(Phase::Test, false, Utc::now());
        for _ in 0..10 {
            app.submit(-1.0, None);
        }

        assert!(app.configure(DrillConfig::new(Operation::Addition, 2, 2, 4)).unwrap());
        assert_eq!(app.session().current_index(), 0);
        assert_eq!(app.session().mistakes(), 0);
        assert_eq!(app.session().calculations().len(), 3);

        answer_all(&mut app);
        assert_eq!(app.session().progress().correct, 3);
    }

    #[test]
    fn test_nav_state_roundtrip() {
        let mut app = app();
        app.configure(DrillConfig::new(Operation::Addition, 3, 2, 8)).unwrap();
        app.enter_phase(Phase::Practice, false, Utc::now());
        app.submit(0.0, None);

        let nav = app.nav_state();
        assert_eq!(nav.phase, Phase::Practice);
        assert_eq!(nav.current_index, Some(1));

        let mut restored = App::with_seed(MemoryStore::new(), Config::default(), 7);
        restored.startup(&NavState::parse(&nav.to_query()), Utc::now());
        assert_eq!(restored.session().config(), app.session().config());
        assert_eq!(restored.session().current_index(), 1);
    }
}
