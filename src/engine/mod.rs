//! Bracket engine facade.
//!
//! Every operation loads a stage record from the store, applies one pure
//! mutation to it and commits it with compare-and-swap. A lost race re-reads
//! and re-applies the mutation, so sibling matches completing at the same
//! time can never overwrite each other's advancement writes. Events go out
//! only after the commit succeeded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::bracket::{self, MAX_TEAMS};
use crate::config::EngineConfig;
use crate::error::{BracketError, BracketResult, Conflict};
use crate::models::{
    group_rounds, AdvancementEffect, BracketState, BracketView, Match, MatchId, MatchSide,
    MatchUpdate, Placement, ResultUpdate, SeedingMethod, Stage, StageFormat, StageId,
    StageSettings, StageStatus, StandingStatus, SwissSummary, Team,
};
use crate::notify::{EventKind, EventSink, StageEvent, TracingSink};
use crate::progression;
use crate::seeding::{make_rng, seed_teams};
use crate::standings;
use crate::storage::{BracketStore, StageRecord, StorageError};
use crate::swiss::{self, SwissRound};

/// Entry point for every bracket operation.
pub struct BracketEngine {
    store: Arc<dyn BracketStore>,
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
}

impl BracketEngine {
    pub fn new(store: Arc<dyn BracketStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn BracketStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load, mutate, commit. Retries the whole mutation when another writer
    /// committed the stage first.
    fn mutate<T>(
        &self,
        stage_id: &StageId,
        op: &str,
        mut apply: impl FnMut(&mut StageRecord) -> BracketResult<T>,
    ) -> BracketResult<(T, StageRecord)> {
        let attempts = self.config.storage.commit_retries.max(1);
        for attempt in 1..=attempts {
            let mut record = self.store.load_stage(stage_id)?;
            let out = apply(&mut record)?;
            record.stage.updated_at = Utc::now();

            match self.store.commit_stage(&record) {
                Ok(version) => {
                    record.version = version;
                    debug!("{} on stage {} committed at version {}", op, stage_id, version);
                    return Ok((out, record));
                }
                Err(e) if e.is_conflict() => {
                    debug!(
                        "{} on stage {} lost a commit race (attempt {}/{}): {}",
                        op, stage_id, attempt, attempts, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("{} on stage {} gave up after {} attempts", op, stage_id, attempts);
        Err(BracketError::StateConflict(Conflict::Contention { attempts }))
    }

    fn publish(&self, stage_id: &StageId, kind: EventKind, effects: &[AdvancementEffect]) {
        self.sink.publish(&StageEvent::new(stage_id, kind));
        for event in StageEvent::from_effects(stage_id, effects) {
            self.sink.publish(&event);
        }
    }

    fn stage_of(&self, match_id: &MatchId) -> BracketResult<StageId> {
        self.store
            .locate_match(match_id)?
            .ok_or_else(|| BracketError::NotFound(format!("match {}", match_id)))
    }

    /// Register an empty stage.
    pub fn create_stage(
        &self,
        stage_id: &StageId,
        name: &str,
        format: StageFormat,
        settings: Option<StageSettings>,
    ) -> BracketResult<Stage> {
        let settings = settings.unwrap_or_else(|| self.config.stage_settings());
        validate_settings(&settings)?;

        let stage = Stage::new(stage_id.clone(), name.to_string(), format, settings);
        match self.store.create_stage(stage) {
            Ok(record) => {
                info!("Created {} stage {}", format, stage_id);
                Ok(record.stage)
            }
            Err(StorageError::AlreadyExists(_)) => {
                let existing = self.store.load_stage(stage_id)?;
                Err(BracketError::stage_conflict(
                    existing.stage.status,
                    format!("stage {} already exists", stage_id),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Seed `teams` and build the full bracket of a stage.
    ///
    /// The stage is created if it does not exist yet; an existing stage must
    /// still be pending. Settings default to the configured ones.
    pub fn generate_bracket(
        &self,
        stage_id: &StageId,
        format: StageFormat,
        teams: &[Team],
        settings: Option<StageSettings>,
    ) -> BracketResult<BracketView> {
        let settings = settings.unwrap_or_else(|| self.config.stage_settings());
        validate_settings(&settings)?;

        // Validate and build before anything is stored
        let candidate = Stage::new(stage_id.clone(), stage_id.to_string(), format, settings.clone());
        bracket::validate_field(&candidate, teams.len())?;
        let mut rng = make_rng(settings.rng_seed);
        let seeded = seed_teams(teams, settings.seeding, &mut rng)?;
        let matches = bracket::build_matches(&candidate, &seeded, &mut rng)?;
        let seeds: Vec<_> = seeded.iter().map(|s| (s.team.id.clone(), s.seed)).collect();

        match self.store.create_stage(candidate) {
            Ok(_) | Err(StorageError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let (effects, record) = self.mutate(stage_id, "generate_bracket", |record| {
            if record.stage.status != StageStatus::Pending {
                return Err(BracketError::stage_conflict(
                    record.stage.status,
                    "bracket already generated; reset the stage first",
                ));
            }
            record.stage.format = format;
            record.stage.settings = settings.clone();

            record.standings = standings::initial_standings(&record.stage, &seeds);
            record.matches = matches.clone();
            record.stage.status = StageStatus::Seeded;
            record.stage.champion = None;

            let mut effects = progression::settle_byes(record)?;
            if format == StageFormat::Swiss {
                record.stage.current_round = 1;
                effects.extend(swiss::apply_byes(record, 1));
            } else {
                record.stage.current_round =
                    record.matches.iter().map(|m| m.round).max().unwrap_or(0);
            }
            Ok(effects)
        })?;

        info!(
            "Generated {} bracket for stage {}: {} teams, {} matches",
            format,
            stage_id,
            record.standings.len(),
            record.matches.len()
        );
        self.publish(
            stage_id,
            EventKind::BracketGenerated {
                format,
                team_count: record.standings.len(),
                match_count: record.matches.len(),
            },
            &effects,
        );

        Ok(BracketView {
            rounds: group_rounds(&record.matches),
            stage: record.stage,
            matches: record.matches,
        })
    }

    /// Record a score for a match and advance its teams.
    pub fn update_match_result(
        &self,
        match_id: &MatchId,
        update: ResultUpdate,
    ) -> BracketResult<MatchUpdate> {
        let stage_id = self.stage_of(match_id)?;
        let (result, _) = self.mutate(&stage_id, "update_match_result", |record| {
            progression::update_match_result(record, match_id, update)
        })?;

        self.publish(
            &stage_id,
            EventKind::MatchUpdated {
                match_id: match_id.clone(),
                team1_score: result.updated.team1_score,
                team2_score: result.updated.team2_score,
                winner_id: result.updated.winner_id.clone(),
            },
            &result.effects,
        );
        Ok(result)
    }

    /// Mark a ready match as live.
    pub fn start_match(&self, match_id: &MatchId) -> BracketResult<Match> {
        let stage_id = self.stage_of(match_id)?;
        let (m, _) = self.mutate(&stage_id, "start_match", |record| {
            progression::start_match(record, match_id)
        })?;
        info!("Match {} is live", match_id);
        Ok(m)
    }

    /// Complete a match for `side` without play.
    pub fn award_walkover(&self, match_id: &MatchId, side: MatchSide) -> BracketResult<MatchUpdate> {
        let stage_id = self.stage_of(match_id)?;
        let (result, _) = self.mutate(&stage_id, "award_walkover", |record| {
            progression::award_walkover(record, match_id, side)
        })?;

        self.publish(
            &stage_id,
            EventKind::MatchUpdated {
                match_id: match_id.clone(),
                team1_score: result.updated.team1_score,
                team2_score: result.updated.team2_score,
                winner_id: result.updated.winner_id.clone(),
            },
            &result.effects,
        );
        Ok(result)
    }

    /// Cancel a match that has not been completed.
    pub fn cancel_match(&self, match_id: &MatchId) -> BracketResult<MatchUpdate> {
        let stage_id = self.stage_of(match_id)?;
        let (result, _) = self.mutate(&stage_id, "cancel_match", |record| {
            progression::cancel_match(record, match_id)
        })?;

        self.publish(
            &stage_id,
            EventKind::MatchUpdated {
                match_id: match_id.clone(),
                team1_score: result.updated.team1_score,
                team2_score: result.updated.team2_score,
                winner_id: None,
            },
            &result.effects,
        );
        Ok(result)
    }

    /// Current state of a stage: rounds, matches, ranked standings, champion.
    pub fn get_bracket_state(&self, stage_id: &StageId) -> BracketResult<BracketState> {
        let record = self.store.load_stage(stage_id)?;
        Ok(BracketState {
            rounds: group_rounds(&record.matches),
            champion: record.stage.champion.clone(),
            standings: standings::ranked(&record.standings),
            stage: record.stage,
            matches: record.matches,
        })
    }

    /// Pair the next round of a Swiss stage.
    pub fn generate_next_swiss_round(
        &self,
        stage_id: &StageId,
        round_number: u32,
        force: bool,
    ) -> BracketResult<SwissRound> {
        let (round, _) = self.mutate(stage_id, "generate_next_swiss_round", |record| {
            swiss::generate_round(record, round_number, force)
        })?;

        self.publish(
            stage_id,
            EventKind::SwissRoundGenerated {
                round: round.round,
                match_count: round.matches.len(),
            },
            &round.effects,
        );
        Ok(round)
    }

    /// Delete every match, zero every standing and return the stage to pending.
    pub fn reset_bracket(&self, stage_id: &StageId) -> BracketResult<Stage> {
        let (removed, record) = self.mutate(stage_id, "reset_bracket", |record| {
            let removed = record.matches.len();
            record.matches.clear();
            for s in record.standings.iter_mut() {
                s.reset();
            }
            record.stage.reset();
            Ok(removed)
        })?;

        info!("Reset stage {} ({} matches removed)", stage_id, removed);
        self.publish(stage_id, EventKind::StageReset, &[]);
        Ok(record.stage)
    }

    /// Final ranking of a stage.
    pub fn placements(&self, stage_id: &StageId) -> BracketResult<Vec<Placement>> {
        let record = self.store.load_stage(stage_id)?;
        Ok(standings::placements(
            &record.stage,
            &record.matches,
            &record.standings,
        ))
    }

    /// Progress counters of a Swiss stage.
    pub fn swiss_summary(&self, stage_id: &StageId) -> BracketResult<SwissSummary> {
        let record = self.store.load_stage(stage_id)?;
        if record.stage.format != StageFormat::Swiss {
            return Err(BracketError::format_mismatch(format!(
                "stage {} is {}, not swiss",
                stage_id, record.stage.format
            )));
        }
        Ok(swiss::summary(&record))
    }

    /// Every stored stage.
    pub fn list_stages(&self) -> BracketResult<Vec<Stage>> {
        let mut stages = Vec::new();
        for id in self.store.list_stages()? {
            stages.push(self.store.load_stage(&id)?.stage);
        }
        Ok(stages)
    }

    /// Seed the top `take` teams of a completed stage into a new stage.
    ///
    /// Qualified teams come first, then everyone else, each in placement
    /// order. The new stage is seeded manually in that order.
    pub fn advance_stage(
        &self,
        from: &StageId,
        to: &StageId,
        format: StageFormat,
        take: usize,
        settings: Option<StageSettings>,
    ) -> BracketResult<BracketView> {
        let source = self.store.load_stage(from)?;
        if !source.stage.is_completed() {
            return Err(BracketError::stage_conflict(
                source.stage.status,
                "only a completed stage can send teams on",
            ));
        }
        if take > source.standings.len() {
            return Err(BracketError::validation(format!(
                "stage {} has {} teams, cannot take {}",
                from,
                source.standings.len(),
                take
            )));
        }

        let order = standings::placements(&source.stage, &source.matches, &source.standings);
        let qualified = |team: &crate::models::TeamId| {
            source
                .standings
                .iter()
                .any(|s| &s.team_id == team && s.status == StandingStatus::Qualified)
        };
        let (mut advancing, rest): (Vec<&Placement>, Vec<&Placement>) =
            order.iter().partition(|p| qualified(&p.team_id));
        advancing.extend(rest);

        let teams: Vec<Team> = advancing
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(i, p)| Team::new(p.team_id.clone(), p.team_id.to_string()).with_seed(i as u32 + 1))
            .collect();

        let mut settings = settings.unwrap_or_else(|| self.config.stage_settings());
        settings.seeding = SeedingMethod::Manual;

        let view = self.generate_bracket(to, format, &teams, Some(settings))?;
        info!("Advanced {} teams from {} to {}", teams.len(), from, to);
        self.publish(
            from,
            EventKind::StageAdvanced {
                to_stage: to.clone(),
                team_count: teams.len(),
            },
            &[],
        );
        Ok(view)
    }
}

/// Reject settings no stage can be generated with.
fn validate_settings(settings: &StageSettings) -> BracketResult<()> {
    if settings.best_of == 0 || settings.best_of % 2 == 0 {
        return Err(BracketError::validation(format!(
            "best_of must be odd and at least 1, got {}",
            settings.best_of
        )));
    }
    if !(2..=MAX_TEAMS).contains(&(settings.max_teams as usize)) {
        return Err(BracketError::validation(format!(
            "max_teams must be between 2 and {}, got {}",
            MAX_TEAMS, settings.max_teams
        )));
    }
    if settings.swiss.wins_required == 0 || settings.swiss.losses_eliminated == 0 {
        return Err(BracketError::validation(
            "Swiss thresholds must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BracketSection, MatchStatus, TeamId};
    use crate::notify::MemorySink;
    use crate::storage::InMemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn engine() -> BracketEngine {
        BracketEngine::new(Arc::new(InMemoryStore::new()))
    }

    fn teams(n: u32) -> Vec<Team> {
        (1..=n)
            .map(|i| {
                Team::new(format!("t{}", i), format!("Team {}", i))
                    .with_rating(f64::from(2000 - i * 10))
            })
            .collect()
    }

    fn ready_ids(state: &BracketState) -> Vec<MatchId> {
        state
            .matches
            .iter()
            .filter(|m| m.status == MatchStatus::Ready)
            .map(|m| m.id.clone())
            .collect()
    }

    /// Play every ready match (team1 wins 2-0) until the stage stops moving.
    fn play_out(engine: &BracketEngine, stage_id: &StageId) {
        loop {
            let ready = ready_ids(&engine.get_bracket_state(stage_id).unwrap());
            if ready.is_empty() {
                return;
            }
            for id in ready {
                engine
                    .update_match_result(&id, ResultUpdate::scores(2, 0))
                    .unwrap();
            }
        }
    }

    /// Fails the first `failures` commits with a version conflict.
    struct RacingStore {
        inner: InMemoryStore,
        failures: AtomicU32,
    }

    impl BracketStore for RacingStore {
        fn create_stage(&self, stage: Stage) -> Result<StageRecord, StorageError> {
            self.inner.create_stage(stage)
        }

        fn load_stage(&self, stage_id: &StageId) -> Result<StageRecord, StorageError> {
            self.inner.load_stage(stage_id)
        }

        fn commit_stage(&self, record: &StageRecord) -> Result<u64, StorageError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StorageError::Conflict {
                    stage_id: record.stage.id.to_string(),
                    expected: record.version,
                    actual: record.version + 1,
                });
            }
            self.inner.commit_stage(record)
        }

        fn locate_match(&self, match_id: &MatchId) -> Result<Option<StageId>, StorageError> {
            self.inner.locate_match(match_id)
        }

        fn list_stages(&self) -> Result<Vec<StageId>, StorageError> {
            self.inner.list_stages()
        }
    }

    #[test]
    fn test_generate_single_elim() {
        let engine = engine();
        let id = StageId::from("main");
        let view = engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(8), None)
            .unwrap();

        assert_eq!(view.matches.len(), 7);
        assert_eq!(view.stage.status, StageStatus::Seeded);
        assert_eq!(view.rounds.len(), 3);
        assert_eq!(view.rounds[0].name, "Quarterfinals");
        assert_eq!(view.rounds[2].name, "Final");

        let state = engine.get_bracket_state(&id).unwrap();
        assert_eq!(state.standings.len(), 8);
        assert_eq!(ready_ids(&state).len(), 4);
    }

    #[test]
    fn test_generate_twice_conflicts() {
        let engine = engine();
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let err = engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap_err();
        assert!(err.is_state_conflict());
    }

    #[test]
    fn test_rejected_generation_creates_no_stage() {
        let engine = engine();
        let id = StageId::from("group-a");
        let err = engine
            .generate_bracket(&id, StageFormat::Gsl, &teams(5), None)
            .unwrap_err();
        assert!(matches!(err, BracketError::FormatMismatch(_)));

        assert!(matches!(
            engine.get_bracket_state(&id).unwrap_err(),
            BracketError::NotFound(_)
        ));
        assert!(engine.list_stages().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_generation_leaves_existing_stage_pending() {
        let engine = engine();
        let id = StageId::from("group-a");
        engine
            .create_stage(&id, "Group A", StageFormat::Gsl, None)
            .unwrap();
        assert!(engine
            .generate_bracket(&id, StageFormat::Gsl, &teams(5), None)
            .is_err());

        let state = engine.get_bracket_state(&id).unwrap();
        assert_eq!(state.stage.status, StageStatus::Pending);
        assert!(state.matches.is_empty());
    }

    #[test]
    fn test_even_best_of_rejected() {
        let engine = engine();
        let settings = StageSettings {
            best_of: 2,
            ..StageSettings::default()
        };
        let err = engine
            .generate_bracket(&StageId::from("s"), StageFormat::SingleElim, &teams(4), Some(settings))
            .unwrap_err();
        assert!(matches!(err, BracketError::Validation(_)));
    }

    #[test]
    fn test_single_elim_to_champion_with_events() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine().with_sink(sink.clone());
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();

        play_out(&engine, &id);

        let state = engine.get_bracket_state(&id).unwrap();
        assert_eq!(state.champion, Some(TeamId::from("t1")));
        assert_eq!(state.stage.status, StageStatus::Completed);

        let events = sink.events();
        assert!(matches!(events[0].kind, EventKind::BracketGenerated { match_count: 3, .. }));
        assert!(events.iter().any(|e| matches!(
            &e.kind,
            EventKind::Advancement {
                effect: AdvancementEffect::ChampionDecided { .. }
            }
        )));
    }

    #[test]
    fn test_update_unknown_match() {
        let engine = engine();
        let err = engine
            .update_match_result(&MatchId::from("nope"), ResultUpdate::scores(2, 0))
            .unwrap_err();
        assert!(matches!(err, BracketError::NotFound(_)));
    }

    #[test]
    fn test_identical_resubmission_is_noop() {
        let engine = engine();
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let semi = ready_ids(&engine.get_bracket_state(&id).unwrap())[0].clone();

        let first = engine
            .update_match_result(&semi, ResultUpdate::scores(2, 1))
            .unwrap();
        assert!(!first.effects.is_empty());
        let again = engine
            .update_match_result(&semi, ResultUpdate::scores(2, 1))
            .unwrap();
        assert!(again.effects.is_empty());

        let err = engine
            .update_match_result(&semi, ResultUpdate::scores(0, 2))
            .unwrap_err();
        assert!(err.is_state_conflict());
    }

    #[test]
    fn test_reset_clears_matches_and_standings() {
        let engine = engine();
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let semi = ready_ids(&engine.get_bracket_state(&id).unwrap())[0].clone();
        engine
            .update_match_result(&semi, ResultUpdate::scores(2, 0))
            .unwrap();

        let stage = engine.reset_bracket(&id).unwrap();
        assert_eq!(stage.status, StageStatus::Pending);

        let state = engine.get_bracket_state(&id).unwrap();
        assert!(state.matches.is_empty());
        assert!(state.standings.iter().all(|s| s.wins == 0 && s.losses == 0));
        assert!(matches!(
            engine.update_match_result(&semi, ResultUpdate::scores(2, 0)),
            Err(BracketError::NotFound(_))
        ));

        // The stage can be generated again
        engine
            .generate_bracket(&id, StageFormat::DoubleElim, &teams(4), None)
            .unwrap();
    }

    #[test]
    fn test_swiss_through_engine() {
        let engine = engine();
        let id = StageId::from("swiss");
        engine
            .generate_bracket(&id, StageFormat::Swiss, &teams(8), None)
            .unwrap();

        let err = engine.generate_next_swiss_round(&id, 2, false).unwrap_err();
        assert!(matches!(
            err,
            BracketError::StateConflict(Conflict::RoundIncomplete { round: 1, .. })
        ));

        play_out(&engine, &id);
        let round = engine.generate_next_swiss_round(&id, 2, false).unwrap();
        assert_eq!(round.matches.len(), 4);
        assert!(round
            .matches
            .iter()
            .all(|m| m.section == BracketSection::Swiss && m.round_name == "Round 2"));

        let summary = engine.swiss_summary(&id).unwrap();
        assert_eq!(summary.current_round, 2);
        assert_eq!(summary.matches_completed, 4);
        assert_eq!(summary.matches_remaining, 4);
        assert_eq!(summary.active_teams, 8);
    }

    #[test]
    fn test_swiss_summary_requires_swiss() {
        let engine = engine();
        let id = StageId::from("rr");
        engine
            .generate_bracket(&id, StageFormat::RoundRobin, &teams(4), None)
            .unwrap();
        assert!(matches!(
            engine.swiss_summary(&id),
            Err(BracketError::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_advance_stage_takes_top_teams() {
        let engine = engine();
        let groups = StageId::from("groups");
        let settings = StageSettings {
            advance_count: Some(2),
            ..StageSettings::default()
        };
        engine
            .generate_bracket(&groups, StageFormat::RoundRobin, &teams(4), Some(settings))
            .unwrap();

        let playoffs = StageId::from("playoffs");
        let err = engine
            .advance_stage(&groups, &playoffs, StageFormat::SingleElim, 2, None)
            .unwrap_err();
        assert!(err.is_state_conflict());

        play_out(&engine, &groups);
        let view = engine
            .advance_stage(&groups, &playoffs, StageFormat::SingleElim, 2, None)
            .unwrap();
        assert_eq!(view.matches.len(), 1);

        // Team1 always won, so seeds 1 and 2 finish top of the table
        let final_match = &view.matches[0];
        assert_eq!(final_match.team1_id, Some(TeamId::from("t1")));
        assert_eq!(final_match.team2_id, Some(TeamId::from("t2")));
        assert_eq!(view.stage.settings.seeding, SeedingMethod::Manual);
    }

    #[test]
    fn test_advance_stage_rejects_oversized_take() {
        let engine = engine();
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(2), None)
            .unwrap();
        play_out(&engine, &id);
        assert!(matches!(
            engine.advance_stage(&id, &StageId::from("next"), StageFormat::SingleElim, 3, None),
            Err(BracketError::Validation(_))
        ));
    }

    #[test]
    fn test_placements_after_double_elim() {
        let engine = engine();
        let id = StageId::from("de");
        engine
            .generate_bracket(&id, StageFormat::DoubleElim, &teams(4), None)
            .unwrap();
        play_out(&engine, &id);

        let placements = engine.placements(&id).unwrap();
        assert_eq!(placements.len(), 4);
        assert_eq!(placements[0].team_id, TeamId::from("t1"));
        assert_eq!(placements[0].placement, 1);
    }

    #[test]
    fn test_list_stages() {
        let engine = engine();
        engine
            .create_stage(&StageId::from("b"), "B", StageFormat::Gsl, None)
            .unwrap();
        engine
            .create_stage(&StageId::from("a"), "A", StageFormat::Swiss, None)
            .unwrap();
        assert!(engine
            .create_stage(&StageId::from("a"), "A", StageFormat::Swiss, None)
            .unwrap_err()
            .is_state_conflict());

        let names: Vec<String> = engine
            .list_stages()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_commit_race_is_retried() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
            failures: AtomicU32::new(0),
        });
        let engine = BracketEngine::new(store.clone());
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let semi = ready_ids(&engine.get_bracket_state(&id).unwrap())[0].clone();

        store.failures.store(3, Ordering::SeqCst);
        let update = engine
            .update_match_result(&semi, ResultUpdate::scores(2, 0))
            .unwrap();
        assert_eq!(update.updated.status, MatchStatus::Completed);
    }

    #[test]
    fn test_commit_contention_gives_up() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
            failures: AtomicU32::new(0),
        });
        let engine = BracketEngine::new(store.clone());
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let semi = ready_ids(&engine.get_bracket_state(&id).unwrap())[0].clone();

        store.failures.store(100, Ordering::SeqCst);
        let err = engine
            .update_match_result(&semi, ResultUpdate::scores(2, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            BracketError::StateConflict(Conflict::Contention { attempts: 8 })
        ));

        // Nothing was committed
        store.failures.store(0, Ordering::SeqCst);
        let state = engine.get_bracket_state(&id).unwrap();
        assert!(state.matches.iter().all(|m| m.status != MatchStatus::Completed));
    }

    #[test]
    fn test_concurrent_semifinals_fill_both_final_slots() {
        let engine = Arc::new(engine());
        let id = StageId::from("main");
        engine
            .generate_bracket(&id, StageFormat::SingleElim, &teams(4), None)
            .unwrap();
        let semis = ready_ids(&engine.get_bracket_state(&id).unwrap());
        assert_eq!(semis.len(), 2);

        std::thread::scope(|scope| {
            for semi in &semis {
                let engine = engine.clone();
                scope.spawn(move || {
                    engine
                        .update_match_result(semi, ResultUpdate::scores(2, 0))
                        .unwrap();
                });
            }
        });

        let state = engine.get_bracket_state(&id).unwrap();
        let final_match = state
            .matches
            .iter()
            .find(|m| m.round == 2)
            .unwrap();
        assert_eq!(final_match.status, MatchStatus::Ready);
        assert!(final_match.team1_id.is_some());
        assert!(final_match.team2_id.is_some());
        assert_ne!(final_match.team1_id, final_match.team2_id);
    }
}
