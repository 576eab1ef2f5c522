use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{
    ChampionshipId, Match, MatchId, MatchProbability, MatchStatus, Period, Score, ScoringVariant,
    Season, StandingEntry,
};
use crate::probability::{apply_championship_probabilities, match_probabilities};
use crate::repository::Repository;
use crate::scoring::{PointsRule, rules_for, validate_periods};
use crate::simulation::{SimulationReport, Simulator};
use crate::standings::StandingsTable;
use crate::strength;

/// Standings with title odds plus fixture odds, from one simulation run.
#[derive(Debug, Clone)]
pub struct ProbabilityRun {
    pub standings: Vec<StandingEntry>,
    pub matches: Vec<MatchProbability>,
}

#[derive(Debug, Default)]
struct ChampionshipLocks {
    inner: Mutex<HashMap<ChampionshipId, Arc<Mutex<()>>>>,
}

impl ChampionshipLocks {
    fn handle(&self, id: ChampionshipId) -> Result<Arc<Mutex<()>>, EngineError> {
        let mut locks = self
            .inner
            .lock()
            .map_err(|_| anyhow!("championship lock registry poisoned"))?;
        // Entries only the registry still holds are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(id).or_default()))
    }
}

pub struct Engine<R: Repository> {
    repo: R,
    config: EngineConfig,
    locks: ChampionshipLocks,
}

impl<R: Repository> Engine<R> {
    pub fn new(repo: R, config: EngineConfig) -> Self {
        Self {
            repo,
            config,
            locks: ChampionshipLocks::default(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recomputes the table from completed matches and replaces the stored one.
    pub fn calculate_standings(&self, id: ChampionshipId) -> Result<Vec<StandingEntry>, EngineError> {
        self.exclusive(id, || {
            let season = self.load(id)?;
            let rules = rules_for(season.championship.variant);
            let rows = StandingsTable::build(&season, rules.as_ref())?.ranked();
            self.repo.save_standings(id, &rows)?;
            log::info!("championship {id}: standings recalculated for {} teams", rows.len());
            Ok(rows)
        })
        .inspect_err(|err| log_failure("standings", id, err))
    }

    pub fn calculate_win_probabilities(
        &self,
        id: ChampionshipId,
    ) -> Result<Vec<StandingEntry>, EngineError> {
        let mut rng = self.rng();
        self.calculate_win_probabilities_with_rng(id, &mut rng)
    }

    /// Title odds for every team. The stored standings must match the
    /// recomputed table, so results entered since the last
    /// `calculate_standings` are rejected as stale.
    pub fn calculate_win_probabilities_with_rng(
        &self,
        id: ChampionshipId,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StandingEntry>, EngineError> {
        self.exclusive(id, || {
            let season = self.load(id)?;
            let rules = rules_for(season.championship.variant);
            let table = StandingsTable::build(&season, rules.as_ref())?;
            let mut rows = table.ranked();
            self.ensure_fresh(id, &rows)?;

            let report = self.simulate(&season, &table, rules.as_ref(), rng)?;
            apply_championship_probabilities(&report, &mut rows);
            self.repo.save_standings(id, &rows)?;
            log::info!(
                "championship {id}: title odds from {} trials over {} fixtures",
                report.trials,
                report.fixtures.len()
            );
            Ok(rows)
        })
        .inspect_err(|err| log_failure("win probabilities", id, err))
    }

    pub fn calculate_match_probabilities(
        &self,
        id: ChampionshipId,
    ) -> Result<Vec<MatchProbability>, EngineError> {
        let mut rng = self.rng();
        self.calculate_match_probabilities_with_rng(id, &mut rng)
    }

    /// Home/away win odds for every scheduled fixture; replaces all stored rows.
    pub fn calculate_match_probabilities_with_rng(
        &self,
        id: ChampionshipId,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<MatchProbability>, EngineError> {
        self.exclusive(id, || {
            let season = self.load(id)?;
            let rules = rules_for(season.championship.variant);
            let table = StandingsTable::build(&season, rules.as_ref())?;

            let report = self.simulate(&season, &table, rules.as_ref(), rng)?;
            let rows = match_probabilities(&report, id, Utc::now());
            self.repo.save_match_probabilities(id, &rows)?;
            log::info!(
                "championship {id}: fixture odds for {} scheduled matches",
                rows.len()
            );
            Ok(rows)
        })
        .inspect_err(|err| log_failure("match probabilities", id, err))
    }

    pub fn calculate_probabilities(&self, id: ChampionshipId) -> Result<ProbabilityRun, EngineError> {
        let mut rng = self.rng();
        self.calculate_probabilities_with_rng(id, &mut rng)
    }

    /// Standings, title odds and fixture odds from a single trial loop.
    pub fn calculate_probabilities_with_rng(
        &self,
        id: ChampionshipId,
        rng: &mut dyn RngCore,
    ) -> Result<ProbabilityRun, EngineError> {
        self.exclusive(id, || {
            let season = self.load(id)?;
            let rules = rules_for(season.championship.variant);
            let table = StandingsTable::build(&season, rules.as_ref())?;

            let report = self.simulate(&season, &table, rules.as_ref(), rng)?;
            let mut standings = table.ranked();
            apply_championship_probabilities(&report, &mut standings);
            let matches = match_probabilities(&report, id, Utc::now());

            self.repo.save_probabilities(id, &standings, &matches)?;
            log::info!(
                "championship {id}: refreshed {} standings and {} fixture odds",
                standings.len(),
                matches.len()
            );
            Ok(ProbabilityRun { standings, matches })
        })
        .inspect_err(|err| log_failure("probabilities", id, err))
    }

    /// Records a UISP result. The periods are validated before anything is
    /// read or written; standings are not recalculated here.
    pub fn set_uisp_result(
        &self,
        match_id: MatchId,
        periods: Vec<Period>,
        home_score: u32,
        away_score: u32,
    ) -> Result<Match, EngineError> {
        validate_periods(&periods)
            .map_err(|source| EngineError::InvalidResult { match_id, source })
            .inspect_err(|err| log::warn!("match {match_id}: {err}"))?;

        self.transition(match_id, Some(ScoringVariant::Uisp), move |m| {
            m.status = MatchStatus::Completed;
            m.score = Some(Score::new(home_score, away_score));
            m.periods = periods;
        })
    }

    /// Records a CSI final score.
    pub fn set_result(
        &self,
        match_id: MatchId,
        home_score: u32,
        away_score: u32,
    ) -> Result<Match, EngineError> {
        self.transition(match_id, Some(ScoringVariant::Csi), |m| {
            m.status = MatchStatus::Completed;
            m.score = Some(Score::new(home_score, away_score));
            m.periods.clear();
        })
    }

    pub fn postpone_match(&self, match_id: MatchId) -> Result<Match, EngineError> {
        self.transition(match_id, None, |m| m.status = MatchStatus::Postponed)
    }

    pub fn cancel_match(&self, match_id: MatchId) -> Result<Match, EngineError> {
        self.transition(match_id, None, |m| m.status = MatchStatus::Cancelled)
    }

    /// Moves a scheduled match to another state and drops its fixture odds.
    fn transition(
        &self,
        match_id: MatchId,
        variant: Option<ScoringVariant>,
        apply: impl FnOnce(&mut Match),
    ) -> Result<Match, EngineError> {
        let current = self
            .repo
            .find_match(match_id)?
            .ok_or(EngineError::MatchNotFound(match_id))?;

        let championship_id = current.championship_id;
        self.exclusive(championship_id, || {
            // Re-read under the lock.
            let mut m = self
                .repo
                .find_match(match_id)?
                .ok_or(EngineError::MatchNotFound(match_id))?;

            if let Some(required) = variant {
                let championship = self
                    .repo
                    .championship(m.championship_id)?
                    .ok_or(EngineError::ChampionshipNotFound(m.championship_id))?;
                if championship.variant != required {
                    return Err(EngineError::WrongVariant {
                        match_id,
                        variant: championship.variant,
                    });
                }
            }
            if m.status != MatchStatus::Scheduled {
                return Err(EngineError::NotScheduled {
                    match_id,
                    status: m.status,
                });
            }

            apply(&mut m);
            self.repo.save_match(&m)?;
            self.repo.delete_match_probability(match_id)?;
            log::info!("match {match_id}: now {}", m.status);
            Ok(m)
        })
        .inspect_err(|err| log_failure("match update", championship_id, err))
    }

    fn exclusive<T>(
        &self,
        id: ChampionshipId,
        op: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let lock = self.locks.handle(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| anyhow!("championship {id} lock poisoned"))?;
        op()
    }

    fn load(&self, id: ChampionshipId) -> Result<Season, EngineError> {
        let championship = self
            .repo
            .championship(id)?
            .ok_or(EngineError::ChampionshipNotFound(id))?;
        let teams = self.repo.teams(id)?;
        let matches = self.repo.matches(id)?;
        Ok(Season {
            championship,
            teams,
            matches,
        })
    }

    fn ensure_fresh(&self, id: ChampionshipId, rows: &[StandingEntry]) -> Result<(), EngineError> {
        let stored = self.repo.standings(id)?;
        if stored.is_empty() && !rows.is_empty() {
            return Err(EngineError::StandingsMissing(id));
        }
        let fresh = stored.len() == rows.len()
            && rows
                .iter()
                .all(|row| stored.iter().any(|s| s.same_record(row)));
        if !fresh {
            return Err(EngineError::StandingsStale(id));
        }
        Ok(())
    }

    fn simulate(
        &self,
        season: &Season,
        table: &StandingsTable,
        rules: &dyn PointsRule,
        rng: &mut dyn RngCore,
    ) -> Result<SimulationReport, EngineError> {
        let strengths = strength::estimate(table, self.config.strength_model);
        let simulator = Simulator::new(season, table, &strengths, rules, self.config.simulation())?;
        Ok(simulator.run(rng)?)
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn log_failure(op: &str, id: ChampionshipId, err: &EngineError) {
    if err.is_rejection() {
        log::warn!("championship {id}: {op} rejected: {err}");
    } else {
        log::error!("championship {id}: {op} failed: {err}");
    }
}
