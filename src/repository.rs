use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::model::{
    Championship, ChampionshipId, Match, MatchId, MatchProbability, Season, StandingEntry, Team,
};

/// Storage the engine reads seasons from and writes derived rows back to.
///
/// `save_standings` and `save_match_probabilities` replace every row of the
/// championship; they never merge with what was stored before.
pub trait Repository: Send + Sync {
    fn championship(&self, id: ChampionshipId) -> Result<Option<Championship>>;

    fn teams(&self, id: ChampionshipId) -> Result<Vec<Team>>;

    fn matches(&self, id: ChampionshipId) -> Result<Vec<Match>>;

    fn completed_matches(&self, id: ChampionshipId) -> Result<Vec<Match>> {
        Ok(self
            .matches(id)?
            .into_iter()
            .filter(Match::is_completed)
            .collect())
    }

    fn find_match(&self, id: MatchId) -> Result<Option<Match>>;

    fn standings(&self, id: ChampionshipId) -> Result<Vec<StandingEntry>>;

    fn match_probabilities(&self, id: ChampionshipId) -> Result<Vec<MatchProbability>>;

    fn save_standings(&self, id: ChampionshipId, rows: &[StandingEntry]) -> Result<()>;

    fn save_match_probabilities(&self, id: ChampionshipId, rows: &[MatchProbability]) -> Result<()>;

    /// Writes the results of one combined run. Stores that can should make
    /// both replacements visible together.
    fn save_probabilities(
        &self,
        id: ChampionshipId,
        standings: &[StandingEntry],
        matches: &[MatchProbability],
    ) -> Result<()> {
        self.save_match_probabilities(id, matches)?;
        self.save_standings(id, standings)
    }

    fn save_match(&self, m: &Match) -> Result<()>;

    fn delete_match_probability(&self, id: MatchId) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryStore {
    championships: BTreeMap<ChampionshipId, Championship>,
    teams: BTreeMap<ChampionshipId, Vec<Team>>,
    matches: BTreeMap<MatchId, Match>,
    standings: HashMap<ChampionshipId, Vec<StandingEntry>>,
    probabilities: BTreeMap<MatchId, MatchProbability>,
}

/// In-process repository, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_season(season: Season) -> Self {
        let mut store = MemoryStore::default();
        let id = season.championship.id;
        store.championships.insert(id, season.championship);
        store.teams.insert(id, season.teams);
        for m in season.matches {
            store.matches.insert(m.id, m);
        }
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn add_championship(&self, championship: Championship) -> Result<()> {
        let mut store = self.lock()?;
        store.teams.entry(championship.id).or_default();
        store.championships.insert(championship.id, championship);
        Ok(())
    }

    pub fn add_team(&self, championship_id: ChampionshipId, team: Team) -> Result<()> {
        let mut store = self.lock()?;
        let teams = store.teams.entry(championship_id).or_default();
        teams.retain(|t| t.id != team.id);
        teams.push(team);
        Ok(())
    }

    pub fn add_match(&self, m: Match) -> Result<()> {
        self.save_match(&m)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("memory repository lock poisoned"))
    }
}

impl Repository for MemoryRepository {
    fn championship(&self, id: ChampionshipId) -> Result<Option<Championship>> {
        Ok(self.lock()?.championships.get(&id).cloned())
    }

    fn teams(&self, id: ChampionshipId) -> Result<Vec<Team>> {
        Ok(self.lock()?.teams.get(&id).cloned().unwrap_or_default())
    }

    fn matches(&self, id: ChampionshipId) -> Result<Vec<Match>> {
        Ok(self
            .lock()?
            .matches
            .values()
            .filter(|m| m.championship_id == id)
            .cloned()
            .collect())
    }

    fn find_match(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.lock()?.matches.get(&id).cloned())
    }

    fn standings(&self, id: ChampionshipId) -> Result<Vec<StandingEntry>> {
        Ok(self.lock()?.standings.get(&id).cloned().unwrap_or_default())
    }

    fn match_probabilities(&self, id: ChampionshipId) -> Result<Vec<MatchProbability>> {
        Ok(self
            .lock()?
            .probabilities
            .values()
            .filter(|p| p.championship_id == id)
            .cloned()
            .collect())
    }

    fn save_standings(&self, id: ChampionshipId, rows: &[StandingEntry]) -> Result<()> {
        self.lock()?.standings.insert(id, rows.to_vec());
        Ok(())
    }

    fn save_match_probabilities(&self, id: ChampionshipId, rows: &[MatchProbability]) -> Result<()> {
        let mut store = self.lock()?;
        store.probabilities.retain(|_, p| p.championship_id != id);
        for row in rows {
            store.probabilities.insert(row.match_id, row.clone());
        }
        Ok(())
    }

    fn save_probabilities(
        &self,
        id: ChampionshipId,
        standings: &[StandingEntry],
        matches: &[MatchProbability],
    ) -> Result<()> {
        let mut store = self.lock()?;
        store.probabilities.retain(|_, p| p.championship_id != id);
        for row in matches {
            store.probabilities.insert(row.match_id, row.clone());
        }
        store.standings.insert(id, standings.to_vec());
        Ok(())
    }

    fn save_match(&self, m: &Match) -> Result<()> {
        self.lock()?.matches.insert(m.id, m.clone());
        Ok(())
    }

    fn delete_match_probability(&self, id: MatchId) -> Result<()> {
        self.lock()?.probabilities.remove(&id);
        Ok(())
    }
}
