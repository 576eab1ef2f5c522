use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::{IntegrityError, PeriodError};
use crate::model::{
    ChampionshipId, Match, MatchId, Outcome, Score, Season, StandingEntry, Team, TeamId,
};
use crate::scoring::{MatchResult, Points, PointsRule};

/// A completed match as the table saw it, kept for rating models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecidedResult {
    pub match_id: MatchId,
    pub scheduled_at: Option<NaiveDateTime>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct StandingsTable {
    championship_id: ChampionshipId,
    slots: HashMap<TeamId, usize>,
    rows: Vec<StandingEntry>,
    history: Vec<DecidedResult>,
}

impl StandingsTable {
    /// One zeroed row per team, in ascending team id order.
    pub fn new(championship_id: ChampionshipId, teams: &[Team]) -> Self {
        let mut ids: Vec<TeamId> = teams.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();

        let slots = ids.iter().enumerate().map(|(slot, id)| (*id, slot)).collect();
        let rows = ids
            .iter()
            .map(|id| StandingEntry::empty(championship_id, *id))
            .collect();
        Self {
            championship_id,
            slots,
            rows,
            history: Vec::new(),
        }
    }

    /// Validates every match of the season and folds the completed ones.
    pub fn build(season: &Season, rules: &dyn PointsRule) -> Result<Self, IntegrityError> {
        let mut table = Self::new(season.id(), &season.teams);
        for m in &season.matches {
            table.participants(m)?;
        }

        let mut completed: Vec<&Match> = season.matches.iter().filter(|m| m.is_completed()).collect();
        completed.sort_by_key(|m| m.id);
        for m in completed {
            table.record(m, rules)?;
        }
        Ok(table)
    }

    /// Folds one completed match into the table.
    pub fn record(&mut self, m: &Match, rules: &dyn PointsRule) -> Result<Points, IntegrityError> {
        let (home, away) = self.participants(m)?;
        let score = m
            .score
            .ok_or(IntegrityError::MissingScore { match_id: m.id })?;
        let result = MatchResult {
            score,
            periods: &m.periods,
        };
        let points = rules.points_for(&result).map_err(|err| match err {
            PeriodError::Empty => IntegrityError::MissingPeriods { match_id: m.id },
            source => IntegrityError::InvalidPeriods {
                match_id: m.id,
                source,
            },
        })?;

        apply_result(&mut self.rows, home, away, score, points);
        self.history.push(DecidedResult {
            match_id: m.id,
            scheduled_at: m.scheduled_at,
            home_team_id: m.home_team_id,
            away_team_id: m.away_team_id,
            outcome: points.outcome(),
        });
        Ok(points)
    }

    /// Row slots of both sides, or the integrity violation that rules them out.
    pub fn participants(&self, m: &Match) -> Result<(usize, usize), IntegrityError> {
        if m.home_team_id == m.away_team_id {
            return Err(IntegrityError::SameTeam {
                match_id: m.id,
                team_id: m.home_team_id,
            });
        }
        let slot = |team_id: TeamId| {
            self.slot(team_id).ok_or(IntegrityError::UnknownTeam {
                championship_id: self.championship_id,
                match_id: m.id,
                team_id,
            })
        };
        Ok((slot(m.home_team_id)?, slot(m.away_team_id)?))
    }

    pub fn slot(&self, team_id: TeamId) -> Option<usize> {
        self.slots.get(&team_id).copied()
    }

    pub fn championship_id(&self) -> ChampionshipId {
        self.championship_id
    }

    /// Rows in slot order (ascending team id), not ranked.
    pub fn rows(&self) -> &[StandingEntry] {
        &self.rows
    }

    pub fn history(&self) -> &[DecidedResult] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ranked(&self) -> Vec<StandingEntry> {
        let mut rows = self.rows.clone();
        // Stable: equal keys keep team id order.
        rows.sort_by(rank_order);
        rows
    }
}

/// Points, then wins, then goal difference, all descending.
pub fn rank_order(a: &StandingEntry, b: &StandingEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.won.cmp(&a.won))
        .then_with(|| b.goal_difference().cmp(&a.goal_difference()))
}

/// Slot of the row a stable `rank_order` sort would put first.
pub fn leader(rows: &[StandingEntry]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (slot, row) in rows.iter().enumerate() {
        match best {
            Some(b) if rank_order(row, &rows[b]) != Ordering::Less => {}
            _ => best = Some(slot),
        }
    }
    best
}

pub(crate) fn apply_result(
    rows: &mut [StandingEntry],
    home: usize,
    away: usize,
    score: Score,
    points: Points,
) {
    let outcome = points.outcome();

    let row = &mut rows[home];
    row.played = row.played.saturating_add(1);
    row.scored = row.scored.saturating_add(score.home);
    row.conceded = row.conceded.saturating_add(score.away);
    row.points = row.points.saturating_add(points.home);
    match outcome {
        Outcome::Home => row.won += 1,
        Outcome::Draw => row.drawn += 1,
        Outcome::Away => row.lost += 1,
    }

    let row = &mut rows[away];
    row.played = row.played.saturating_add(1);
    row.scored = row.scored.saturating_add(score.away);
    row.conceded = row.conceded.saturating_add(score.home);
    row.points = row.points.saturating_add(points.away);
    match outcome {
        Outcome::Home => row.lost += 1,
        Outcome::Draw => row.drawn += 1,
        Outcome::Away => row.won += 1,
    }
}

pub fn compute_standings(
    season: &Season,
    rules: &dyn PointsRule,
) -> Result<Vec<StandingEntry>, IntegrityError> {
    Ok(StandingsTable::build(season, rules)?.ranked())
}
