use thiserror::Error;

use crate::model::{
    ChampionshipId, MatchId, MatchStatus, PeriodOutcome, ScoringVariant, TeamId,
};

/// A period payload that cannot be scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("no periods recorded")]
    Empty,
    #[error("period {index} follows period {previous}; indices must increase")]
    OutOfOrder { index: u8, previous: u8 },
    #[error("period {index}: home {home} and away {away} are not complementary")]
    NotComplementary {
        index: u8,
        home: PeriodOutcome,
        away: PeriodOutcome,
    },
    #[error("period {index}: score {home_goals}-{away_goals} contradicts home {outcome}")]
    ScoreMismatch {
        index: u8,
        outcome: PeriodOutcome,
        home_goals: u32,
        away_goals: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("match {match_id} references team {team_id}, which is not part of championship {championship_id}")]
    UnknownTeam {
        championship_id: ChampionshipId,
        match_id: MatchId,
        team_id: TeamId,
    },
    #[error("match {match_id} has team {team_id} on both sides")]
    SameTeam { match_id: MatchId, team_id: TeamId },
    #[error("match {match_id} is completed but has no final score")]
    MissingScore { match_id: MatchId },
    #[error("match {match_id} is completed under UISP rules but has no periods")]
    MissingPeriods { match_id: MatchId },
    #[error("match {match_id} has inconsistent periods: {source}")]
    InvalidPeriods {
        match_id: MatchId,
        #[source]
        source: PeriodError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("simulation deadline passed after {completed} of {requested} trials")]
    DeadlineExceeded { completed: u32, requested: u32 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("championship {0} not found")]
    ChampionshipNotFound(ChampionshipId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("result for match {match_id} rejected: {source}")]
    InvalidResult {
        match_id: MatchId,
        #[source]
        source: PeriodError,
    },
    #[error("match {match_id} is {status}; only scheduled matches can change state")]
    NotScheduled { match_id: MatchId, status: MatchStatus },
    #[error("match {match_id} belongs to a {variant} championship")]
    WrongVariant {
        match_id: MatchId,
        variant: ScoringVariant,
    },
    #[error("championship {0} has no standings; calculate standings first")]
    StandingsMissing(ChampionshipId),
    #[error("standings for championship {0} are out of date; calculate standings first")]
    StandingsStale(ChampionshipId),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

impl EngineError {
    /// Business-rule rejections, as opposed to faults in the storage layer.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EngineError::Repository(_))
    }
}
