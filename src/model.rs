use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ChampionshipId = u32;
pub type TeamId = u32;
pub type MatchId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringVariant {
    #[serde(rename = "CSI")]
    Csi,
    #[serde(rename = "UISP")]
    Uisp,
}

impl ScoringVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoringVariant::Csi => "CSI",
            ScoringVariant::Uisp => "UISP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CSI" => Some(ScoringVariant::Csi),
            "UISP" => Some(ScoringVariant::Uisp),
            _ => None,
        }
    }
}

impl fmt::Display for ScoringVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Championship {
    pub id: ChampionshipId,
    pub name: String,
    pub variant: ScoringVariant,
    #[serde(default)]
    pub season_start: Option<NaiveDate>,
    #[serde(default)]
    pub season_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Completed,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(MatchStatus::Scheduled),
            "completed" => Some(MatchStatus::Completed),
            "postponed" => Some(MatchStatus::Postponed),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    /// Only scheduled matches move to another state.
    pub fn is_terminal(self) -> bool {
        self != MatchStatus::Scheduled
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodOutcome {
    Win,
    Draw,
    Loss,
}

impl PeriodOutcome {
    pub fn opposite(self) -> Self {
        match self {
            PeriodOutcome::Win => PeriodOutcome::Loss,
            PeriodOutcome::Draw => PeriodOutcome::Draw,
            PeriodOutcome::Loss => PeriodOutcome::Win,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodOutcome::Win => "win",
            PeriodOutcome::Draw => "draw",
            PeriodOutcome::Loss => "loss",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "win" | "w" => Some(PeriodOutcome::Win),
            "draw" | "d" => Some(PeriodOutcome::Draw),
            "loss" | "l" => Some(PeriodOutcome::Loss),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored segment of a UISP match, outcomes seen from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub index: u8,
    pub home: PeriodOutcome,
    pub away: PeriodOutcome,
    #[serde(default)]
    pub score: Option<Score>,
}

impl Period {
    pub fn new(index: u8, home: PeriodOutcome, away: PeriodOutcome) -> Self {
        Self {
            index,
            home,
            away,
            score: None,
        }
    }

    /// Builds a complementary period from the home side's point of view.
    pub fn decided(index: u8, outcome: Outcome, score: Option<Score>) -> Self {
        let home = match outcome {
            Outcome::Home => PeriodOutcome::Win,
            Outcome::Draw => PeriodOutcome::Draw,
            Outcome::Away => PeriodOutcome::Loss,
        };
        Self {
            index,
            home,
            away: home.opposite(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    #[serde(default)]
    pub championship_id: ChampionshipId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    #[serde(default)]
    pub scheduled_at: Option<NaiveDateTime>,
    pub status: MatchStatus,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub periods: Vec<Period>,
}

impl Match {
    pub fn scheduled(
        id: MatchId,
        championship_id: ChampionshipId,
        home_team_id: TeamId,
        away_team_id: TeamId,
    ) -> Self {
        Self {
            id,
            championship_id,
            home_team_id,
            away_team_id,
            scheduled_at: None,
            status: MatchStatus::Scheduled,
            score: None,
            periods: Vec::new(),
        }
    }

    pub fn completed(
        id: MatchId,
        championship_id: ChampionshipId,
        home_team_id: TeamId,
        away_team_id: TeamId,
        score: Score,
    ) -> Self {
        Self {
            status: MatchStatus::Completed,
            score: Some(score),
            ..Self::scheduled(id, championship_id, home_team_id, away_team_id)
        }
    }

    pub fn with_periods(mut self, periods: Vec<Period>) -> Self {
        self.periods = periods;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == MatchStatus::Scheduled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn classify(home: u32, away: u32) -> Self {
        if home > away {
            Outcome::Home
        } else if home < away {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }
}

/// Snapshot of everything one operation reads for a championship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub championship: Championship,
    pub teams: Vec<Team>,
    pub matches: Vec<Match>,
}

impl Season {
    pub fn id(&self) -> ChampionshipId {
        self.championship.id
    }

    pub fn scheduled_matches(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.is_scheduled())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub championship_id: ChampionshipId,
    pub team_id: TeamId,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub scored: u32,
    pub conceded: u32,
    pub points: u32,
    // Percent, unset until a simulation has run.
    pub win_probability: Option<f64>,
}

impl StandingEntry {
    pub fn empty(championship_id: ChampionshipId, team_id: TeamId) -> Self {
        Self {
            championship_id,
            team_id,
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            scored: 0,
            conceded: 0,
            points: 0,
            win_probability: None,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.scored) - i64::from(self.conceded)
    }

    /// Same counters, ignoring the derived win probability.
    pub fn same_record(&self, other: &StandingEntry) -> bool {
        self.championship_id == other.championship_id
            && self.team_id == other.team_id
            && self.played == other.played
            && self.won == other.won
            && self.drawn == other.drawn
            && self.lost == other.lost
            && self.scored == other.scored
            && self.conceded == other.conceded
            && self.points == other.points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProbability {
    pub match_id: MatchId,
    pub championship_id: ChampionshipId,
    pub home_win_probability: f64,
    pub away_win_probability: f64,
    pub calculated_at: DateTime<Utc>,
}

impl MatchProbability {
    pub fn draw_probability(&self) -> f64 {
        (100.0 - self.home_win_probability - self.away_win_probability).max(0.0)
    }
}
