use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Outcome, TeamId};
use crate::standings::{DecidedResult, StandingsTable};

/// Per-team outcome rates fed to the simulator. Components sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strength {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl Strength {
    pub fn uniform() -> Self {
        Self {
            win: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            loss: 1.0 / 3.0,
        }
    }

    /// Add-one smoothed rates, so an unplayed team sits at a third each.
    pub fn from_record(won: u32, drawn: u32, lost: u32) -> Self {
        let n = f64::from(won) + f64::from(drawn) + f64::from(lost) + 3.0;
        Self {
            win: (f64::from(won) + 1.0) / n,
            draw: (f64::from(drawn) + 1.0) / n,
            loss: (f64::from(lost) + 1.0) / n,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthModel {
    #[default]
    FormRates,
    Elo,
}

impl StrengthModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rates" | "form" | "form_rates" => Some(StrengthModel::FormRates),
            "elo" => Some(StrengthModel::Elo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    pub k: f64,
    pub initial: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k: 20.0,
            initial: 1500.0,
        }
    }
}

pub fn estimate(table: &StandingsTable, model: StrengthModel) -> HashMap<TeamId, Strength> {
    match model {
        StrengthModel::FormRates => form_rates(table),
        StrengthModel::Elo => elo_strengths(table, EloConfig::default()),
    }
}

pub fn form_rates(table: &StandingsTable) -> HashMap<TeamId, Strength> {
    table
        .rows()
        .iter()
        .map(|row| (row.team_id, Strength::from_record(row.won, row.drawn, row.lost)))
        .collect()
}

/// Replays decided results in kick-off order. No home advantage is applied.
pub fn elo_ratings(table: &StandingsTable, cfg: EloConfig) -> HashMap<TeamId, f64> {
    let mut results: Vec<&DecidedResult> = table.history().iter().collect();
    results.sort_by(|a, b| {
        a.scheduled_at
            .cmp(&b.scheduled_at)
            .then(a.match_id.cmp(&b.match_id))
    });

    let mut elo: HashMap<TeamId, f64> = table
        .rows()
        .iter()
        .map(|row| (row.team_id, cfg.initial))
        .collect();
    for r in results {
        let eh = *elo.entry(r.home_team_id).or_insert(cfg.initial);
        let ea = *elo.entry(r.away_team_id).or_insert(cfg.initial);

        let expected_home = expected_score(eh, ea);
        let s_home = match r.outcome {
            Outcome::Home => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Away => 0.0,
        };

        let delta = cfg.k * (s_home - expected_home);
        elo.insert(r.home_team_id, eh + delta);
        elo.insert(r.away_team_id, ea - delta);
    }
    elo
}

/// Expected score against an average-rated side, split by the league draw rate.
pub fn elo_strengths(table: &StandingsTable, cfg: EloConfig) -> HashMap<TeamId, Strength> {
    let decided = table.history().len() as f64;
    let draws = table
        .history()
        .iter()
        .filter(|r| r.outcome == Outcome::Draw)
        .count() as f64;
    let draw_rate = (draws + 1.0) / (decided + 3.0);

    elo_ratings(table, cfg)
        .into_iter()
        .map(|(team_id, rating)| {
            let e = expected_score(rating, cfg.initial);
            let strength = Strength {
                win: e * (1.0 - draw_rate),
                draw: draw_rate,
                loss: (1.0 - e) * (1.0 - draw_rate),
            };
            (team_id, strength)
        })
        .collect()
}

fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}
