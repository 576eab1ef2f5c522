use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;

use crate::error::{IntegrityError, SimulationError};
use crate::model::{MatchId, Outcome, Period, Score, ScoringVariant, Season, TeamId};
use crate::scoring::{MatchResult, PointsRule};
use crate::standings::{StandingsTable, apply_result, leader};
use crate::strength::Strength;

pub const DEFAULT_TRIALS: u32 = 10_000;
pub const DEFAULT_CHUNK_SIZE: u32 = 250;
pub const DEFAULT_UISP_PERIODS: u8 = 3;

// Scoreline model for simulated fixtures.
const BASE_GOALS: f64 = 1.10;
const WINNING_MARGIN_EXTRA: f64 = 0.60;
const MAX_GOALS: u32 = 10;

/// Home/draw/away probabilities for one fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn mirrored(self) -> Self {
        Self {
            home: self.away,
            draw: self.draw,
            away: self.home,
        }
    }

    /// Maps a uniform draw in [0, 1) onto an outcome.
    pub fn pick(&self, u: f64) -> Outcome {
        if u < self.home {
            Outcome::Home
        } else if u < self.home + self.draw {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }
}

/// Each outcome is weighted by one side's rate plus the other side's
/// complementary rate, so swapping home and away mirrors the result.
pub fn blend(home: &Strength, away: &Strength) -> Prob3 {
    let h = home.win + away.loss;
    let d = home.draw + away.draw;
    let a = home.loss + away.win;
    let sum = h + d + a;
    if sum <= 0.0 || !sum.is_finite() {
        return Prob3::uniform();
    }
    Prob3 {
        home: h / sum,
        draw: d / sum,
        away: a / sum,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub home: u32,
    pub draw: u32,
    pub away: u32,
}

impl OutcomeTally {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Home => self.home += 1,
            Outcome::Draw => self.draw += 1,
            Outcome::Away => self.away += 1,
        }
    }

    fn merge(&mut self, other: &OutcomeTally) {
        self.home += other.home;
        self.draw += other.draw;
        self.away += other.away;
    }

    pub fn total(&self) -> u32 {
        self.home + self.draw + self.away
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub trials: u32,
    pub chunk_size: u32,
    // Used when no completed match shows how many periods are played.
    pub uisp_periods: u8,
    pub deadline: Option<Instant>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            uisp_periods: DEFAULT_UISP_PERIODS,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub trials: u32,
    /// Title count per team, in table slot order.
    pub titles: Vec<(TeamId, u32)>,
    /// Outcome counts per scheduled fixture, in match id order.
    pub fixtures: Vec<(MatchId, OutcomeTally)>,
}

impl SimulationReport {
    pub fn titles_for(&self, team_id: TeamId) -> u32 {
        self.titles
            .iter()
            .find(|(id, _)| *id == team_id)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn fixture(&self, match_id: MatchId) -> Option<OutcomeTally> {
        self.fixtures
            .iter()
            .find(|(id, _)| *id == match_id)
            .map(|(_, t)| *t)
    }
}

#[derive(Debug, Clone)]
struct Fixture {
    match_id: MatchId,
    home: usize,
    away: usize,
    probs: Prob3,
}

#[derive(Debug, Clone)]
struct Tally {
    trials: u32,
    titles: Vec<u32>,
    fixtures: Vec<OutcomeTally>,
}

impl Tally {
    fn new(teams: usize, fixtures: usize) -> Self {
        Self {
            trials: 0,
            titles: vec![0; teams],
            fixtures: vec![OutcomeTally::default(); fixtures],
        }
    }

    fn merge(&mut self, other: &Tally) {
        self.trials += other.trials;
        for (mine, theirs) in self.titles.iter_mut().zip(&other.titles) {
            *mine += theirs;
        }
        for (mine, theirs) in self.fixtures.iter_mut().zip(&other.fixtures) {
            mine.merge(theirs);
        }
    }
}

/// Inverse-CDF sampler over a truncated Poisson distribution.
#[derive(Debug, Clone)]
struct PoissonTable {
    cdf: Vec<f64>,
}

impl PoissonTable {
    fn new(lambda: f64, max_k: u32) -> Self {
        let mut acc = 0.0;
        let cdf = poisson_pmf(lambda, max_k)
            .into_iter()
            .map(|p| {
                acc += p;
                acc
            })
            .collect();
        Self { cdf }
    }

    fn sample(&self, u: f64) -> u32 {
        let k = self
            .cdf
            .iter()
            .position(|c| u < *c)
            .unwrap_or(self.cdf.len().saturating_sub(1));
        k as u32
    }
}

fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let mut out = vec![0.0; max_k + 1];
    let lambda = lambda.max(0.0);

    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    // Fold the truncated tail into the last bucket.
    let sum: f64 = out.iter().sum();
    if sum < 1.0 {
        out[max_k] += 1.0 - sum;
    }
    out
}

pub struct Simulator<'a> {
    baseline: &'a StandingsTable,
    rules: &'a dyn PointsRule,
    fixtures: Vec<Fixture>,
    periods: u8,
    goals: PoissonTable,
    margin: PoissonTable,
    config: SimulationConfig,
}

impl<'a> Simulator<'a> {
    /// Prepares every scheduled fixture of the season against the baseline
    /// table built from its completed matches.
    pub fn new(
        season: &Season,
        baseline: &'a StandingsTable,
        strengths: &HashMap<TeamId, Strength>,
        rules: &'a dyn PointsRule,
        config: SimulationConfig,
    ) -> Result<Self, IntegrityError> {
        let mut scheduled: Vec<_> = season.scheduled_matches().collect();
        scheduled.sort_by_key(|m| m.id);

        let mut fixtures = Vec::with_capacity(scheduled.len());
        for m in scheduled {
            let (home, away) = baseline.participants(m)?;
            let strength_of = |team_id: TeamId| {
                strengths
                    .get(&team_id)
                    .copied()
                    .unwrap_or_else(Strength::uniform)
            };
            fixtures.push(Fixture {
                match_id: m.id,
                home,
                away,
                probs: blend(&strength_of(m.home_team_id), &strength_of(m.away_team_id)),
            });
        }

        let periods = match rules.variant() {
            ScoringVariant::Csi => 0,
            ScoringVariant::Uisp => played_period_count(season).unwrap_or(config.uisp_periods).max(1),
        };
        let goals_lambda = if periods == 0 {
            BASE_GOALS
        } else {
            BASE_GOALS / f64::from(periods)
        };

        Ok(Self {
            baseline,
            rules,
            fixtures,
            periods,
            goals: PoissonTable::new(goals_lambda, MAX_GOALS),
            margin: PoissonTable::new(WINNING_MARGIN_EXTRA, MAX_GOALS),
            config,
        })
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Blended outcome probabilities used for each scheduled fixture.
    pub fn fixture_odds(&self) -> Vec<(MatchId, Prob3)> {
        self.fixtures.iter().map(|f| (f.match_id, f.probs)).collect()
    }

    /// Runs the configured number of trials. Chunk seeds are drawn from `rng`
    /// in order, so a seeded source gives the same tallies on any thread count.
    pub fn run<R: RngCore + ?Sized>(&self, rng: &mut R) -> Result<SimulationReport, SimulationError> {
        let chunk = self.config.chunk_size.max(1);
        let mut plan = Vec::new();
        let mut remaining = self.config.trials;
        while remaining > 0 {
            let n = remaining.min(chunk);
            plan.push((rng.next_u64(), n));
            remaining -= n;
        }

        let deadline = self.config.deadline;
        let partials: Vec<Option<Tally>> = plan
            .par_iter()
            .map(|&(seed, trials)| {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return None;
                }
                let mut chunk_rng = StdRng::seed_from_u64(seed);
                Some(self.run_chunk(&mut chunk_rng, trials))
            })
            .collect();

        let mut total = Tally::new(self.baseline.len(), self.fixtures.len());
        let mut abandoned = false;
        for partial in partials {
            match partial {
                Some(tally) => total.merge(&tally),
                None => abandoned = true,
            }
        }
        if abandoned {
            return Err(SimulationError::DeadlineExceeded {
                completed: total.trials,
                requested: self.config.trials,
            });
        }

        log::debug!(
            "championship {}: {} trials over {} fixtures in {} chunks",
            self.baseline.championship_id(),
            total.trials,
            self.fixtures.len(),
            plan.len()
        );
        Ok(self.report(total))
    }

    fn run_chunk(&self, rng: &mut StdRng, trials: u32) -> Tally {
        let mut tally = Tally::new(self.baseline.len(), self.fixtures.len());
        let mut periods = Vec::with_capacity(usize::from(self.periods));

        for _ in 0..trials {
            let mut rows = self.baseline.rows().to_vec();
            for (i, fixture) in self.fixtures.iter().enumerate() {
                let score = self.play(fixture, rng, &mut periods);
                let points = self.rules.award(&MatchResult {
                    score,
                    periods: &periods,
                });
                apply_result(&mut rows, fixture.home, fixture.away, score, points);
                tally.fixtures[i].record(points.outcome());
            }
            if let Some(first) = leader(&rows) {
                tally.titles[first] += 1;
            }
            tally.trials += 1;
        }
        tally
    }

    /// Draws one fixture. UISP fixtures are drawn period by period into `periods`.
    fn play(&self, fixture: &Fixture, rng: &mut StdRng, periods: &mut Vec<Period>) -> Score {
        periods.clear();
        if self.periods == 0 {
            let outcome = fixture.probs.pick(rng.gen_range(0.0..1.0));
            return self.scoreline(outcome, rng);
        }

        let mut total = Score::default();
        for index in 1..=self.periods {
            let outcome = fixture.probs.pick(rng.gen_range(0.0..1.0));
            let score = self.scoreline(outcome, rng);
            total.home += score.home;
            total.away += score.away;
            periods.push(Period::decided(index, outcome, Some(score)));
        }
        total
    }

    fn scoreline(&self, outcome: Outcome, rng: &mut StdRng) -> Score {
        let base = self.goals.sample(rng.gen_range(0.0..1.0));
        match outcome {
            Outcome::Draw => Score::new(base, base),
            Outcome::Home => {
                let margin = 1 + self.margin.sample(rng.gen_range(0.0..1.0));
                Score::new(base + margin, base)
            }
            Outcome::Away => {
                let margin = 1 + self.margin.sample(rng.gen_range(0.0..1.0));
                Score::new(base, base + margin)
            }
        }
    }

    fn report(&self, tally: Tally) -> SimulationReport {
        SimulationReport {
            trials: tally.trials,
            titles: self
                .baseline
                .rows()
                .iter()
                .zip(tally.titles)
                .map(|(row, n)| (row.team_id, n))
                .collect(),
            fixtures: self
                .fixtures
                .iter()
                .zip(tally.fixtures)
                .map(|(f, t)| (f.match_id, t))
                .collect(),
        }
    }
}

/// Most common period count among completed matches, ties to the larger count.
fn played_period_count(season: &Season) -> Option<u8> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for m in season.matches.iter().filter(|m| m.is_completed()) {
        if !m.periods.is_empty() {
            *counts.entry(m.periods.len()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(len, n)| (*n, *len))
        .and_then(|(len, _)| u8::try_from(len).ok())
}
