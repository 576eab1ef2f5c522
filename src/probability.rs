use chrono::{DateTime, Utc};

use crate::model::{ChampionshipId, MatchProbability, StandingEntry};
use crate::simulation::SimulationReport;

fn percent(count: u32, trials: u32) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    f64::from(count) / f64::from(trials) * 100.0
}

/// Writes title odds onto every row, including teams that never finished first.
pub fn apply_championship_probabilities(report: &SimulationReport, rows: &mut [StandingEntry]) {
    for row in rows.iter_mut() {
        row.win_probability = Some(percent(report.titles_for(row.team_id), report.trials));
    }
}

/// One row per simulated fixture. Draws stay implicit.
pub fn match_probabilities(
    report: &SimulationReport,
    championship_id: ChampionshipId,
    calculated_at: DateTime<Utc>,
) -> Vec<MatchProbability> {
    report
        .fixtures
        .iter()
        .map(|(match_id, tally)| MatchProbability {
            match_id: *match_id,
            championship_id,
            home_win_probability: percent(tally.home, report.trials),
            away_win_probability: percent(tally.away, report.trials),
            calculated_at,
        })
        .collect()
}
