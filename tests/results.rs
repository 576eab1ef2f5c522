use league_engine::error::PeriodError;
use league_engine::model::{
    Championship, Match, MatchStatus, Period, PeriodOutcome, Score, ScoringVariant, Season, Team,
};
use league_engine::repository::Repository;
use league_engine::{Engine, EngineConfig, EngineError, MemoryRepository};

const W: PeriodOutcome = PeriodOutcome::Win;
const D: PeriodOutcome = PeriodOutcome::Draw;
const L: PeriodOutcome = PeriodOutcome::Loss;

fn engine(variant: ScoringVariant) -> Engine<MemoryRepository> {
    let season = Season {
        championship: Championship {
            id: 2,
            name: "Torneo Primavera".to_string(),
            variant,
            season_start: None,
            season_end: None,
        },
        teams: vec![
            Team {
                id: 1,
                name: "Aurora".to_string(),
                short_name: Some("AUR".to_string()),
            },
            Team {
                id: 2,
                name: "Borgo".to_string(),
                short_name: None,
            },
        ],
        matches: vec![
            Match::completed(20, 2, 1, 2, Score::new(1, 1)).with_periods(vec![
                Period::new(1, D, D),
                Period::new(2, W, L),
                Period::new(3, L, W),
            ]),
            Match::scheduled(21, 2, 2, 1),
            Match::scheduled(22, 2, 1, 2),
        ],
    };
    Engine::new(
        MemoryRepository::from_season(season),
        EngineConfig::default().with_trials(300).with_seed(1),
    )
}

#[test]
fn uisp_result_completes_the_match() {
    let engine = engine(ScoringVariant::Uisp);
    let periods = vec![Period::new(1, W, L), Period::new(2, D, D), Period::new(3, W, L)];

    let m = engine.set_uisp_result(21, periods.clone(), 4, 1).unwrap();
    assert_eq!(m.status, MatchStatus::Completed);
    assert_eq!(m.score, Some(Score::new(4, 1)));
    assert_eq!(m.periods, periods);

    let stored = engine.repository().find_match(21).unwrap().unwrap();
    assert_eq!(stored, m);

    // Standings only change when recalculated.
    assert!(engine.repository().standings(2).unwrap().is_empty());
    let rows = engine.calculate_standings(2).unwrap();
    let borgo = rows.iter().find(|r| r.team_id == 2).unwrap();
    assert_eq!(borgo.played, 2);
    assert_eq!(borgo.points, 2 + 4);
}

#[test]
fn inconsistent_periods_are_rejected_and_nothing_changes() {
    let engine = engine(ScoringVariant::Uisp);
    let before = engine.repository().find_match(21).unwrap().unwrap();

    let err = engine
        .set_uisp_result(21, vec![Period::new(1, W, W)], 1, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidResult {
            match_id: 21,
            source: PeriodError::NotComplementary { index: 1, .. }
        }
    ));
    assert!(err.is_rejection());

    let err = engine.set_uisp_result(21, Vec::new(), 1, 0).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidResult {
            source: PeriodError::Empty,
            ..
        }
    ));

    let err = engine
        .set_uisp_result(21, vec![Period::new(2, W, L), Period::new(1, L, W)], 1, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidResult {
            source: PeriodError::OutOfOrder { .. },
            ..
        }
    ));

    assert_eq!(engine.repository().find_match(21).unwrap().unwrap(), before);
}

#[test]
fn results_only_apply_to_scheduled_matches() {
    let engine = engine(ScoringVariant::Uisp);
    let err = engine
        .set_uisp_result(20, vec![Period::new(1, W, L)], 1, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::NotScheduled {
            match_id: 20,
            status: MatchStatus::Completed
        }
    ));

    engine.cancel_match(22).unwrap();
    assert!(matches!(
        engine.postpone_match(22),
        Err(EngineError::NotScheduled {
            status: MatchStatus::Cancelled,
            ..
        })
    ));
}

#[test]
fn result_entry_checks_the_scoring_variant() {
    let uisp = engine(ScoringVariant::Uisp);
    assert!(matches!(
        uisp.set_result(21, 2, 0),
        Err(EngineError::WrongVariant {
            match_id: 21,
            variant: ScoringVariant::Uisp
        })
    ));

    let csi = engine(ScoringVariant::Csi);
    assert!(matches!(
        csi.set_uisp_result(21, vec![Period::new(1, W, L)], 1, 0),
        Err(EngineError::WrongVariant {
            variant: ScoringVariant::Csi,
            ..
        })
    ));
    let m = csi.set_result(21, 2, 0).unwrap();
    assert_eq!(m.status, MatchStatus::Completed);
    assert!(m.periods.is_empty());
}

#[test]
fn unknown_match_is_reported() {
    let engine = engine(ScoringVariant::Csi);
    assert!(matches!(
        engine.cancel_match(999),
        Err(EngineError::MatchNotFound(999))
    ));
}

#[test]
fn postponing_and_cancelling_drop_fixture_odds() {
    let engine = engine(ScoringVariant::Uisp);
    let rows = engine.calculate_match_probabilities(2).unwrap();
    assert_eq!(rows.len(), 2);

    let m = engine.postpone_match(21).unwrap();
    assert_eq!(m.status, MatchStatus::Postponed);
    let left: Vec<u32> = engine
        .repository()
        .match_probabilities(2)
        .unwrap()
        .iter()
        .map(|r| r.match_id)
        .collect();
    assert_eq!(left, vec![22]);

    engine.cancel_match(22).unwrap();
    assert!(engine.repository().match_probabilities(2).unwrap().is_empty());

    // Neither match is simulated any more.
    assert!(engine.calculate_match_probabilities(2).unwrap().is_empty());
}

#[test]
fn postponed_matches_do_not_count_in_standings() {
    let engine = engine(ScoringVariant::Uisp);
    engine.postpone_match(21).unwrap();
    let rows = engine.calculate_standings(2).unwrap();
    assert!(rows.iter().all(|r| r.played == 1));
}
