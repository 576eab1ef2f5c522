use league_engine::model::{
    Championship, Match, Period, PeriodOutcome, Score, ScoringVariant, Season, Team,
};
use league_engine::repository::Repository;
use league_engine::{Engine, EngineConfig, EngineError, IntegrityError, MemoryRepository};

fn team(id: u32, name: &str) -> Team {
    Team {
        id,
        name: name.to_string(),
        short_name: None,
    }
}

fn season(variant: ScoringVariant, teams: Vec<Team>, matches: Vec<Match>) -> Season {
    Season {
        championship: Championship {
            id: 1,
            name: "Serie Amatori".to_string(),
            variant,
            season_start: None,
            season_end: None,
        },
        teams,
        matches,
    }
}

fn engine(season: Season) -> Engine<MemoryRepository> {
    Engine::new(
        MemoryRepository::from_season(season),
        EngineConfig::default().with_trials(500).with_seed(7),
    )
}

#[test]
fn csi_single_win() {
    let engine = engine(season(
        ScoringVariant::Csi,
        vec![team(1, "A"), team(2, "B")],
        vec![Match::completed(10, 1, 1, 2, Score::new(2, 1))],
    ));

    let rows = engine.calculate_standings(1).unwrap();
    assert_eq!(rows.len(), 2);

    let a = &rows[0];
    assert_eq!(a.team_id, 1);
    assert_eq!((a.played, a.won, a.drawn, a.lost), (1, 1, 0, 0));
    assert_eq!((a.scored, a.conceded, a.points), (2, 1, 3));

    let b = &rows[1];
    assert_eq!(b.team_id, 2);
    assert_eq!((b.played, b.won, b.drawn, b.lost), (1, 0, 0, 1));
    assert_eq!((b.scored, b.conceded, b.points), (1, 2, 0));

    let stored = engine.repository().standings(1).unwrap();
    assert_eq!(stored, rows);
}

#[test]
fn csi_draw_gives_one_point_each() {
    let engine = engine(season(
        ScoringVariant::Csi,
        vec![team(1, "A"), team(2, "B")],
        vec![Match::completed(10, 1, 1, 2, Score::new(1, 1))],
    ));

    let rows = engine.calculate_standings(1).unwrap();
    assert!(rows.iter().all(|r| r.points == 1 && r.drawn == 1));
}

#[test]
fn recalculation_is_idempotent_and_replaces_rows() {
    let engine = engine(season(
        ScoringVariant::Csi,
        vec![team(1, "A"), team(2, "B"), team(3, "C")],
        vec![
            Match::completed(10, 1, 1, 2, Score::new(0, 3)),
            Match::completed(11, 1, 2, 3, Score::new(2, 2)),
            Match::scheduled(12, 1, 3, 1),
        ],
    ));

    let first = engine.calculate_standings(1).unwrap();
    let second = engine.calculate_standings(1).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.repository().standings(1).unwrap().len(), 3);

    let order: Vec<u32> = first.iter().map(|r| r.team_id).collect();
    assert_eq!(order, vec![2, 3, 1]);
}

#[test]
fn teams_without_matches_still_get_a_row() {
    let engine = engine(season(
        ScoringVariant::Csi,
        vec![team(1, "A"), team(2, "B"), team(3, "Idle")],
        vec![Match::completed(10, 1, 1, 2, Score::new(1, 0))],
    ));

    let rows = engine.calculate_standings(1).unwrap();
    let idle = rows.iter().find(|r| r.team_id == 3).unwrap();
    assert_eq!(idle.played, 0);
    assert_eq!(idle.points, 0);
    assert!(idle.win_probability.is_none());
}

#[test]
fn match_against_unknown_team_fails_without_writing() {
    let engine = engine(season(
        ScoringVariant::Csi,
        vec![team(1, "A"), team(2, "B")],
        vec![Match::completed(10, 1, 1, 99, Score::new(1, 0))],
    ));

    let err = engine.calculate_standings(1).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Integrity(IntegrityError::UnknownTeam { team_id: 99, .. })
    ));
    assert!(err.is_rejection());
    assert!(engine.repository().standings(1).unwrap().is_empty());
}

#[test]
fn unknown_championship_is_reported() {
    let engine = engine(season(ScoringVariant::Csi, vec![team(1, "A")], Vec::new()));
    assert!(matches!(
        engine.calculate_standings(42),
        Err(EngineError::ChampionshipNotFound(42))
    ));
}

#[test]
fn uisp_standings_score_periods_and_bonus() {
    let w = PeriodOutcome::Win;
    let d = PeriodOutcome::Draw;
    let l = PeriodOutcome::Loss;
    let engine = engine(season(
        ScoringVariant::Uisp,
        vec![team(1, "A"), team(2, "B")],
        vec![
            // One period each, A ahead on goals: 2 + bonus against 2.
            Match::completed(10, 1, 1, 2, Score::new(3, 2)).with_periods(vec![
                Period::new(1, w, l),
                Period::new(2, l, w),
                Period::new(3, d, d),
            ]),
            // B takes two periods outright.
            Match::completed(11, 1, 2, 1, Score::new(4, 1)).with_periods(vec![
                Period::new(1, w, l),
                Period::new(2, w, l),
                Period::new(3, d, d),
            ]),
        ],
    ));

    let rows = engine.calculate_standings(1).unwrap();
    let a = rows.iter().find(|r| r.team_id == 1).unwrap();
    let b = rows.iter().find(|r| r.team_id == 2).unwrap();

    assert_eq!(a.points, 3);
    assert_eq!(b.points, 6);
    assert_eq!((a.won, a.lost), (1, 1));
    assert_eq!((b.won, b.lost), (1, 1));
    assert_eq!(rows[0].team_id, 2);
}

#[test]
fn uisp_completed_match_without_periods_is_an_integrity_failure() {
    let engine = engine(season(
        ScoringVariant::Uisp,
        vec![team(1, "A"), team(2, "B")],
        vec![Match::completed(10, 1, 1, 2, Score::new(1, 0))],
    ));

    assert!(matches!(
        engine.calculate_standings(1),
        Err(EngineError::Integrity(IntegrityError::MissingPeriods { match_id: 10 }))
    ));
}
