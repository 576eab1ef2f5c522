use std::path::Path;

use league_engine::import::import_season_file;
use league_engine::model::{MatchStatus, Period, PeriodOutcome, ScoringVariant};
use league_engine::repository::Repository;
use league_engine::{Engine, EngineConfig, EngineError, SqliteRepository};

fn demo(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn csi_season_end_to_end_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested").join("league.sqlite");

    {
        let repo = SqliteRepository::open(&db).unwrap();
        let season = import_season_file(&repo, &demo("season.json")).unwrap();
        assert_eq!(season.championship.variant, ScoringVariant::Csi);
        assert_eq!(season.matches.len(), 8);
    }

    let repo = SqliteRepository::open(&db).unwrap();
    let engine = Engine::new(repo, EngineConfig::default().with_trials(800).with_seed(21));

    let standings = engine.calculate_standings(1).unwrap();
    let order: Vec<u32> = standings.iter().map(|r| r.team_id).collect();
    // AUR 4 pts, BOR 3 (one win), DUO 2, CAS 1.
    assert_eq!(order, vec![1, 2, 4, 3]);

    let odds = engine.calculate_win_probabilities(1).unwrap();
    let sum: f64 = odds.iter().filter_map(|r| r.win_probability).sum();
    assert!((sum - 100.0).abs() < 1e-6);
    assert_eq!(engine.repository().standings(1).unwrap(), odds);

    let fixtures = engine.calculate_match_probabilities(1).unwrap();
    assert_eq!(fixtures.len(), 4);

    engine.set_result(105, 1, 0).unwrap();
    engine.postpone_match(108).unwrap();
    let stored: Vec<u32> = engine
        .repository()
        .match_probabilities(1)
        .unwrap()
        .iter()
        .map(|p| p.match_id)
        .collect();
    assert_eq!(stored, vec![106, 107]);

    assert!(matches!(
        engine.calculate_win_probabilities(1),
        Err(EngineError::StandingsStale(1))
    ));
    let standings = engine.calculate_standings(1).unwrap();
    assert_eq!(standings[0].team_id, 1);
    assert_eq!(standings[0].points, 7);
}

#[test]
fn uisp_result_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("league.sqlite");

    {
        let repo = SqliteRepository::open(&db).unwrap();
        import_season_file(&repo, &demo("uisp_season.json")).unwrap();
        let engine = Engine::new(repo, EngineConfig::default().with_trials(100).with_seed(2));
        let periods = vec![
            Period::new(1, PeriodOutcome::Draw, PeriodOutcome::Draw),
            Period::new(2, PeriodOutcome::Draw, PeriodOutcome::Draw),
            Period::new(3, PeriodOutcome::Win, PeriodOutcome::Loss),
        ];
        engine.set_uisp_result(202, periods, 2, 1).unwrap();
    }

    let repo = SqliteRepository::open(&db).unwrap();
    let m = repo.find_match(202).unwrap().unwrap();
    assert_eq!(m.status, MatchStatus::Completed);
    assert_eq!(m.periods.len(), 3);
    assert_eq!(m.periods[2].home, PeriodOutcome::Win);

    let engine = Engine::new(repo, EngineConfig::default().with_trials(100).with_seed(2));
    let rows = engine.calculate_standings(2).unwrap();
    let points: Vec<(u32, u32)> = rows.iter().map(|r| (r.team_id, r.points)).collect();
    // Vela Rossa 3 (period each, bonus on goals), Porta Romana 2 + 2, Navigli 0.
    assert_eq!(points, vec![(12, 4), (11, 3), (13, 0)]);
}
