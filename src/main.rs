use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};

use league_engine::config::default_db_path;
use league_engine::import::import_season_file;
use league_engine::model::{MatchProbability, Period, PeriodOutcome, StandingEntry, Team};
use league_engine::{Engine, EngineConfig, EngineError, Repository, SqliteRepository};

const USAGE: &str = "\
usage: league_engine [--db <path>] [--json] <command>

commands:
  import <season.json>
  standings <championship>
  win-probabilities <championship>
  match-probabilities <championship>
  refresh <championship>
  result <match> <home> <away>
  uisp-result <match> <home> <away> <W-L,D-D,...>
  postpone <match>
  cancel <match>";

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = take_db_path_arg(&mut args)
        .or_else(default_db_path)
        .context("unable to resolve sqlite path")?;
    let json = take_flag(&mut args, "--json");

    let Some((command, rest)) = args.split_first() else {
        return Err(anyhow!("missing command\n{USAGE}"));
    };

    let repo = SqliteRepository::open(&db_path)?;
    if command == "import" {
        let path = rest.first().context("import needs a season file")?;
        return import(&repo, Path::new(path));
    }

    let engine = Engine::new(repo, EngineConfig::from_env());
    match command.as_str() {
        "standings" => {
            let id = parse_id(rest.first(), "championship")?;
            let rows = engine.calculate_standings(id)?;
            if json {
                print_json(&rows)?;
            } else {
                print_standings(&engine, id, &rows)?;
            }
        }
        "win-probabilities" => {
            let id = parse_id(rest.first(), "championship")?;
            let rows = engine.calculate_win_probabilities(id)?;
            if json {
                print_json(&rows)?;
            } else {
                print_standings(&engine, id, &rows)?;
            }
        }
        "match-probabilities" => {
            let id = parse_id(rest.first(), "championship")?;
            let rows = engine.calculate_match_probabilities(id)?;
            if json {
                print_json(&rows)?;
            } else {
                print_fixtures(&engine, id, &rows)?;
            }
        }
        "refresh" => {
            let id = parse_id(rest.first(), "championship")?;
            let run = engine.calculate_probabilities(id)?;
            if json {
                print_json(&serde_json::json!({
                    "standings": run.standings,
                    "matches": run.matches,
                }))?;
            } else {
                print_standings(&engine, id, &run.standings)?;
                println!();
                print_fixtures(&engine, id, &run.matches)?;
            }
        }
        "result" => {
            let match_id = parse_id(rest.first(), "match")?;
            let home = parse_goals(rest.get(1), "home")?;
            let away = parse_goals(rest.get(2), "away")?;
            let m = engine.set_result(match_id, home, away)?;
            println!("match {} {} {}-{}", m.id, m.status, home, away);
        }
        "uisp-result" => {
            let match_id = parse_id(rest.first(), "match")?;
            let home = parse_goals(rest.get(1), "home")?;
            let away = parse_goals(rest.get(2), "away")?;
            let raw = rest.get(3).context("uisp-result needs period outcomes")?;
            let periods = parse_periods(raw)?;
            let m = engine.set_uisp_result(match_id, periods, home, away)?;
            let summary = m
                .periods
                .iter()
                .map(|p| format!("{}-{}", p.home, p.away))
                .collect::<Vec<_>>()
                .join(", ");
            println!("match {} {} {}-{} [{summary}]", m.id, m.status, home, away);
        }
        "postpone" => {
            let match_id = parse_id(rest.first(), "match")?;
            let m = engine.postpone_match(match_id)?;
            println!("match {} {}", m.id, m.status);
        }
        "cancel" => {
            let match_id = parse_id(rest.first(), "match")?;
            let m = engine.cancel_match(match_id)?;
            println!("match {} {}", m.id, m.status);
        }
        other => return Err(anyhow!("unknown command {other:?}\n{USAGE}")),
    }
    Ok(())
}

fn import(repo: &SqliteRepository, path: &Path) -> Result<()> {
    let season = import_season_file(repo, path)?;
    println!(
        "Imported {} ({}): {} teams, {} matches",
        season.championship.name,
        season.championship.variant,
        season.teams.len(),
        season.matches.len()
    );
    Ok(())
}

fn take_db_path_arg(args: &mut Vec<String>) -> Option<PathBuf> {
    let idx = args
        .iter()
        .position(|arg| arg == "--db" || arg.starts_with("--db="))?;
    let arg = args.remove(idx);
    let raw = match arg.strip_prefix("--db=") {
        Some(path) => path.to_string(),
        None if idx < args.len() => args.remove(idx),
        None => return None,
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|arg| arg != flag);
    args.len() != before
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_id(raw: Option<&String>, what: &str) -> Result<u32> {
    let raw = raw.with_context(|| format!("missing {what} id"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {what} id {raw:?}"))
}

fn parse_goals(raw: Option<&String>, side: &str) -> Result<u32> {
    let raw = raw.with_context(|| format!("missing {side} score"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {side} score {raw:?}"))
}

/// `W-L,D-D,L-W`: one home-away pair per period, in play order.
fn parse_periods(raw: &str) -> Result<Vec<Period>> {
    raw.split(',')
        .enumerate()
        .map(|(idx, pair)| {
            let (home, away) = pair
                .split_once('-')
                .with_context(|| format!("period {pair:?} is not home-away"))?;
            let home = PeriodOutcome::parse(home)
                .with_context(|| format!("unknown period outcome {home:?}"))?;
            let away = PeriodOutcome::parse(away)
                .with_context(|| format!("unknown period outcome {away:?}"))?;
            let index = u8::try_from(idx + 1).context("too many periods")?;
            Ok(Period::new(index, home, away))
        })
        .collect()
}

fn team_label(teams: &[Team], id: u32) -> String {
    teams
        .iter()
        .find(|t| t.id == id)
        .map(|t| t.short_name.clone().unwrap_or_else(|| t.name.clone()))
        .unwrap_or_else(|| format!("#{id}"))
}

fn print_standings<R: Repository>(
    engine: &Engine<R>,
    id: u32,
    rows: &[StandingEntry],
) -> Result<(), EngineError> {
    let teams = engine.repository().teams(id)?;
    println!(
        "{:>3}  {:<20} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>7}",
        "#", "Team", "P", "W", "D", "L", "GF", "GA", "Pts", "Title%"
    );
    for (pos, row) in rows.iter().enumerate() {
        let odds = row
            .win_probability
            .map(|p| format!("{p:.1}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}  {:<20} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>7}",
            pos + 1,
            team_label(&teams, row.team_id),
            row.played,
            row.won,
            row.drawn,
            row.lost,
            row.scored,
            row.conceded,
            row.points,
            odds
        );
    }
    Ok(())
}

fn print_fixtures<R: Repository>(
    engine: &Engine<R>,
    id: u32,
    rows: &[MatchProbability],
) -> Result<(), EngineError> {
    if rows.is_empty() {
        println!("No scheduled matches.");
        return Ok(());
    }
    let teams = engine.repository().teams(id)?;
    let matches = engine.repository().matches(id)?;
    println!(
        "{:>5}  {:<20} {:<20} {:>6} {:>6} {:>6}",
        "Match", "Home", "Away", "Home%", "Draw%", "Away%"
    );
    for row in rows {
        let Some(m) = matches.iter().find(|m| m.id == row.match_id) else {
            continue;
        };
        println!(
            "{:>5}  {:<20} {:<20} {:>6.1} {:>6.1} {:>6.1}",
            row.match_id,
            team_label(&teams, m.home_team_id),
            team_label(&teams, m.away_team_id),
            row.home_win_probability,
            row.draw_probability(),
            row.away_win_probability
        );
    }
    Ok(())
}
