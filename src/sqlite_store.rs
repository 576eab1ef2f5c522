use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{
    Championship, ChampionshipId, Match, MatchId, MatchProbability, MatchStatus, Period,
    PeriodOutcome, Score, ScoringVariant, Season, StandingEntry, Team,
};
use crate::repository::Repository;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

const MATCH_COLUMNS: &str = "id, championship_id, home_team_id, away_team_id, scheduled_at, status, home_score, away_score";

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upserts the championship, its team roster and every match in one transaction.
    pub fn import_season(&self, season: &Season) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin season import")?;
        upsert_championship(&tx, &season.championship)?;
        tx.execute(
            "DELETE FROM championship_teams WHERE championship_id = ?1",
            params![season.championship.id],
        )
        .context("clear championship roster")?;
        for team in &season.teams {
            upsert_team(&tx, season.championship.id, team)?;
        }
        for m in &season.matches {
            write_match(&tx, m)?;
        }
        tx.commit().context("commit season import")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS championships (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            variant TEXT NOT NULL,
            season_start TEXT NULL,
            season_end TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            short_name TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS championship_teams (
            championship_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            PRIMARY KEY (championship_id, team_id)
        );
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY,
            championship_id INTEGER NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            scheduled_at TEXT NULL,
            status TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_championship ON matches(championship_id);
        CREATE TABLE IF NOT EXISTS match_periods (
            match_id INTEGER NOT NULL,
            period_index INTEGER NOT NULL,
            home_outcome TEXT NOT NULL,
            away_outcome TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            PRIMARY KEY (match_id, period_index)
        );
        CREATE TABLE IF NOT EXISTS standings (
            championship_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            played INTEGER NOT NULL,
            won INTEGER NOT NULL,
            drawn INTEGER NOT NULL,
            lost INTEGER NOT NULL,
            scored INTEGER NOT NULL,
            conceded INTEGER NOT NULL,
            points INTEGER NOT NULL,
            win_probability REAL NULL,
            PRIMARY KEY (championship_id, team_id)
        );
        CREATE TABLE IF NOT EXISTS match_probabilities (
            match_id INTEGER PRIMARY KEY,
            championship_id INTEGER NOT NULL,
            home_win_probability REAL NOT NULL,
            away_win_probability REAL NOT NULL,
            calculated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_match_probabilities_championship
            ON match_probabilities(championship_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn upsert_championship(conn: &Connection, c: &Championship) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO championships (id, name, variant, season_start, season_end)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            variant = excluded.variant,
            season_start = excluded.season_start,
            season_end = excluded.season_end
        "#,
        params![
            c.id,
            c.name,
            c.variant.as_str(),
            c.season_start.map(|d| d.format(DATE_FORMAT).to_string()),
            c.season_end.map(|d| d.format(DATE_FORMAT).to_string()),
        ],
    )
    .context("upsert championship")?;
    Ok(())
}

fn upsert_team(conn: &Connection, championship_id: ChampionshipId, team: &Team) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO teams (id, name, short_name) VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            short_name = excluded.short_name
        "#,
        params![team.id, team.name, team.short_name],
    )
    .context("upsert team")?;
    conn.execute(
        "INSERT OR IGNORE INTO championship_teams (championship_id, team_id) VALUES (?1, ?2)",
        params![championship_id, team.id],
    )
    .context("link team to championship")?;
    Ok(())
}

fn write_match(conn: &Connection, m: &Match) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO matches (
            id, championship_id, home_team_id, away_team_id, scheduled_at,
            status, home_score, away_score, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            championship_id = excluded.championship_id,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            scheduled_at = excluded.scheduled_at,
            status = excluded.status,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            m.id,
            m.championship_id,
            m.home_team_id,
            m.away_team_id,
            m.scheduled_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            m.status.as_str(),
            m.score.map(|s| s.home),
            m.score.map(|s| s.away),
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;

    conn.execute(
        "DELETE FROM match_periods WHERE match_id = ?1",
        params![m.id],
    )
    .context("clear match periods")?;
    for p in &m.periods {
        conn.execute(
            r#"
            INSERT INTO match_periods (
                match_id, period_index, home_outcome, away_outcome, home_score, away_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                m.id,
                p.index,
                p.home.as_str(),
                p.away.as_str(),
                p.score.map(|s| s.home),
                p.score.map(|s| s.away),
            ],
        )
        .context("insert match period")?;
    }
    Ok(())
}

struct MatchRow {
    id: MatchId,
    championship_id: ChampionshipId,
    home_team_id: u32,
    away_team_id: u32,
    scheduled_at: Option<String>,
    status: String,
    home_score: Option<u32>,
    away_score: Option<u32>,
}

impl MatchRow {
    fn into_match(self, conn: &Connection) -> Result<Match> {
        let status = MatchStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("match {} has unknown status {:?}", self.id, self.status))?;
        let scheduled_at = self
            .scheduled_at
            .as_deref()
            .map(|raw| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT))
            .transpose()
            .with_context(|| format!("match {} has a malformed kick-off time", self.id))?;
        let score = match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some(Score::new(home, away)),
            _ => None,
        };
        Ok(Match {
            id: self.id,
            championship_id: self.championship_id,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            scheduled_at,
            status,
            score,
            periods: load_periods(conn, self.id)?,
        })
    }
}

fn load_matches(conn: &Connection, filter: &str, key: u32) -> Result<Vec<Match>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql).context("prepare match query")?;
    let rows = stmt
        .query_map(params![key], |row| {
            Ok(MatchRow {
                id: row.get(0)?,
                championship_id: row.get(1)?,
                home_team_id: row.get(2)?,
                away_team_id: row.get(3)?,
                scheduled_at: row.get(4)?,
                status: row.get(5)?,
                home_score: row.get(6)?,
                away_score: row.get(7)?,
            })
        })
        .context("query matches")?;

    let mut out = Vec::new();
    for row in rows {
        let raw = row.context("decode match row")?;
        out.push(raw.into_match(conn)?);
    }
    Ok(out)
}

fn load_periods(conn: &Connection, match_id: MatchId) -> Result<Vec<Period>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT period_index, home_outcome, away_outcome, home_score, away_score
            FROM match_periods WHERE match_id = ?1 ORDER BY period_index
            "#,
        )
        .context("prepare period query")?;
    let rows = stmt
        .query_map(params![match_id], |row| {
            Ok((
                row.get::<_, u8>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, Option<u32>>(4)?,
            ))
        })
        .context("query periods")?;

    let mut out = Vec::new();
    for row in rows {
        let (index, home, away, home_score, away_score) = row.context("decode period row")?;
        let outcome = |raw: &str| {
            PeriodOutcome::parse(raw)
                .ok_or_else(|| anyhow!("match {match_id} period {index} has outcome {raw:?}"))
        };
        out.push(Period {
            index,
            home: outcome(&home)?,
            away: outcome(&away)?,
            score: match (home_score, away_score) {
                (Some(h), Some(a)) => Some(Score::new(h, a)),
                _ => None,
            },
        });
    }
    Ok(out)
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).with_context(|| format!("bad date {s:?}")))
        .transpose()
}

fn write_standings(conn: &Connection, id: ChampionshipId, rows: &[StandingEntry]) -> Result<()> {
    conn.execute(
        "DELETE FROM standings WHERE championship_id = ?1",
        params![id],
    )
    .context("clear standings")?;
    for (position, row) in rows.iter().enumerate() {
        conn.execute(
            r#"
            INSERT INTO standings (
                championship_id, team_id, position, played, won, drawn, lost,
                scored, conceded, points, win_probability
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                id,
                row.team_id,
                position as i64 + 1,
                row.played,
                row.won,
                row.drawn,
                row.lost,
                row.scored,
                row.conceded,
                row.points,
                row.win_probability,
            ],
        )
        .context("insert standing")?;
    }
    Ok(())
}

fn write_match_probabilities(
    conn: &Connection,
    id: ChampionshipId,
    rows: &[MatchProbability],
) -> Result<()> {
    conn.execute(
        "DELETE FROM match_probabilities WHERE championship_id = ?1",
        params![id],
    )
    .context("clear match probabilities")?;
    for row in rows {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO match_probabilities (
                match_id, championship_id, home_win_probability, away_win_probability,
                calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                row.match_id,
                id,
                row.home_win_probability,
                row.away_win_probability,
                row.calculated_at.to_rfc3339(),
            ],
        )
        .context("insert match probability")?;
    }
    Ok(())
}

impl Repository for SqliteRepository {
    fn championship(&self, id: ChampionshipId) -> Result<Option<Championship>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT name, variant, season_start, season_end FROM championships WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .context("query championship")?;

        let Some((name, variant, start, end)) = row else {
            return Ok(None);
        };
        let variant = ScoringVariant::parse(&variant)
            .ok_or_else(|| anyhow!("championship {id} has unknown scoring variant {variant:?}"))?;
        Ok(Some(Championship {
            id,
            name,
            variant,
            season_start: parse_date(start)?,
            season_end: parse_date(end)?,
        }))
    }

    fn teams(&self, id: ChampionshipId) -> Result<Vec<Team>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT t.id, t.name, t.short_name
                FROM teams t
                JOIN championship_teams ct ON ct.team_id = t.id
                WHERE ct.championship_id = ?1
                ORDER BY t.id
                "#,
            )
            .context("prepare team query")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Team {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    short_name: row.get(2)?,
                })
            })
            .context("query teams")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode team row")?);
        }
        Ok(out)
    }

    fn matches(&self, id: ChampionshipId) -> Result<Vec<Match>> {
        let conn = self.lock()?;
        load_matches(&conn, "championship_id = ?1", id)
    }

    fn completed_matches(&self, id: ChampionshipId) -> Result<Vec<Match>> {
        let conn = self.lock()?;
        load_matches(&conn, "championship_id = ?1 AND status = 'completed'", id)
    }

    fn find_match(&self, id: MatchId) -> Result<Option<Match>> {
        let conn = self.lock()?;
        Ok(load_matches(&conn, "id = ?1", id)?.into_iter().next())
    }

    fn standings(&self, id: ChampionshipId) -> Result<Vec<StandingEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT team_id, played, won, drawn, lost, scored, conceded, points, win_probability
                FROM standings WHERE championship_id = ?1 ORDER BY position
                "#,
            )
            .context("prepare standings query")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(StandingEntry {
                    championship_id: id,
                    team_id: row.get(0)?,
                    played: row.get(1)?,
                    won: row.get(2)?,
                    drawn: row.get(3)?,
                    lost: row.get(4)?,
                    scored: row.get(5)?,
                    conceded: row.get(6)?,
                    points: row.get(7)?,
                    win_probability: row.get(8)?,
                })
            })
            .context("query standings")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode standing row")?);
        }
        Ok(out)
    }

    fn match_probabilities(&self, id: ChampionshipId) -> Result<Vec<MatchProbability>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT match_id, home_win_probability, away_win_probability, calculated_at
                FROM match_probabilities WHERE championship_id = ?1 ORDER BY match_id
                "#,
            )
            .context("prepare match probability query")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query match probabilities")?;

        let mut out = Vec::new();
        for row in rows {
            let (match_id, home, away, at) = row.context("decode match probability row")?;
            let calculated_at = DateTime::parse_from_rfc3339(&at)
                .with_context(|| format!("match {match_id} has a malformed calculated_at"))?
                .with_timezone(&Utc);
            out.push(MatchProbability {
                match_id,
                championship_id: id,
                home_win_probability: home,
                away_win_probability: away,
                calculated_at,
            });
        }
        Ok(out)
    }

    fn save_standings(&self, id: ChampionshipId, rows: &[StandingEntry]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin standings swap")?;
        write_standings(&tx, id, rows)?;
        tx.commit().context("commit standings swap")?;
        Ok(())
    }

    fn save_match_probabilities(&self, id: ChampionshipId, rows: &[MatchProbability]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin match probability swap")?;
        write_match_probabilities(&tx, id, rows)?;
        tx.commit().context("commit match probability swap")?;
        Ok(())
    }

    fn save_probabilities(
        &self,
        id: ChampionshipId,
        standings: &[StandingEntry],
        matches: &[MatchProbability],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin probability swap")?;
        write_match_probabilities(&tx, id, matches)?;
        write_standings(&tx, id, standings)?;
        tx.commit().context("commit probability swap")?;
        Ok(())
    }

    fn save_match(&self, m: &Match) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin match write")?;
        write_match(&tx, m)?;
        tx.commit().context("commit match write")?;
        Ok(())
    }

    fn delete_match_probability(&self, id: MatchId) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM match_probabilities WHERE match_id = ?1",
            params![id],
        )
        .context("delete match probability")?;
        Ok(())
    }
}
