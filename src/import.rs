use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::model::Season;
use crate::sqlite_store::SqliteRepository;

/// Parses a season file. Matches may omit `championship_id`; they inherit
/// the file's championship.
pub fn parse_season_json(raw: &str) -> Result<Season> {
    let mut season: Season = serde_json::from_str(raw).context("invalid season json")?;
    let id = season.championship.id;
    for m in &mut season.matches {
        if m.championship_id == 0 {
            m.championship_id = id;
        }
        if m.championship_id != id {
            return Err(anyhow!(
                "match {} belongs to championship {}, not {id}",
                m.id,
                m.championship_id
            ));
        }
    }
    Ok(season)
}

pub fn read_season_file(path: &Path) -> Result<Season> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read season file {}", path.display()))?;
    parse_season_json(&raw).with_context(|| format!("parse season file {}", path.display()))
}

pub fn import_season_file(repo: &SqliteRepository, path: &Path) -> Result<Season> {
    let season = read_season_file(path)?;
    repo.import_season(&season)?;
    log::info!(
        "imported championship {} ({}): {} teams, {} matches",
        season.championship.id,
        season.championship.variant,
        season.teams.len(),
        season.matches.len()
    );
    Ok(season)
}
