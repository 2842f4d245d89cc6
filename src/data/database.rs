//! SQLite storage for per-team match records
//!
//! Opponents are stored by name. Their categorical codes are assigned on
//! load from every opponent in the store, so a club keeps one code however
//! many files its matches were imported from.

use crate::{
    apply_opponent_codes, opponent_codes, MatchRecord, Outcome, PredictorError, Result, Venue,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const MATCH_COLUMNS: &str = "m.date, t.name, m.goals_for, m.goals_against, m.shots,
    m.shots_on_target, m.distance, m.free_kicks, m.penalties, m.penalty_attempts,
    m.venue, m.opponent, m.hour, m.day_of_week, m.outcome";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS team_matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                goals_for INTEGER NOT NULL,
                goals_against INTEGER NOT NULL,
                shots INTEGER NOT NULL,
                shots_on_target INTEGER NOT NULL,
                distance REAL,
                free_kicks INTEGER NOT NULL,
                penalties INTEGER NOT NULL,
                penalty_attempts INTEGER NOT NULL,
                venue TEXT NOT NULL,
                opponent TEXT NOT NULL,
                hour INTEGER,
                day_of_week INTEGER,
                outcome INTEGER NOT NULL,
                UNIQUE(date, team_id)
            );

            CREATE INDEX IF NOT EXISTS idx_team_matches_date ON team_matches(date);
            CREATE INDEX IF NOT EXISTS idx_team_matches_team ON team_matches(team_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Get or create a team by name, returning its row id
    pub fn get_or_create_team(&self, name: &str) -> Result<i64> {
        team_id(&self.conn, name)
    }

    /// Find a team id by case-insensitive name
    pub fn find_team(&self, name: &str) -> Result<Option<i64>> {
        find_team_id(&self.conn, name)
    }

    /// All team names, alphabetical
    pub fn get_team_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM teams ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // ==================== Match Operations ====================

    /// Insert or update a match record
    pub fn upsert_match(&self, record: &MatchRecord) -> Result<()> {
        upsert(&self.conn, record)
    }

    /// Insert multiple match records in one transaction
    pub fn upsert_matches(&mut self, records: &[MatchRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            upsert(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Get all matches, oldest first
    pub fn get_all_matches(&self) -> Result<Vec<MatchRecord>> {
        let query = format!(
            "SELECT {} FROM team_matches m JOIN teams t ON t.id = m.team_id ORDER BY m.date, t.name",
            MATCH_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let mut matches = stmt
            .query_map([], Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.recode_opponents(&mut matches)?;
        Ok(matches)
    }

    /// Get matches for one team, oldest first
    pub fn get_team_matches(&self, team: &str) -> Result<Vec<MatchRecord>> {
        let team_id = self
            .find_team(team)?
            .ok_or_else(|| PredictorError::UnknownTeam(team.to_string()))?;

        let query = format!(
            "SELECT {} FROM team_matches m JOIN teams t ON t.id = m.team_id
             WHERE m.team_id = ?1 ORDER BY m.date",
            MATCH_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let mut matches = stmt
            .query_map(params![team_id], Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.recode_opponents(&mut matches)?;
        Ok(matches)
    }

    /// Code opponents against every opponent in the store
    fn recode_opponents(&self, matches: &mut [MatchRecord]) -> Result<()> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT opponent FROM team_matches")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let codes = opponent_codes(names.iter().map(String::as_str));
        apply_opponent_codes(matches, &codes);
        Ok(())
    }

    fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<MatchRecord> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let venue_str: String = row.get(10)?;
        let venue = Venue::from_label(&venue_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                10,
                rusqlite::types::Type::Text,
                format!("unknown venue {:?}", venue_str).into(),
            )
        })?;

        let outcome_code: i64 = row.get(14)?;
        let outcome = Outcome::from_code(outcome_code).ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(14, outcome_code)
        })?;

        Ok(MatchRecord {
            date,
            team: row.get(1)?,
            goals_for: row.get(2)?,
            goals_against: row.get(3)?,
            shots: row.get(4)?,
            shots_on_target: row.get(5)?,
            distance: row.get(6)?,
            free_kicks: row.get(7)?,
            penalties: row.get(8)?,
            penalty_attempts: row.get(9)?,
            venue,
            opponent: row.get(11)?,
            opponent_code: -1,
            hour: row.get(12)?,
            day_of_week: row.get(13)?,
            outcome,
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;

        let match_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM team_matches", [], |row| row.get(0))?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM team_matches",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            team_count: team_count as usize,
            match_count: match_count as usize,
            earliest_match: min_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            latest_match: max_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }
}

fn find_team_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM teams WHERE LOWER(name) = LOWER(?1)",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn team_id(conn: &Connection, name: &str) -> Result<i64> {
    if let Some(id) = find_team_id(conn, name)? {
        return Ok(id);
    }
    conn.execute("INSERT INTO teams (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

fn upsert(conn: &Connection, record: &MatchRecord) -> Result<()> {
    let team_id = team_id(conn, &record.team)?;
    conn.execute(
        r#"
        INSERT INTO team_matches (date, team_id, goals_for, goals_against, shots,
                                  shots_on_target, distance, free_kicks, penalties,
                                  penalty_attempts, venue, opponent, hour,
                                  day_of_week, outcome)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(date, team_id) DO UPDATE SET
            goals_for = excluded.goals_for,
            goals_against = excluded.goals_against,
            shots = excluded.shots,
            shots_on_target = excluded.shots_on_target,
            distance = COALESCE(excluded.distance, distance),
            free_kicks = excluded.free_kicks,
            penalties = excluded.penalties,
            penalty_attempts = excluded.penalty_attempts,
            venue = excluded.venue,
            opponent = excluded.opponent,
            hour = COALESCE(excluded.hour, hour),
            day_of_week = COALESCE(excluded.day_of_week, day_of_week),
            outcome = excluded.outcome
        "#,
        params![
            record.date.format("%Y-%m-%d").to_string(),
            team_id,
            record.goals_for,
            record.goals_against,
            record.shots,
            record.shots_on_target,
            record.distance,
            record.free_kicks,
            record.penalties,
            record.penalty_attempts,
            record.venue.to_string(),
            record.opponent,
            record.hour,
            record.day_of_week,
            record.outcome.code() as i64,
        ],
    )?;
    Ok(())
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub match_count: usize,
    pub earliest_match: Option<NaiveDate>,
    pub latest_match: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 0);
        assert_eq!(stats.match_count, 0);
        assert!(stats.earliest_match.is_none());
    }

    #[test]
    fn test_create_team() {
        let db = Database::in_memory().unwrap();
        let id = db.get_or_create_team("Arsenal").unwrap();

        // Getting again should return same team
        let again = db.get_or_create_team("arsenal").unwrap();
        assert_eq!(id, again);
        assert_eq!(db.get_team_names().unwrap(), vec!["Arsenal".to_string()]);
    }

    #[test]
    fn test_insert_and_load_matches() {
        let mut db = Database::in_memory().unwrap();
        let mut records: Vec<MatchRecord> = (0..3).map(|w| record("Arsenal", w, 2, 1)).collect();
        records[1].distance = None;
        records[2].hour = None;
        records.push(record("Chelsea", 0, 0, 0));

        assert_eq!(db.upsert_matches(&records).unwrap(), 4);

        let loaded = db.get_team_matches("Arsenal").unwrap();
        assert_eq!(loaded, records[..3].to_vec());

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 2);
        assert_eq!(stats.match_count, 4);
        assert_eq!(stats.earliest_match, Some(records[0].date));
        assert_eq!(db.get_all_matches().unwrap().len(), 4);
    }

    #[test]
    fn test_upsert_replaces_same_fixture() {
        let db = Database::in_memory().unwrap();
        db.upsert_match(&record("Arsenal", 0, 1, 0)).unwrap();
        db.upsert_match(&record("Arsenal", 0, 1, 1)).unwrap();

        let loaded = db.get_all_matches().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].outcome, Outcome::Draw);
    }

    #[test]
    fn test_records_persist_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("football.db");

        {
            let mut db = Database::open(&path).unwrap();
            let records: Vec<MatchRecord> = (0..4).map(|w| record("Arsenal", w, 1, 0)).collect();
            db.upsert_matches(&records).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_stats().unwrap().match_count, 4);
        assert_eq!(db.get_team_names().unwrap(), vec!["Arsenal".to_string()]);
    }

    fn write_csv(rows: &[&str]) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "date,time,venue,result,gf,ga,opponent,sh,sot,dist,fk,pk,pkatt,team"
        )
        .unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_opponent_codes_stable_across_imports() {
        use crate::data::import::read_matches_csv;

        let first = write_csv(&[
            "2020-09-12,15:00,Home,W,2,0,Burnley,12,5,17.0,1,0,0,Arsenal",
            "2020-09-19,15:00,Away,L,0,1,Chelsea,8,2,19.0,0,0,0,Arsenal",
        ]);
        let second = write_csv(&[
            "2021-09-11,15:00,Home,D,1,1,Chelsea,10,3,18.0,0,0,0,Arsenal",
            "2021-09-18,15:00,Away,W,3,1,Wolves,14,6,16.0,2,1,1,Arsenal",
        ]);

        let mut db = Database::in_memory().unwrap();
        db.upsert_matches(&read_matches_csv(first.path()).unwrap()).unwrap();
        db.upsert_matches(&read_matches_csv(second.path()).unwrap()).unwrap();

        let code_of = |matches: &[MatchRecord], name: &str| -> Vec<i64> {
            matches
                .iter()
                .filter(|m| m.opponent == name)
                .map(|m| m.opponent_code)
                .collect()
        };

        let all = db.get_all_matches().unwrap();
        assert_eq!(code_of(&all, "Burnley"), vec![0]);
        assert_eq!(code_of(&all, "Chelsea"), vec![1, 1]);
        assert_eq!(code_of(&all, "Wolves"), vec![2]);

        let team = db.get_team_matches("Arsenal").unwrap();
        assert_eq!(code_of(&team, "Chelsea"), vec![1, 1]);
    }

    #[test]
    fn test_unknown_stored_venue_is_an_error() {
        let mut db = Database::in_memory().unwrap();
        db.upsert_matches(&[record("Arsenal", 0, 1, 0)]).unwrap();
        db.conn
            .execute("UPDATE team_matches SET venue = 'Neutral'", [])
            .unwrap();

        assert!(matches!(
            db.get_all_matches(),
            Err(PredictorError::Database(_))
        ));
    }

    #[test]
    fn test_unknown_team() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.get_team_matches("Nobody"),
            Err(PredictorError::UnknownTeam(_))
        ));
    }
}
