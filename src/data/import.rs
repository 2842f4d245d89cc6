//! CSV import of per-team match logs
//!
//! Expects one row per team per fixture with the usual scraped column names
//! (`date, time, venue, result, gf, ga, opponent, sh, sot, dist, fk, pk,
//! pkatt, team`). Extra columns are ignored.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::{
    apply_opponent_codes, opponent_codes, MatchRecord, Outcome, PredictorError, Result, Venue,
};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(default)]
    time: Option<String>,
    venue: String,
    result: String,
    gf: f64,
    ga: f64,
    opponent: String,
    sh: f64,
    sot: f64,
    #[serde(default)]
    dist: Option<f64>,
    fk: f64,
    pk: f64,
    pkatt: f64,
    team: String,
}

/// Read match records from a CSV file
pub fn read_matches_csv<P: AsRef<Path>>(path: P) -> Result<Vec<MatchRecord>> {
    let file = File::open(path.as_ref())?;
    read_matches(BufReader::new(file))
}

/// Read match records from any CSV source.
///
/// Opponent codes cover the opponents of this input only. The store
/// recodes records against every opponent it holds when loading them.
pub fn read_matches<R: Read>(reader: R) -> Result<Vec<MatchRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let rows = reader
        .deserialize::<CsvRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for (line, row) in rows.iter().enumerate() {
        records.push(
            to_record(row).map_err(|e| PredictorError::Parse(format!("row {}: {}", line + 1, e)))?,
        );
    }

    let codes = opponent_codes(records.iter().map(|r| r.opponent.as_str()));
    apply_opponent_codes(&mut records, &codes);

    log::info!(
        "Read {} match records ({} opponents)",
        records.len(),
        codes.len()
    );
    Ok(records)
}

fn to_record(row: &CsvRow) -> std::result::Result<MatchRecord, String> {
    let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("bad date {:?}: {}", row.date, e))?;
    let venue =
        Venue::from_label(&row.venue).ok_or_else(|| format!("bad venue {:?}", row.venue))?;
    let outcome =
        Outcome::from_result(&row.result).ok_or_else(|| format!("bad result {:?}", row.result))?;

    Ok(MatchRecord {
        date,
        team: row.team.trim().to_string(),
        goals_for: count(row.gf, "gf")?,
        goals_against: count(row.ga, "ga")?,
        shots: count(row.sh, "sh")?,
        shots_on_target: count(row.sot, "sot")?,
        distance: row.dist.filter(|d| d.is_finite()),
        free_kicks: count(row.fk, "fk")?,
        penalties: count(row.pk, "pk")?,
        penalty_attempts: count(row.pkatt, "pkatt")?,
        venue,
        opponent: row.opponent.trim().to_string(),
        opponent_code: -1,
        hour: row.time.as_deref().and_then(kickoff_hour),
        day_of_week: Some(date.weekday().num_days_from_monday() as u8),
        outcome,
    })
}

/// Non-negative whole count stored as a float in the source
fn count(value: f64, column: &str) -> std::result::Result<u32, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("bad {} value {}", column, value));
    }
    Ok(value.round() as u32)
}

/// Hour from a kickoff time such as "20:00" or "15:30 (16:30)"
fn kickoff_hour(time: &str) -> Option<u8> {
    let hour: u8 = time.trim().split(':').next()?.trim().parse().ok()?;
    (hour < 24).then_some(hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "date,time,comp,venue,result,gf,ga,opponent,sh,sot,dist,fk,pk,pkatt,team";

    #[test]
    fn test_read_matches() {
        let data = format!(
            "{}\n\
             2021-08-14,15:00,Premier League,Home,W,2.0,0.0,Norwich City,17.0,7.0,16.4,1.0,0.0,0.0,Liverpool\n\
             2021-08-21,17:30,Premier League,Away,D,1.0,1.0,Burnley,9.0,2.0,,0.0,1.0,1.0,Liverpool\n\
             2021-08-28,,Premier League,Home,L,0.0,1.0,Chelsea,5.0,1.0,20.1,0.0,0.0,0.0,Arsenal\n",
            HEADER
        );

        let records = read_matches(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.team, "Liverpool");
        assert_eq!(first.venue, Venue::Home);
        assert_eq!(first.outcome, Outcome::Win);
        assert_eq!(first.hour, Some(15));
        // 2021-08-14 was a Saturday
        assert_eq!(first.day_of_week, Some(5));
        assert_eq!(first.shots_on_target, 7);
        // Burnley < Chelsea < Norwich City
        assert_eq!(first.opponent, "Norwich City");
        assert_eq!(first.opponent_code, 2);

        assert_eq!(records[1].distance, None);
        assert_eq!(records[1].penalty_attempts, 1);
        assert_eq!(records[1].opponent_code, 0);
        assert_eq!(records[2].hour, None);
        assert_eq!(records[2].outcome, Outcome::Loss);
    }

    #[test]
    fn test_bad_result_is_reported_with_row() {
        let data = format!(
            "{}\n2021-08-14,15:00,PL,Home,X,2,0,Norwich City,17,7,16.4,1,0,0,Liverpool\n",
            HEADER
        );
        match read_matches(data.as_bytes()) {
            Err(PredictorError::Parse(msg)) => assert!(msg.contains("row 1")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(
            file,
            "2022-01-01,12:30,PL,Away,W,3,1,Leeds United,14,6,18.2,0,0,0,Everton"
        )
        .unwrap();

        let records = read_matches_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].goals_for, 3);
        assert_eq!(records[0].hour, Some(12));
    }

    #[test]
    fn test_kickoff_hour() {
        assert_eq!(kickoff_hour("20:00"), Some(20));
        assert_eq!(kickoff_hour("15:30 (16:30)"), Some(15));
        assert_eq!(kickoff_hour("tbd"), None);
        assert_eq!(kickoff_hour("25:00"), None);
    }
}
