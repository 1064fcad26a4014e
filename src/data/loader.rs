//! CSV loading and saving
//!
//! Pitch-event feeds, rosters and park tables in, feature tables and
//! computed park factors out.

use csv::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::features::enrich::EnrichedGameRecord;
use crate::features::park::{ParkFactor, ParkFactors, ParkIndexRow};
use crate::{PitchEvent, PitcherInfo, Result, StrikeoutError};

/// Load a pitch-event export; extra columns are ignored
pub fn read_pitch_events<P: AsRef<Path>>(path: P) -> Result<Vec<PitchEvent>> {
    let events: Vec<PitchEvent> = read_rows(&path)?;
    log::info!("Read {} pitch events from {}", events.len(), path.as_ref().display());
    Ok(events)
}

/// Load a roster with `name` and `id` columns
pub fn read_roster<P: AsRef<Path>>(path: P) -> Result<Vec<PitcherInfo>> {
    read_rows(path)
}

/// Load a percent-style park table (`Team`, `SO`)
pub fn read_park_index_table<P: AsRef<Path>>(path: P) -> Result<Vec<ParkIndexRow>> {
    read_rows(path)
}

/// Load a factor-style park table (`Team_abbr`, `K_park_factor`)
pub fn read_park_factor_table<P: AsRef<Path>>(path: P) -> Result<Vec<ParkFactor>> {
    read_rows(path)
}

pub fn write_park_factors<P: AsRef<Path>>(path: P, factors: &ParkFactors) -> Result<()> {
    write_rows(path, &factors.to_rows())
}

/// Write the feature table; missing joins become empty cells
pub fn write_feature_table<P: AsRef<Path>>(path: P, records: &[EnrichedGameRecord]) -> Result<()> {
    write_rows(&path, records)?;
    log::info!("Wrote {} feature rows to {}", records.len(), path.as_ref().display());
    Ok(())
}

fn read_rows<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        StrikeoutError::Config(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut reader = Reader::from_reader(file);
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

fn write_rows<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_writer(File::create(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::park::{ParkFactorSource, StaticParkFactors};
    use crate::features::teams::TeamNormalizer;
    use crate::{HalfInning, PitcherId};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_read_pitch_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(
            &path,
            "pitcher,game_date,inning_topbot,home_team,away_team,description,events,pitch_type,inning,batter,pitcher_days_since_prev_game,release_speed\n\
             543037,2024-04-02,Top,NYY,AZ,swinging_strike,strikeout,SL,1,660271,5,88.1\n\
             543037,2024-04-02,Bot,NYY,AZ,ball,,,2,660272,,91.0\n",
        )
        .unwrap();

        let events = read_pitch_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].pitcher, PitcherId(543037));
        assert_eq!(events[0].game_date, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
        assert!(events[0].is_strikeout());
        assert_eq!(events[0].days_since_prev_game, Some(5.0));
        assert_eq!(events[1].inning_topbot, HalfInning::Bottom);
        assert_eq!(events[1].events, None);
        assert_eq!(events[1].pitch_type, None);
        assert_eq!(events[1].days_since_prev_game, None);
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(
            &path,
            "pitcher,game_date,inning_topbot,home_team,away_team,description,events,pitch_type,inning,batter\n\
             1,April 2,Top,NYY,AZ,ball,,FF,1,2\n",
        )
        .unwrap();

        assert!(matches!(read_pitch_events(&path), Err(StrikeoutError::Csv(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_roster(dir.path().join("missing.csv"));
        assert!(matches!(result, Err(StrikeoutError::Config(_))));
    }

    #[test]
    fn test_read_roster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        std::fs::write(&path, "name,id\nGerrit Cole,543037\nTarik Skubal,669373\n").unwrap();

        let roster = read_roster(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].name, "Tarik Skubal");
        assert_eq!(roster[1].id, PitcherId(669373));
    }

    #[test]
    fn test_park_tables() {
        let dir = tempdir().unwrap();
        let percent = dir.path().join("fangraphs.csv");
        std::fs::write(&percent, "Team,SO,HR\nMariners,106,98\nRockies,93,115\n").unwrap();

        let teams = TeamNormalizer::new();
        let factors = StaticParkFactors::from_percent_rows(&read_park_index_table(&percent).unwrap(), &teams)
            .park_factors()
            .unwrap();
        assert!((factors.get("SEA").unwrap() - 1.06).abs() < 1e-9);
        assert!((factors.get("COL").unwrap() - 0.93).abs() < 1e-9);

        let saved = dir.path().join("out/park_factors.csv");
        write_park_factors(&saved, &factors).unwrap();
        let text = std::fs::read_to_string(&saved).unwrap();
        assert!(text.starts_with("Team_abbr,K_park_factor\n"));

        let rows = read_park_factor_table(&saved).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team, "COL");
    }

    #[test]
    fn test_write_feature_table() {
        let record = EnrichedGameRecord {
            pitcher_name: "Gerrit Cole".to_string(),
            pitcher_id: PitcherId(543037),
            game_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            pitch_count: 95,
            strikeouts: 8,
            max_inning: 7,
            num_pitch_types: 5,
            home_team: "NYY".to_string(),
            away_team: "ARI".to_string(),
            pitcher_team: "NYY".to_string(),
            opponent_team: "ARI".to_string(),
            rest_days: 5,
            whiff_rate: 0.3,
            csw_pct: 0.32,
            whiff_rate_expanding: 0.0,
            csw_pct_expanding: 0.0,
            opponent_k_pct: None,
            park_factor_k: Some(1.02),
            rolling_k_avg_3: 5.0,
            rolling_k_avg_5: 5.0,
            rolling_pitch_count_5: 85.0,
            rolling_k_rate: 0.055,
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("processed/features.csv");
        write_feature_table(&path, &[record.clone()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.contains("park_factor_K"));
        assert!(header.contains("rolling_K_avg_3"));
        assert!(header.contains("rolling_K_rate"));

        let back: Vec<EnrichedGameRecord> = read_rows(&path).unwrap();
        assert_eq!(back, vec![record]);
    }
}
