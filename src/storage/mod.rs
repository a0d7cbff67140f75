//! SQLite reading store -- schema, queries, migrations.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, types::Type};

use crate::readings::{
    FlowReading, PressureReading, ReadingStore, SensorStatus, Timestamp, Zone,
};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Reading store backed by the SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn open(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Opening reading store");
        Ok(Self::new(open_pool(path)?))
    }

    /// Insert or replace zone reference data.
    pub fn save_zones(&self, zones: &[Zone]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO zones
                 (zone_id, zone_name, population, elevation, base_pressure, num_sensors)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for z in zones {
                stmt.execute(params![
                    z.zone_id,
                    z.zone_name,
                    z.population as i64,
                    z.elevation,
                    z.base_pressure,
                    z.num_sensors
                ])?;
            }
        }
        tx.commit()?;
        Ok(zones.len())
    }

    /// Insert pressure readings. A reading for a sensor and timestamp that is
    /// already stored replaces the old row.
    pub fn save_pressure_readings(&self, readings: &[PressureReading]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pressure_readings
                 (recorded_at, zone_id, zone_name, sensor_id, pressure_psi, elevation, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in readings {
                stmt.execute(params![
                    r.timestamp.to_rfc3339(),
                    r.zone_id,
                    r.zone_name,
                    r.sensor_id,
                    r.pressure_psi,
                    r.elevation,
                    r.status.as_str()
                ])?;
            }
        }
        tx.commit()?;
        Ok(readings.len())
    }

    /// Insert flow readings, replacing any stored row for the same zone and
    /// timestamp.
    pub fn save_flow_readings(&self, readings: &[FlowReading]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO flow_readings
                 (recorded_at, zone_id, zone_name, flow_rate_lpm, population)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in readings {
                stmt.execute(params![
                    r.timestamp.to_rfc3339(),
                    r.zone_id,
                    r.zone_name,
                    r.flow_rate_lpm,
                    r.population as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(readings.len())
    }
}

/// Timestamps are stored as RFC 3339 text with the feed's own offset.
fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<Timestamp> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ReadingStore for SqliteStore {
    fn zones(&self) -> Result<Vec<Zone>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT zone_id, zone_name, population, elevation, base_pressure, num_sensors
             FROM zones ORDER BY zone_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Zone {
                zone_id: row.get(0)?,
                zone_name: row.get(1)?,
                population: row.get::<_, i64>(2)? as u64,
                elevation: row.get(3)?,
                base_pressure: row.get(4)?,
                num_sensors: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read zones")
    }

    fn pressure_readings(&self) -> Result<Vec<PressureReading>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT recorded_at, zone_id, zone_name, sensor_id, pressure_psi, elevation, status
             FROM pressure_readings ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PressureReading {
                timestamp: parse_timestamp(0, &row.get::<_, String>(0)?)?,
                zone_id: row.get(1)?,
                zone_name: row.get(2)?,
                sensor_id: row.get(3)?,
                pressure_psi: row.get(4)?,
                elevation: row.get(5)?,
                status: SensorStatus::parse(&row.get::<_, String>(6)?),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read pressure readings")
    }

    fn flow_readings(&self) -> Result<Vec<FlowReading>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT recorded_at, zone_id, zone_name, flow_rate_lpm, population
             FROM flow_readings ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FlowReading {
                timestamp: parse_timestamp(0, &row.get::<_, String>(0)?)?,
                zone_id: row.get(1)?,
                zone_name: row.get(2)?,
                flow_rate_lpm: row.get(3)?,
                population: row.get::<_, i64>(4)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read flow readings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::fixtures::{at, flow, pressure, zone};
    use crate::readings::ReadingSnapshot;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("readings.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_round_trip_readings() -> Result<()> {
        let (_dir, store) = temp_store();

        store.save_zones(&[zone("Z1", 85_000, 2)])?;
        let mut low = pressure(at(0, 1), "Z1", "Z1_S02", 22.5);
        low.status = SensorStatus::Low;
        store.save_pressure_readings(&[pressure(at(0, 0), "Z1", "Z1_S01", 51.25), low])?;
        store.save_flow_readings(&[flow(at(0, 0), "Z1", 410.0)])?;

        let snap = ReadingSnapshot::load(&store)?;
        assert_eq!(snap.zones().len(), 1);
        assert_eq!(snap.zones()[0].population, 85_000);
        assert_eq!(snap.pressure().len(), 2);
        assert_eq!(snap.pressure()[0].timestamp, at(0, 0));
        assert_eq!(snap.pressure()[0].pressure_psi, 51.25);
        assert_eq!(snap.pressure()[1].status, SensorStatus::Low);
        assert_eq!(snap.flow()[0].flow_rate_lpm, 410.0);
        Ok(())
    }

    #[test]
    fn test_zones_are_upserted() -> Result<()> {
        let (_dir, store) = temp_store();
        store.save_zones(&[zone("Z1", 1000, 2)])?;
        store.save_zones(&[zone("Z1", 2000, 3)])?;
        let zones = store.zones()?;
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].population, 2000);
        Ok(())
    }

    #[test]
    fn test_offsets_survive_storage() -> Result<()> {
        let (_dir, store) = temp_store();
        let ist = chrono::FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let mut r = flow(at(0, 0), "Z1", 350.0);
        r.timestamp = r.timestamp.with_timezone(&ist);
        store.save_flow_readings(&[r.clone()])?;

        let back = store.flow_readings()?;
        assert_eq!(back[0].timestamp.offset(), &ist);
        assert_eq!(back[0].hour(), r.hour());
        assert_eq!(back[0].hour(), 5);
        Ok(())
    }

    #[test]
    fn test_reimport_does_not_duplicate() -> Result<()> {
        let (_dir, store) = temp_store();
        let low: Vec<_> = (0..30)
            .map(|h| pressure(at(0, h), "Z1", "Z1_S01", 30.0))
            .collect();
        let flows: Vec<_> = (0..24).map(|h| flow(at(0, h), "Z1", 100.0)).collect();

        for _ in 0..2 {
            store.save_pressure_readings(&low)?;
            store.save_flow_readings(&flows)?;
        }

        let snap = ReadingSnapshot::load(&store)?;
        assert_eq!(snap.pressure().len(), 30);
        assert_eq!(snap.flow().len(), 24);

        let config = crate::config::EngineConfig::default();
        let analyzer = crate::detect::Analyzer::new(std::sync::Arc::new(snap), config)?;
        let stats = analyzer.statistics();
        assert_eq!(stats.low_pressure_zones[0].low_pressure_count, 30);
        let recs = analyzer.recommendations(&stats, &analyzer.run());
        assert!(recs.iter().all(|r| r.issue != "Frequent low pressure"));
        Ok(())
    }

    #[test]
    fn test_bad_timestamp_is_an_error() -> Result<()> {
        let (_dir, store) = temp_store();
        let conn = store.pool.get()?;
        conn.execute(
            "INSERT INTO flow_readings (recorded_at, zone_id, zone_name, flow_rate_lpm, population)
             VALUES ('yesterday', 'Z1', 'Z1 Ward', 1.0, 10)",
            [],
        )?;
        assert!(store.flow_readings().is_err());
        Ok(())
    }
}
