//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS zones (
            zone_id TEXT PRIMARY KEY,
            zone_name TEXT NOT NULL,
            population INTEGER NOT NULL,
            elevation REAL NOT NULL,
            base_pressure REAL NOT NULL,
            num_sensors INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pressure_readings (
            id INTEGER PRIMARY KEY,
            recorded_at TEXT NOT NULL,
            zone_id TEXT NOT NULL,
            zone_name TEXT NOT NULL,
            sensor_id TEXT NOT NULL,
            pressure_psi REAL NOT NULL,
            elevation REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'normal'
        );

        CREATE TABLE IF NOT EXISTS flow_readings (
            id INTEGER PRIMARY KEY,
            recorded_at TEXT NOT NULL,
            zone_id TEXT NOT NULL,
            zone_name TEXT NOT NULL,
            flow_rate_lpm REAL NOT NULL,
            population INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_pressure_zone ON pressure_readings(zone_id);

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
    )?;

    // v2: one reading per (sensor, time) and per (zone, time).
    conn.execute_batch(
        "DROP INDEX IF EXISTS idx_pressure_sensor_time;
        DROP INDEX IF EXISTS idx_flow_zone_time;

        DELETE FROM pressure_readings WHERE id NOT IN (
            SELECT MAX(id) FROM pressure_readings GROUP BY sensor_id, recorded_at
        );
        DELETE FROM flow_readings WHERE id NOT IN (
            SELECT MAX(id) FROM flow_readings GROUP BY zone_id, recorded_at
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_pressure_sensor_time
            ON pressure_readings(sensor_id, recorded_at);
        CREATE UNIQUE INDEX IF NOT EXISTS ux_flow_zone_time
            ON flow_readings(zone_id, recorded_at);

        INSERT OR IGNORE INTO schema_version (version) VALUES (2);",
    )?;

    Ok(())
}
