//! Parking zone storage operations
//!
//! Existence check, insert and in-place replace by natural key
//! `(source_file, feature_key)`. All writes run on the caller's batch
//! transaction connection.

use chrono::Utc;
use cpz_common::Result;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::ZoneRow;

/// System id of the record stored under a natural key, if any
pub async fn find_zone_id(
    conn: &mut SqliteConnection,
    source_file: &str,
    feature_key: &str,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar("SELECT id FROM parking_zones WHERE source_file = ? AND feature_key = ?")
        .bind(source_file)
        .bind(feature_key)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Insert a new record, returning its system-assigned id
pub async fn insert_zone(conn: &mut SqliteConnection, zone: &ZoneRow<'_>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    let record = &zone.feature.properties;
    let bbox = zone.bbox;

    sqlx::query(
        r#"
        INSERT INTO parking_zones (
            id, source_file, feature_key, source_index,
            name, zone_type, address, hours,
            hours_monday_friday, hours_saturday, hours_sunday,
            restriction, tariff, bays, council, source, extensions,
            geometry, geometry_type, min_lon, min_lat, max_lon, max_lat,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(zone.source_file)
    .bind(zone.feature_key)
    .bind(zone.source_index as i64)
    .bind(&record.name)
    .bind(&record.zone_type)
    .bind(&record.address)
    .bind(&record.hours)
    .bind(&record.hours_monday_friday)
    .bind(&record.hours_saturday)
    .bind(&record.hours_sunday)
    .bind(&record.restriction)
    .bind(&record.tariff)
    .bind(record.bays as i64)
    .bind(&record.council)
    .bind(&record.source)
    .bind(&zone.extensions)
    .bind(&zone.geometry)
    .bind(&zone.geometry_type)
    .bind(bbox.map(|b| b.min_lon))
    .bind(bbox.map(|b| b.min_lat))
    .bind(bbox.map(|b| b.max_lon))
    .bind(bbox.map(|b| b.max_lat))
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;

    Ok(id)
}

/// Overwrite every field of an existing record, keeping its id and created_at
pub async fn replace_zone(conn: &mut SqliteConnection, id: &str, zone: &ZoneRow<'_>) -> Result<()> {
    let record = &zone.feature.properties;
    let bbox = zone.bbox;

    sqlx::query(
        r#"
        UPDATE parking_zones SET
            source_index = ?,
            name = ?, zone_type = ?, address = ?, hours = ?,
            hours_monday_friday = ?, hours_saturday = ?, hours_sunday = ?,
            restriction = ?, tariff = ?, bays = ?, council = ?, source = ?, extensions = ?,
            geometry = ?, geometry_type = ?, min_lon = ?, min_lat = ?, max_lon = ?, max_lat = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(zone.source_index as i64)
    .bind(&record.name)
    .bind(&record.zone_type)
    .bind(&record.address)
    .bind(&record.hours)
    .bind(&record.hours_monday_friday)
    .bind(&record.hours_saturday)
    .bind(&record.hours_sunday)
    .bind(&record.restriction)
    .bind(&record.tariff)
    .bind(record.bays as i64)
    .bind(&record.council)
    .bind(&record.source)
    .bind(&zone.extensions)
    .bind(&zone.geometry)
    .bind(&zone.geometry_type)
    .bind(bbox.map(|b| b.min_lon))
    .bind(bbox.map(|b| b.min_lat))
    .bind(bbox.map(|b| b.max_lon))
    .bind(bbox.map(|b| b.max_lat))
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Number of stored records, optionally for one source file
pub async fn count_zones(pool: &SqlitePool, source_file: Option<&str>) -> Result<i64> {
    let count: i64 = match source_file {
        Some(source_file) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM parking_zones WHERE source_file = ?")
                .bind(source_file)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM parking_zones")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}
