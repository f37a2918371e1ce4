//! SQLite-backed feature store.
#![forbid(unsafe_code)]

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use super::schema::initialise_schema;
use super::{
    FeatureChanges, FeatureDraft, FeatureRecord, FeatureStore, FeatureStoreError,
    OsmInsertOutcome,
};
use crate::geometry::{GeometryKind, StoredGeometry};
use crate::model::{FeatureAttributes, Properties};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_FEATURE: &str = "SELECT id, name, description, geometry, srid, geometry_type,
        properties, building_number, building_type, icon, osm_id, road_type, direction,
        lane_count, max_speed, surface, created_at, updated_at
    FROM features";

/// Feature store persisting to a SQLite database file.
///
/// A connection is opened per call and dropped once the call completes, so
/// the store is cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct SqliteFeatureStore {
    path: Utf8PathBuf,
}

impl SqliteFeatureStore {
    /// Open the database at `path`, creating parent directories and the
    /// schema when missing.
    ///
    /// # Examples
    /// ```
    /// use camino::Utf8PathBuf;
    /// use mapedit_core::{FeatureStore, SqliteFeatureStore};
    ///
    /// let dir = tempfile::tempdir().expect("create temp dir");
    /// let path = Utf8PathBuf::from_path_buf(dir.path().join("features.db"))
    ///     .expect("utf-8 path");
    /// let store = SqliteFeatureStore::open(path).expect("open store");
    /// assert!(store.list().expect("list features").is_empty());
    /// ```
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, FeatureStoreError> {
        let path = path.into();
        mapedit_fs::ensure_parent_dir(&path).map_err(|source| {
            FeatureStoreError::CreateDirectory {
                path: path.clone(),
                source,
            }
        })?;
        let store = Self { path };
        let mut connection = store.connect()?;
        initialise_schema(&mut connection)?;
        Ok(store)
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, FeatureStoreError> {
        let connection = Connection::open(self.path.as_std_path()).map_err(|source| {
            FeatureStoreError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(sql("configure busy timeout"))?;
        Ok(connection)
    }

    fn with_transaction<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, FeatureStoreError>,
    ) -> Result<T, FeatureStoreError> {
        self.with_transaction_as(TransactionBehavior::Deferred, body)
    }

    /// Run `body` in a transaction that takes the write lock up front.
    ///
    /// Concurrent writers wait on the busy timeout instead of failing when a
    /// read lock cannot be upgraded.
    fn with_write_transaction<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, FeatureStoreError>,
    ) -> Result<T, FeatureStoreError> {
        self.with_transaction_as(TransactionBehavior::Immediate, body)
    }

    fn with_transaction_as<T>(
        &self,
        behavior: TransactionBehavior,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, FeatureStoreError>,
    ) -> Result<T, FeatureStoreError> {
        let mut connection = self.connect()?;
        let transaction = connection
            .transaction_with_behavior(behavior)
            .map_err(sql("begin transaction"))?;
        let value = body(&transaction)?;
        transaction.commit().map_err(sql("commit transaction"))?;
        Ok(value)
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn list(&self) -> Result<Vec<FeatureRecord>, FeatureStoreError> {
        self.with_transaction(|tx| {
            let mut statement = tx
                .prepare_cached(&format!("{SELECT_FEATURE} ORDER BY id"))
                .map_err(sql("prepare feature listing"))?;
            let rows = statement
                .query_map([], RawFeature::from_row)
                .map_err(sql("list features"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql("read feature row"))?;
            rows.into_iter().map(RawFeature::into_record).collect()
        })
    }

    fn get(&self, id: i64) -> Result<Option<FeatureRecord>, FeatureStoreError> {
        self.with_transaction(|tx| select_feature(tx, id))
    }

    fn insert(&self, draft: FeatureDraft) -> Result<FeatureRecord, FeatureStoreError> {
        self.with_transaction(|tx| {
            let now = Utc::now();
            let id = insert_draft(tx, &draft, now)?;
            Ok(FeatureRecord {
                id,
                name: draft.name,
                description: draft.description,
                geometry: draft.geometry,
                properties: draft.properties,
                attributes: draft.attributes,
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn update(
        &self,
        id: i64,
        changes: FeatureChanges,
    ) -> Result<Option<FeatureRecord>, FeatureStoreError> {
        self.with_transaction(|tx| {
            let Some(mut record) = select_feature(tx, id)? else {
                return Ok(None);
            };
            if changes.is_empty() {
                return Ok(Some(record));
            }
            changes.apply_to(&mut record);
            record.updated_at = Utc::now();
            write_feature(tx, &record)?;
            Ok(Some(record))
        })
    }

    fn delete(&self, id: i64) -> Result<bool, FeatureStoreError> {
        self.with_transaction(|tx| {
            let removed = tx
                .execute("DELETE FROM features WHERE id = ?1", [id])
                .map_err(sql("delete feature"))?;
            Ok(removed > 0)
        })
    }

    fn clear(&self) -> Result<u64, FeatureStoreError> {
        self.with_transaction(|tx| {
            let count: i64 = tx
                .query_row("SELECT COUNT(*) FROM features", [], |row| row.get(0))
                .map_err(sql("count features"))?;
            tx.execute("DELETE FROM features", [])
                .map_err(sql("delete all features"))?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    fn insert_new_by_osm_id(
        &self,
        drafts: &[FeatureDraft],
    ) -> Result<OsmInsertOutcome, FeatureStoreError> {
        self.with_write_transaction(|tx| {
            let mut outcome = OsmInsertOutcome::default();
            let now = Utc::now();
            for draft in drafts {
                if let Some(osm_id) = draft.attributes.osm_id.as_deref()
                    && osm_id_exists(tx, osm_id)?
                {
                    outcome.skipped_existing += 1;
                    continue;
                }
                insert_draft(tx, draft, now)?;
                outcome.inserted += 1;
            }
            Ok(outcome)
        })
    }
}

fn sql(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> FeatureStoreError {
    move |source| FeatureStoreError::Sqlite { operation, source }
}

fn serialise_properties(properties: &Properties) -> Result<String, FeatureStoreError> {
    serde_json::to_string(properties)
        .map_err(|source| FeatureStoreError::SerializeProperties { source })
}

fn select_feature(
    tx: &Transaction<'_>,
    id: i64,
) -> Result<Option<FeatureRecord>, FeatureStoreError> {
    let mut statement = tx
        .prepare_cached(&format!("{SELECT_FEATURE} WHERE id = ?1"))
        .map_err(sql("prepare feature lookup"))?;
    statement
        .query_row([id], RawFeature::from_row)
        .optional()
        .map_err(sql("read feature"))?
        .map(RawFeature::into_record)
        .transpose()
}

fn osm_id_exists(tx: &Transaction<'_>, osm_id: &str) -> Result<bool, FeatureStoreError> {
    let mut statement = tx
        .prepare_cached("SELECT 1 FROM features WHERE osm_id = ?1 LIMIT 1")
        .map_err(sql("prepare osm_id lookup"))?;
    statement.exists([osm_id]).map_err(sql("look up osm_id"))
}

fn insert_draft(
    tx: &Transaction<'_>,
    draft: &FeatureDraft,
    now: DateTime<Utc>,
) -> Result<i64, FeatureStoreError> {
    let properties = serialise_properties(&draft.properties)?;
    let attributes = &draft.attributes;
    let mut statement = tx
        .prepare_cached(
            "INSERT INTO features (
                name, description, geometry, srid, geometry_type, properties,
                building_number, building_type, icon, osm_id, road_type, direction,
                lane_count, max_speed, surface, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .map_err(sql("prepare feature insert"))?;
    statement
        .execute(params![
            draft.name,
            draft.description,
            draft.geometry.wkb,
            draft.geometry.srid,
            draft.geometry.kind.as_str(),
            properties,
            attributes.building_number,
            attributes.building_type,
            attributes.icon,
            attributes.osm_id,
            attributes.road_type,
            attributes.direction.map(|d| d.as_str()),
            attributes.lane_count,
            attributes.max_speed,
            attributes.surface,
            now,
            now,
        ])
        .map_err(sql("insert feature"))?;
    Ok(tx.last_insert_rowid())
}

fn write_feature(tx: &Transaction<'_>, record: &FeatureRecord) -> Result<(), FeatureStoreError> {
    let properties = serialise_properties(&record.properties)?;
    let attributes = &record.attributes;
    tx.execute(
        "UPDATE features SET
            name = ?2, description = ?3, geometry = ?4, srid = ?5, geometry_type = ?6,
            properties = ?7, building_number = ?8, building_type = ?9, icon = ?10,
            osm_id = ?11, road_type = ?12, direction = ?13, lane_count = ?14,
            max_speed = ?15, surface = ?16, updated_at = ?17
        WHERE id = ?1",
        params![
            record.id,
            record.name,
            record.description,
            record.geometry.wkb,
            record.geometry.srid,
            record.geometry.kind.as_str(),
            properties,
            attributes.building_number,
            attributes.building_type,
            attributes.icon,
            attributes.osm_id,
            attributes.road_type,
            attributes.direction.map(|d| d.as_str()),
            attributes.lane_count,
            attributes.max_speed,
            attributes.surface,
            record.updated_at,
        ],
    )
    .map(|_| ())
    .map_err(sql("update feature"))
}

/// Column values as read from SQLite, before domain validation.
struct RawFeature {
    id: i64,
    name: Option<String>,
    description: Option<String>,
    geometry: Vec<u8>,
    srid: i32,
    geometry_type: String,
    properties: String,
    building_number: Option<String>,
    building_type: Option<String>,
    icon: Option<String>,
    osm_id: Option<String>,
    road_type: Option<String>,
    direction: Option<String>,
    lane_count: Option<i64>,
    max_speed: Option<i64>,
    surface: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawFeature {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            geometry: row.get(3)?,
            srid: row.get(4)?,
            geometry_type: row.get(5)?,
            properties: row.get(6)?,
            building_number: row.get(7)?,
            building_type: row.get(8)?,
            icon: row.get(9)?,
            osm_id: row.get(10)?,
            road_type: row.get(11)?,
            direction: row.get(12)?,
            lane_count: row.get(13)?,
            max_speed: row.get(14)?,
            surface: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }

    fn into_record(self) -> Result<FeatureRecord, FeatureStoreError> {
        let id = self.id;
        let invalid = |reason: String| FeatureStoreError::InvalidRow { id, reason };

        let kind: GeometryKind = self
            .geometry_type
            .parse()
            .map_err(|err| invalid(format!("{err}")))?;
        let properties: Properties = serde_json::from_str(&self.properties)
            .map_err(|err| invalid(format!("properties are not a JSON object: {err}")))?;
        let direction = self
            .direction
            .map(|value| value.parse())
            .transpose()
            .map_err(|err| invalid(format!("{err}")))?;
        let count = |column: &str, value: Option<i64>| {
            value
                .map(u32::try_from)
                .transpose()
                .map_err(|_| invalid(format!("{column} is out of range")))
        };

        Ok(FeatureRecord {
            id,
            name: self.name,
            description: self.description,
            geometry: StoredGeometry {
                srid: self.srid,
                kind,
                wkb: self.geometry,
            },
            properties,
            attributes: FeatureAttributes {
                building_number: self.building_number,
                building_type: self.building_type,
                icon: self.icon,
                osm_id: self.osm_id,
                road_type: self.road_type,
                direction,
                lane_count: count("lane_count", self.lane_count)?,
                max_speed: count("max_speed", self.max_speed)?,
                surface: self.surface,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
