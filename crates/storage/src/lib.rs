use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

use shared::domain::{CarId, DriverId, ManufacturerId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredManufacturer {
    pub id: ManufacturerId,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct StoredCar {
    pub id: CarId,
    pub model: String,
    pub manufacturer_id: ManufacturerId,
}

/// A car row joined with its manufacturer, the shape every listing and
/// detail view wants.
#[derive(Debug, Clone)]
pub struct CarWithManufacturer {
    pub id: CarId,
    pub model: String,
    pub manufacturer_id: ManufacturerId,
    pub manufacturer_name: String,
}

#[derive(Debug, Clone)]
pub struct StoredDriver {
    pub id: DriverId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
}

#[derive(Debug, Clone)]
pub struct DriverCredentials {
    pub driver_id: DriverId,
    pub password_salt: String,
    pub password_digest: String,
}

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub token: String,
    pub driver_id: DriverId,
    pub visit_count: i64,
    pub created_at: DateTime<Utc>,
}

/// SQL fragments for one listable collection: what to select, where from,
/// which column the free-text filter matches, and the stable ordering.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    select: &'static str,
    from: &'static str,
    search_column: &'static str,
    order_by: &'static str,
}

pub static DRIVER_LIST: ListSpec = ListSpec {
    select: "d.id, d.username, d.first_name, d.last_name, d.license_number",
    from: "drivers d",
    search_column: "d.username",
    order_by: "d.username ASC, d.id ASC",
};

pub static CAR_LIST: ListSpec = ListSpec {
    select: "c.id, c.model, c.manufacturer_id, m.name",
    from: "cars c INNER JOIN manufacturers m ON m.id = c.manufacturer_id",
    search_column: "c.model",
    order_by: "c.id ASC",
};

pub static MANUFACTURER_LIST: ListSpec = ListSpec {
    select: "m.id, m.name, m.country",
    from: "manufacturers m",
    search_column: "m.name",
    order_by: "m.name ASC, m.id ASC",
};

const CAR_WITH_MANUFACTURER_SQL: &str =
    "SELECT c.id, c.model, c.manufacturer_id, m.name
     FROM cars c INNER JOIN manufacturers m ON m.id = c.manufacturer_id
     WHERE c.id = ?";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        // SQLite ships with foreign keys off; the cascades on cars,
        // driver_cars and sessions depend on them.
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    // ---- manufacturers ----

    pub async fn create_manufacturer(
        &self,
        name: &str,
        country: &str,
    ) -> Result<StoredManufacturer, StorageError> {
        let row = sqlx::query(
            "INSERT INTO manufacturers (name, country) VALUES (?, ?)
             RETURNING id, name, country",
        )
        .bind(name)
        .bind(country)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;
        map_manufacturer(&row).map_err(StorageError::from)
    }

    pub async fn get_manufacturer(
        &self,
        id: ManufacturerId,
    ) -> Result<Option<StoredManufacturer>, StorageError> {
        let row = sqlx::query("SELECT id, name, country FROM manufacturers WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| map_manufacturer(&r))
            .transpose()
            .map_err(StorageError::from)
    }

    pub async fn update_manufacturer(
        &self,
        id: ManufacturerId,
        name: &str,
        country: &str,
    ) -> Result<StoredManufacturer, StorageError> {
        let row = sqlx::query(
            "UPDATE manufacturers SET name = ?, country = ? WHERE id = ?
             RETURNING id, name, country",
        )
        .bind(name)
        .bind(country)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?
        .ok_or(StorageError::NotFound)?;
        map_manufacturer(&row).map_err(StorageError::from)
    }

    /// Dependent cars (and their assignment rows) go with the manufacturer.
    pub async fn delete_manufacturer(&self, id: ManufacturerId) -> Result<(), StorageError> {
        let deleted = sqlx::query("DELETE FROM manufacturers WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    // ---- cars ----

    pub async fn create_car(
        &self,
        model: &str,
        manufacturer_id: ManufacturerId,
    ) -> Result<CarWithManufacturer, StorageError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("INSERT INTO cars (model, manufacturer_id) VALUES (?, ?) RETURNING id")
            .bind(model)
            .bind(manufacturer_id.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error)?;
        let id: i64 = row.try_get(0)?;
        let car = sqlx::query(CAR_WITH_MANUFACTURER_SQL)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_car_with_manufacturer(&car).map_err(StorageError::from)
    }

    pub async fn get_car(&self, id: CarId) -> Result<Option<StoredCar>, StorageError> {
        let row = sqlx::query("SELECT id, model, manufacturer_id FROM cars WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| -> Result<StoredCar, sqlx::Error> {
                Ok(StoredCar {
                    id: CarId(r.try_get(0)?),
                    model: r.try_get(1)?,
                    manufacturer_id: ManufacturerId(r.try_get(2)?),
                })
            })
            .transpose()?)
    }

    pub async fn car_with_manufacturer(
        &self,
        id: CarId,
    ) -> Result<Option<CarWithManufacturer>, StorageError> {
        let row = sqlx::query(CAR_WITH_MANUFACTURER_SQL)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| map_car_with_manufacturer(&r))
            .transpose()
            .map_err(StorageError::from)
    }

    pub async fn update_car(
        &self,
        id: CarId,
        model: &str,
        manufacturer_id: ManufacturerId,
    ) -> Result<CarWithManufacturer, StorageError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE cars SET model = ?, manufacturer_id = ? WHERE id = ?")
            .bind(model)
            .bind(manufacturer_id.0)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?
            .rows_affected();
        if updated == 0 {
            return Err(StorageError::NotFound);
        }
        let car = sqlx::query(CAR_WITH_MANUFACTURER_SQL)
            .bind(id.0)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        map_car_with_manufacturer(&car).map_err(StorageError::from)
    }

    pub async fn delete_car(&self, id: CarId) -> Result<(), StorageError> {
        let deleted = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    // ---- drivers ----

    #[allow(clippy::too_many_arguments)]
    pub async fn create_driver(
        &self,
        username: &str,
        password_salt: &str,
        password_digest: &str,
        first_name: &str,
        last_name: &str,
        license_number: &str,
    ) -> Result<StoredDriver, StorageError> {
        let row = sqlx::query(
            "INSERT INTO drivers (username, password_salt, password_digest, first_name, last_name, license_number)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id, username, first_name, last_name, license_number",
        )
        .bind(username)
        .bind(password_salt)
        .bind(password_digest)
        .bind(first_name)
        .bind(last_name)
        .bind(license_number)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;
        map_driver(&row).map_err(StorageError::from)
    }

    pub async fn get_driver(&self, id: DriverId) -> Result<Option<StoredDriver>, StorageError> {
        let row = sqlx::query(
            "SELECT id, username, first_name, last_name, license_number FROM drivers WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| map_driver(&r))
            .transpose()
            .map_err(StorageError::from)
    }

    pub async fn credentials_for_username(
        &self,
        username: &str,
    ) -> Result<Option<DriverCredentials>, StorageError> {
        let row = sqlx::query(
            "SELECT id, password_salt, password_digest FROM drivers WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| -> Result<DriverCredentials, sqlx::Error> {
                Ok(DriverCredentials {
                    driver_id: DriverId(r.try_get(0)?),
                    password_salt: r.try_get(1)?,
                    password_digest: r.try_get(2)?,
                })
            })
            .transpose()?)
    }

    pub async fn update_driver_license(
        &self,
        id: DriverId,
        license_number: &str,
    ) -> Result<StoredDriver, StorageError> {
        let row = sqlx::query(
            "UPDATE drivers SET license_number = ? WHERE id = ?
             RETURNING id, username, first_name, last_name, license_number",
        )
        .bind(license_number)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?
        .ok_or(StorageError::NotFound)?;
        map_driver(&row).map_err(StorageError::from)
    }

    pub async fn delete_driver(&self, id: DriverId) -> Result<(), StorageError> {
        let deleted = sqlx::query("DELETE FROM drivers WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    // ---- driver <-> car assignment ----

    /// Flips the (driver, car) membership and returns the new state.
    ///
    /// The insert targets the relation's composite key, so two racing
    /// toggles on the same pair serialize here instead of both inserting.
    pub async fn toggle_assignment(
        &self,
        driver_id: DriverId,
        car_id: CarId,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO driver_cars (driver_id, car_id) VALUES (?, ?)
             ON CONFLICT(driver_id, car_id) DO NOTHING",
        )
        .bind(driver_id.0)
        .bind(car_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let assigned = if inserted > 0 {
            true
        } else {
            sqlx::query("DELETE FROM driver_cars WHERE driver_id = ? AND car_id = ?")
                .bind(driver_id.0)
                .bind(car_id.0)
                .execute(&mut *tx)
                .await?;
            false
        };
        tx.commit().await?;
        Ok(assigned)
    }

    pub async fn is_assigned(
        &self,
        driver_id: DriverId,
        car_id: CarId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM driver_cars WHERE driver_id = ? AND car_id = ?")
            .bind(driver_id.0)
            .bind(car_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn cars_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<CarWithManufacturer>, StorageError> {
        let rows = sqlx::query(
            "SELECT c.id, c.model, c.manufacturer_id, m.name
             FROM driver_cars dc
             INNER JOIN cars c ON c.id = dc.car_id
             INNER JOIN manufacturers m ON m.id = c.manufacturer_id
             WHERE dc.driver_id = ?
             ORDER BY c.id ASC",
        )
        .bind(driver_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(map_car_with_manufacturer)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)
    }

    pub async fn drivers_for_car(&self, car_id: CarId) -> Result<Vec<StoredDriver>, StorageError> {
        let rows = sqlx::query(
            "SELECT d.id, d.username, d.first_name, d.last_name, d.license_number
             FROM driver_cars dc
             INNER JOIN drivers d ON d.id = dc.driver_id
             WHERE dc.car_id = ?
             ORDER BY d.username ASC, d.id ASC",
        )
        .bind(car_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(map_driver)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)
    }

    // ---- filtered, ordered, windowed retrieval ----

    pub async fn count_collection(
        &self,
        spec: &ListSpec,
        search: Option<&str>,
    ) -> Result<u64, StorageError> {
        let count: i64 = match search.map(like_pattern) {
            Some(pattern) => {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE {} LIKE ? ESCAPE '\\'",
                    spec.from, spec.search_column
                );
                sqlx::query_scalar(&sql)
                    .bind(pattern)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {}", spec.from);
                sqlx::query_scalar(&sql).fetch_one(&self.pool).await?
            }
        };
        Ok(count as u64)
    }

    pub async fn driver_window(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<StoredDriver>, StorageError> {
        self.fetch_window(&DRIVER_LIST, search, limit, offset, map_driver)
            .await
    }

    pub async fn car_window(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CarWithManufacturer>, StorageError> {
        self.fetch_window(&CAR_LIST, search, limit, offset, map_car_with_manufacturer)
            .await
    }

    pub async fn manufacturer_window(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<StoredManufacturer>, StorageError> {
        self.fetch_window(&MANUFACTURER_LIST, search, limit, offset, map_manufacturer)
            .await
    }

    async fn fetch_window<T>(
        &self,
        spec: &ListSpec,
        search: Option<&str>,
        limit: u32,
        offset: u64,
        map: fn(&SqliteRow) -> Result<T, sqlx::Error>,
    ) -> Result<Vec<T>, StorageError> {
        let limit = i64::from(limit);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = match search.map(like_pattern) {
            Some(pattern) => {
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} LIKE ? ESCAPE '\\' ORDER BY {} LIMIT ? OFFSET ?",
                    spec.select, spec.from, spec.search_column, spec.order_by
                );
                sqlx::query(&sql)
                    .bind(pattern)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM {} ORDER BY {} LIMIT ? OFFSET ?",
                    spec.select, spec.from, spec.order_by
                );
                sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter()
            .map(map)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)
    }

    // ---- sessions ----

    pub async fn create_session(
        &self,
        token: &str,
        driver_id: DriverId,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO sessions (token, driver_id) VALUES (?, ?)")
            .bind(token)
            .bind(driver_id.0)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    pub async fn session_driver(&self, token: &str) -> Result<Option<DriverId>, StorageError> {
        let row = sqlx::query("SELECT driver_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| -> Result<DriverId, sqlx::Error> { Ok(DriverId(r.try_get(0)?)) })
            .transpose()?)
    }

    pub async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StorageError> {
        let row = sqlx::query(
            "SELECT token, driver_id, visit_count, created_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| -> Result<StoredSession, sqlx::Error> {
                Ok(StoredSession {
                    token: r.try_get(0)?,
                    driver_id: DriverId(r.try_get(1)?),
                    visit_count: r.try_get(2)?,
                    created_at: r.try_get(3)?,
                })
            })
            .transpose()?)
    }

    /// Single-statement read-modify-write; returns the new count, or None
    /// for a token with no session.
    pub async fn bump_session_visits(&self, token: &str) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query(
            "UPDATE sessions SET visit_count = visit_count + 1 WHERE token = ?
             RETURNING visit_count",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| -> Result<i64, sqlx::Error> { r.try_get(0) })
            .transpose()?)
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool, StorageError> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

fn write_error(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StorageError::Duplicate(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Database(err)
}

/// Escapes LIKE wildcards so the query string only ever matches literally,
/// then wraps it for substring containment.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{escaped}%")
}

fn map_manufacturer(row: &SqliteRow) -> Result<StoredManufacturer, sqlx::Error> {
    Ok(StoredManufacturer {
        id: ManufacturerId(row.try_get(0)?),
        name: row.try_get(1)?,
        country: row.try_get(2)?,
    })
}

fn map_car_with_manufacturer(row: &SqliteRow) -> Result<CarWithManufacturer, sqlx::Error> {
    Ok(CarWithManufacturer {
        id: CarId(row.try_get(0)?),
        model: row.try_get(1)?,
        manufacturer_id: ManufacturerId(row.try_get(2)?),
        manufacturer_name: row.try_get(3)?,
    })
}

fn map_driver(row: &SqliteRow) -> Result<StoredDriver, sqlx::Error> {
    Ok(StoredDriver {
        id: DriverId(row.try_get(0)?),
        username: row.try_get(1)?,
        first_name: row.try_get(2)?,
        last_name: row.try_get(3)?,
        license_number: row.try_get(4)?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<(), StorageError> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent)?;
    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
