use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{
    ExperimentTracker, ModelArtifact, ModelReference, ModelRegistry, ModelVersion,
    RegisteredModel, RunHandle, RunStatus,
};
use rusqlite::{params, Connection, OptionalExtension};

use crate::serde::{from_json_slice, to_canonical_json_bytes};
use crate::tracker::{
    canonical_string, missing_model, run_row, table_columns, unknown_run, Query, RunRecord, Table,
};

const RUNS_FILE: &str = "runs.csv";
const MODELS_DIR: &str = "models";

fn wrap_csv(code: &str, err: csv::Error) -> LfbError {
    LfbError::Tracker(ErrorInfo::new(code, "CSV tracker failure").with_hint(err.to_string()))
}

fn io_error(code: &str, path: &Path, err: std::io::Error) -> LfbError {
    LfbError::Tracker(
        ErrorInfo::new(code, "tracker filesystem failure")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

fn sqlite_error(code: &str, message: &str, err: rusqlite::Error) -> LfbError {
    LfbError::Tracker(ErrorInfo::new(code, message).with_hint(err.to_string()))
}

/// Directory backed tracker.
///
/// Open runs are buffered in memory; `finish_run` appends one row to
/// `runs.csv`. Registered models are written immediately as
/// `models/<name>/<version>.json`.
#[derive(Debug)]
pub struct CsvTracker {
    dir: PathBuf,
    open: BTreeMap<String, RunRecord>,
    next_run: usize,
}

impl CsvTracker {
    /// Opens (creating when needed) the tracker directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LfbError> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(MODELS_DIR))
            .map_err(|err| io_error("tracker-csv-create", &dir, err))?;
        let runs_path = dir.join(RUNS_FILE);
        let recorded = if runs_path.exists() {
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .from_path(&runs_path)
                .map_err(|err| wrap_csv("tracker-csv-read", err))?;
            reader.records().count()
        } else {
            0
        };
        Ok(Self {
            dir,
            open: BTreeMap::new(),
            next_run: recorded + 1,
        })
    }

    /// Lists runs recorded under `dir`.
    pub fn query(dir: &Path, query: &Query) -> Result<Table, LfbError> {
        let path = dir.join(RUNS_FILE);
        let mut rows = Vec::new();
        if path.exists() {
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .from_path(&path)
                .map_err(|err| wrap_csv("tracker-csv-read", err))?;
            for result in reader.records() {
                let record = result.map_err(|err| wrap_csv("tracker-csv-record", err))?;
                if !query.matches(record.get(1).unwrap_or_default()) {
                    continue;
                }
                rows.push(record.iter().map(|s| s.to_string()).collect::<Vec<_>>());
                if query.limit.is_some_and(|limit| rows.len() >= limit) {
                    break;
                }
            }
        }
        Ok(Table {
            columns: table_columns(),
            rows,
        })
    }

    fn open_run(&mut self, run: &RunHandle) -> Result<&mut RunRecord, LfbError> {
        self.open.get_mut(&run.run_id).ok_or_else(|| unknown_run(run))
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.dir.join(MODELS_DIR).join(name)
    }

    fn versions(&self, name: &str) -> Result<Vec<u32>, LfbError> {
        let dir = self.model_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|err| io_error("tracker-csv-list", &dir, err))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_error("tracker-csv-list", &dir, err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(version) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
            {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn append_row(&self, record: &RunRecord) -> Result<(), LfbError> {
        let path = self.dir.join(RUNS_FILE);
        let file_exists = path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|err| io_error("tracker-csv-open", &path, err))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        if !file_exists {
            writer
                .write_record(table_columns())
                .map_err(|err| wrap_csv("tracker-csv-header", err))?;
        }
        writer
            .write_record(run_row(record)?)
            .map_err(|err| wrap_csv("tracker-csv-row", err))?;
        writer
            .flush()
            .map_err(|err| io_error("tracker-csv-flush", &path, err))?;
        Ok(())
    }
}

impl ExperimentTracker for CsvTracker {
    fn start_run(&mut self, experiment: &str) -> Result<RunHandle, LfbError> {
        let run_id = format!("run-{:06}", self.next_run);
        self.next_run += 1;
        self.open
            .insert(run_id.clone(), RunRecord::open(run_id.clone(), experiment));
        Ok(RunHandle {
            run_id,
            experiment: experiment.to_string(),
        })
    }

    fn log_param(&mut self, run: &RunHandle, name: &str, value: &str) -> Result<(), LfbError> {
        self.open_run(run)?
            .params
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn log_metric(&mut self, run: &RunHandle, name: &str, value: f64) -> Result<(), LfbError> {
        self.open_run(run)?.metrics.insert(name.to_string(), value);
        Ok(())
    }

    fn register_model(
        &mut self,
        run: &RunHandle,
        artifact: &ModelArtifact,
        name: &str,
    ) -> Result<ModelReference, LfbError> {
        self.open_run(run)?;
        let version = self.versions(name)?.last().copied().unwrap_or(0) + 1;
        let reference = ModelReference {
            name: name.to_string(),
            version,
        };
        let model = RegisteredModel {
            reference: reference.clone(),
            run_id: Some(run.run_id.clone()),
            artifact: artifact.clone(),
        };
        let dir = self.model_dir(name);
        fs::create_dir_all(&dir).map_err(|err| io_error("tracker-csv-create", &dir, err))?;
        let path = dir.join(format!("{version}.json"));
        fs::write(&path, to_canonical_json_bytes(&model)?)
            .map_err(|err| io_error("tracker-csv-model", &path, err))?;
        self.open_run(run)?.models.push(reference.clone());
        Ok(reference)
    }

    fn finish_run(&mut self, run: &RunHandle, status: RunStatus) -> Result<(), LfbError> {
        let mut record = self.open.remove(&run.run_id).ok_or_else(|| unknown_run(run))?;
        record.status = Some(status);
        self.append_row(&record)
    }
}

impl ModelRegistry for CsvTracker {
    fn resolve(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, LfbError> {
        let versions = self.versions(name)?;
        let wanted = match version {
            ModelVersion::Latest => versions.last().copied(),
            ModelVersion::Exact(wanted) => versions.iter().copied().find(|v| *v == wanted),
        }
        .ok_or_else(|| missing_model(name, version))?;
        let path = self.model_dir(name).join(format!("{wanted}.json"));
        let bytes = fs::read(&path).map_err(|err| io_error("tracker-csv-model", &path, err))?;
        from_json_slice(&bytes)
    }
}

/// SQLite backed tracker.
pub struct SqliteTracker {
    conn: Connection,
}

impl std::fmt::Debug for SqliteTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTracker").finish_non_exhaustive()
    }
}

impl SqliteTracker {
    /// Opens the database at `path`, creating the schema when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LfbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| io_error("tracker-sqlite-create", parent, err))?;
        }
        let conn = Connection::open(path).map_err(|err| {
            LfbError::Tracker(
                ErrorInfo::new("tracker-sqlite-open", "failed to open sqlite tracker")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Self::with_connection(conn)
    }

    /// Wraps an existing connection (e.g. `Connection::open_in_memory`).
    pub fn with_connection(conn: Connection) -> Result<Self, LfbError> {
        conn.execute_batch(
            r#"CREATE TABLE IF NOT EXISTS runs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL UNIQUE,
                experiment TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS params (
                run_id TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (run_id, name)
            );
            CREATE TABLE IF NOT EXISTS metrics (
                run_id TEXT NOT NULL,
                name TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (run_id, name)
            );
            CREATE TABLE IF NOT EXISTS models (
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                run_id TEXT,
                artifact TEXT NOT NULL,
                PRIMARY KEY (name, version)
            );"#,
        )
        .map_err(|err| sqlite_error("tracker-sqlite-schema", "failed to ensure tracker schema", err))?;
        Ok(Self { conn })
    }

    /// Lists runs recorded in the database at `path`.
    pub fn query(path: &Path, query: &Query) -> Result<Table, LfbError> {
        if !path.exists() {
            return Ok(Table {
                columns: table_columns(),
                rows: Vec::new(),
            });
        }
        Self::open(path)?.table(query)
    }

    /// Run listing filtered by `query`, in start order.
    pub fn table(&self, query: &Query) -> Result<Table, LfbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT run_id, experiment, status FROM runs ORDER BY seq")
            .map_err(|err| sqlite_error("tracker-sqlite-prepare", "failed to prepare run query", err))?;
        let heads = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|err| sqlite_error("tracker-sqlite-query", "failed to query runs", err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| sqlite_error("tracker-sqlite-row", "failed to read run row", err))?;

        let mut rows = Vec::new();
        for (run_id, experiment, status) in heads {
            if !query.matches(&experiment) {
                continue;
            }
            let record = self.load_record(run_id, experiment)?;
            let mut row = run_row(&record)?;
            row[2] = status;
            rows.push(row);
            if query.limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
        }
        Ok(Table {
            columns: table_columns(),
            rows,
        })
    }

    fn load_record(&self, run_id: String, experiment: String) -> Result<RunRecord, LfbError> {
        let mut record = RunRecord::open(run_id, &experiment);
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM params WHERE run_id = ?1")
            .map_err(|err| sqlite_error("tracker-sqlite-prepare", "failed to prepare param query", err))?;
        let params = stmt
            .query_map([&record.run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| sqlite_error("tracker-sqlite-row", "failed to read params", err))?;
        record.params.extend(params);

        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM metrics WHERE run_id = ?1")
            .map_err(|err| sqlite_error("tracker-sqlite-prepare", "failed to prepare metric query", err))?;
        let metrics = stmt
            .query_map([&record.run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| sqlite_error("tracker-sqlite-row", "failed to read metrics", err))?;
        record.metrics.extend(metrics);

        let mut stmt = self
            .conn
            .prepare("SELECT name, version FROM models WHERE run_id = ?1 ORDER BY name, version")
            .map_err(|err| sqlite_error("tracker-sqlite-prepare", "failed to prepare model query", err))?;
        let models = stmt
            .query_map([&record.run_id], |row| {
                Ok(ModelReference {
                    name: row.get(0)?,
                    version: row.get(1)?,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| sqlite_error("tracker-sqlite-row", "failed to read models", err))?;
        record.models = models;
        Ok(record)
    }

    fn ensure_open(&self, run: &RunHandle) -> Result<(), LfbError> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM runs WHERE run_id = ?1",
                [&run.run_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| sqlite_error("tracker-sqlite-query", "failed to look up run", err))?;
        match status.as_deref() {
            Some("running") => Ok(()),
            _ => Err(unknown_run(run)),
        }
    }
}

impl ExperimentTracker for SqliteTracker {
    fn start_run(&mut self, experiment: &str) -> Result<RunHandle, LfbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
            .map_err(|err| sqlite_error("tracker-sqlite-query", "failed to count runs", err))?;
        let run_id = format!("run-{:06}", count + 1);
        self.conn
            .execute(
                "INSERT INTO runs (run_id, experiment, status) VALUES (?1, ?2, 'running')",
                params![&run_id, experiment],
            )
            .map_err(|err| sqlite_error("tracker-sqlite-insert", "failed to start run", err))?;
        Ok(RunHandle {
            run_id,
            experiment: experiment.to_string(),
        })
    }

    fn log_param(&mut self, run: &RunHandle, name: &str, value: &str) -> Result<(), LfbError> {
        self.ensure_open(run)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO params (run_id, name, value) VALUES (?1, ?2, ?3)",
                params![&run.run_id, name, value],
            )
            .map_err(|err| sqlite_error("tracker-sqlite-insert", "failed to log param", err))?;
        Ok(())
    }

    fn log_metric(&mut self, run: &RunHandle, name: &str, value: f64) -> Result<(), LfbError> {
        self.ensure_open(run)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metrics (run_id, name, value) VALUES (?1, ?2, ?3)",
                params![&run.run_id, name, value],
            )
            .map_err(|err| sqlite_error("tracker-sqlite-insert", "failed to log metric", err))?;
        Ok(())
    }

    fn register_model(
        &mut self,
        run: &RunHandle,
        artifact: &ModelArtifact,
        name: &str,
    ) -> Result<ModelReference, LfbError> {
        self.ensure_open(run)?;
        let payload = canonical_string(artifact)?;
        let tx = self
            .conn
            .transaction()
            .map_err(|err| sqlite_error("tracker-sqlite-transaction", "failed to start transaction", err))?;
        let latest: u32 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM models WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .map_err(|err| sqlite_error("tracker-sqlite-query", "failed to read model versions", err))?;
        let reference = ModelReference {
            name: name.to_string(),
            version: latest + 1,
        };
        tx.execute(
            "INSERT INTO models (name, version, run_id, artifact) VALUES (?1, ?2, ?3, ?4)",
            params![name, reference.version, &run.run_id, payload],
        )
        .map_err(|err| sqlite_error("tracker-sqlite-insert", "failed to register model", err))?;
        tx.commit()
            .map_err(|err| sqlite_error("tracker-sqlite-commit", "failed to commit model", err))?;
        Ok(reference)
    }

    fn finish_run(&mut self, run: &RunHandle, status: RunStatus) -> Result<(), LfbError> {
        self.ensure_open(run)?;
        self.conn
            .execute(
                "UPDATE runs SET status = ?1 WHERE run_id = ?2",
                params![status.as_str(), &run.run_id],
            )
            .map_err(|err| sqlite_error("tracker-sqlite-update", "failed to finish run", err))?;
        Ok(())
    }
}

impl ModelRegistry for SqliteTracker {
    fn resolve(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, LfbError> {
        let row: Option<(u32, Option<String>, String)> = match version {
            ModelVersion::Latest => self.conn.query_row(
                "SELECT version, run_id, artifact FROM models WHERE name = ?1
                 ORDER BY version DESC LIMIT 1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            ),
            ModelVersion::Exact(wanted) => self.conn.query_row(
                "SELECT version, run_id, artifact FROM models WHERE name = ?1 AND version = ?2",
                params![name, wanted],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            ),
        }
        .optional()
        .map_err(|err| LfbError::Registry(ErrorInfo::new("registry-sqlite-query", err.to_string())))?;
        let (resolved, run_id, artifact) = row.ok_or_else(|| missing_model(name, version))?;
        let artifact: ModelArtifact = from_json_slice(artifact.as_bytes())?;
        Ok(RegisteredModel {
            reference: ModelReference {
                name: name.to_string(),
                version: resolved,
            },
            run_id,
            artifact,
        })
    }
}
