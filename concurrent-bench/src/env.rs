//! Benchmark environment: one fresh store per run, removed afterwards.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::BenchConfig;
use crate::error::StoreError;
use crate::schema::create_schema;
use crate::store::StoreHandle;

/// Files SQLite may leave next to the store in WAL mode.
const SIDECAR_SUFFIXES: [&str; 3] = ["", "-wal", "-shm"];

/// Owns the run's single [`StoreHandle`]. Everything that uses the handle
/// borrows it from here, so it cannot be torn down while still in use.
pub struct BenchEnvironment {
    handle: StoreHandle,
    path: PathBuf,
}

impl BenchEnvironment {
    /// Delete any leftover store, open a fresh one, bound the pool and create
    /// the schema. Any failure here is fatal to the run.
    pub fn setup(config: &BenchConfig) -> Result<Self, StoreError> {
        Self::setup_with(config, create_schema)
    }

    /// `setup` with the schema step supplied by the caller. If it fails the
    /// handle is closed and the fresh store files are removed again.
    fn setup_with(
        config: &BenchConfig,
        init_schema: fn(&StoreHandle) -> Result<(), StoreError>,
    ) -> Result<Self, StoreError> {
        remove_store_files(&config.db_path)?;

        let handle = StoreHandle::open_with(&config.db_path, config.store_options())?;
        handle.configure_pool(config.max_open, config.max_idle);
        if let Err(e) = init_schema(&handle) {
            let _ = handle.close();
            drop(handle);
            if let Err(cleanup) = remove_store_files(&config.db_path) {
                log::warn!("Failed setup left files behind: {cleanup}");
            }
            return Err(e);
        }

        log::info!(
            "Store ready at {} (max_open={}, max_idle={})",
            config.db_path.display(),
            config.max_open,
            config.max_idle
        );
        Ok(Self {
            handle,
            path: config.db_path.clone(),
        })
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the handle, then delete the store file and its WAL sidecars.
    pub fn teardown(self) -> Result<(), StoreError> {
        let BenchEnvironment { handle, path } = self;
        if handle.close().is_err() {
            log::warn!("Store handle was closed before teardown");
        }
        drop(handle);
        remove_store_files(&path)?;
        log::info!("Removed store at {}", path.display());
        Ok(())
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_store_files(path: &Path) -> Result<(), StoreError> {
    for suffix in SIDECAR_SUFFIXES {
        let file = sidecar(path, suffix);
        match fs::remove_file(&file) {
            Ok(()) => log::debug!("Removed {}", file.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Cleanup { path: file, source }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::row_count;
    use tempfile::TempDir;

    #[test]
    fn setup_replaces_stale_store() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::at(dir.path().join("env.db"));
        fs::write(&config.db_path, b"stale garbage, not a database").unwrap();
        fs::write(sidecar(&config.db_path, "-wal"), b"stale wal").unwrap();

        let env = BenchEnvironment::setup(&config).unwrap();
        assert_eq!(row_count(env.handle()).unwrap(), 0);
        let stats = env.handle().pool_stats();
        assert_eq!(stats.max_open, 20);
        assert_eq!(stats.max_idle, 10);

        env.teardown().unwrap();
        for suffix in SIDECAR_SUFFIXES {
            assert!(!sidecar(&config.db_path, suffix).exists(), "{suffix} left behind");
        }
    }

    #[test]
    fn setup_fails_when_directory_is_missing() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::at(dir.path().join("missing/env.db"));
        assert!(matches!(
            BenchEnvironment::setup(&config),
            Err(StoreError::Open { .. })
        ));
    }

    #[test]
    fn setup_fails_when_store_path_is_a_directory() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::at(dir.path().join("occupied"));
        fs::create_dir(&config.db_path).unwrap();
        assert!(matches!(
            BenchEnvironment::setup(&config),
            Err(StoreError::Cleanup { .. })
        ));
    }

    #[test]
    fn failed_schema_step_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::at(dir.path().join("env.db"));

        // Write through the handle so the WAL sidecars exist, then fail.
        fn write_then_fail(handle: &StoreHandle) -> Result<(), StoreError> {
            handle.execute("CREATE TABLE scratch (id INTEGER PRIMARY KEY)", [])?;
            create_schema(handle)?;
            create_schema(handle)
        }

        let err = BenchEnvironment::setup_with(&config, write_then_fail)
            .err()
            .expect("schema step should fail");
        assert!(matches!(err, StoreError::Schema(_)), "{err}");
        for suffix in SIDECAR_SUFFIXES {
            assert!(!sidecar(&config.db_path, suffix).exists(), "{suffix} left behind");
        }
    }

    #[test]
    fn teardown_after_manual_close_still_removes_files() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::at(dir.path().join("env.db"));
        let env = BenchEnvironment::setup(&config).unwrap();
        env.handle().close().unwrap();

        env.teardown().unwrap();
        assert!(!config.db_path.exists());
    }
}
