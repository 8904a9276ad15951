//! Env file loading
//!
//! Reads `KEY=VALUE` lines (an optional leading `export` is accepted) and sets
//! each pair in the process environment, overriding existing values.

use std::path::Path;

use tracing::debug;

use crate::error::{DatastoreError, Result};

/// Parse an env file without touching the process environment
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| env_file_error(path, e))?;
    iter.map(|item| item.map_err(|e| env_file_error(path, e)))
        .collect()
}

/// Load an env file into the process environment, returning the pairs set
pub fn load_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let pairs = read_env_file(path)?;
    for (key, value) in &pairs {
        debug!(key = %key, "Setting variable from env file");
        std::env::set_var(key, value);
    }
    Ok(pairs)
}

fn env_file_error(path: &Path, err: dotenvy::Error) -> DatastoreError {
    match err {
        dotenvy::Error::Io(source) => DatastoreError::io(path, source),
        other => DatastoreError::Entrypoint(format!("invalid env file {}: {other}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_export_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "export DATABASE_URL=postgres://db/oeem").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "SECRET_KEY='abc def'").unwrap();

        let pairs = read_env_file(file.path()).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("DATABASE_URL".to_string(), "postgres://db/oeem".to_string()),
                ("SECRET_KEY".to_string(), "abc def".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_sets_process_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "export OEEM_ENVFILE_TEST_VAR=loaded").unwrap();

        let pairs = load_env_file(file.path()).unwrap();
        assert_eq!(
            pairs,
            vec![("OEEM_ENVFILE_TEST_VAR".to_string(), "loaded".to_string())]
        );
        assert_eq!(std::env::var("OEEM_ENVFILE_TEST_VAR").unwrap(), "loaded");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_env_file(&dir.path().join("env.sh")).unwrap_err();
        assert!(matches!(err, DatastoreError::Io { .. }));
    }
}
