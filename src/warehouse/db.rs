use std::path::Path;

use rusqlite::Connection;

use crate::{
    config::Database,
    warehouse::{error::WarehouseError, schema},
};

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open(path)
}

pub fn open(config: &Database) -> Result<rusqlite::Connection, WarehouseError> {
    let db = match (&config.path, config.in_memory) {
        (_, true) => open_in_memory()?,
        (Some(path), false) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    WarehouseError::Internal(anyhow::Error::new(e).context(format!(
                        "failed to create warehouse directory {}",
                        parent.to_string_lossy()
                    )))
                })?;
            }
            open_from_file(path)?
        }
        (None, false) => {
            return Err(WarehouseError::Internal(anyhow::anyhow!(
                "on-disk warehouse configured without a path"
            )));
        }
    };
    schema::init(&db)?;
    Ok(db)
}
