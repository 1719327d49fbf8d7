//! Workspace bootstrap.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AdminConfig;
use crate::log;
use crate::registry::{ConfigDb, Protocol};

/// Default config template written by `geoconf init`.
const CONFIG_TEMPLATE: &str = r#"# geoconf configuration

[storage]
# Base directory for rendered assets (symbols/ and print/ live below it).
assets_dir = "assets"
# Base directory for verbatim uploads.
uploads_dir = "uploads"

[database]
path = "config.sqlite"

[access]
# Role whose grants apply to anonymous viewers.
public_role = "public"
"#;

/// Create the config file (if missing), the database schema, the two
/// protocol root layer groups and the public role. Safe to re-run.
pub fn init_workspace(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        log!("init"; "using existing {}", config_path.display());
    } else {
        fs::write(config_path, CONFIG_TEMPLATE)
            .with_context(|| format!("cannot write {}", config_path.display()))?;
        log!("init"; "created {}", config_path.display());
    }

    let config = AdminConfig::load(config_path)?;
    let db = ConfigDb::open(config.db_path(), &config.access.public_role)?;

    db.ensure_public_role()?;
    for protocol in [Protocol::Wms, Protocol::Wfs] {
        db.ensure_service_root(protocol)?;
    }

    log!("init"; "database ready at {}", config.db_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_and_is_rerunnable() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("geoconf.toml");

        init_workspace(&config_path).unwrap();
        assert!(config_path.exists());
        assert!(dir.path().join("config.sqlite").exists());

        // second run must not fail or duplicate roots
        init_workspace(&config_path).unwrap();

        let db = ConfigDb::open(dir.path().join("config.sqlite"), "public").unwrap();
        assert!(db.service_root(Protocol::Wms).unwrap().is_some());
        assert!(db.service_root(Protocol::Wfs).unwrap().is_some());
        assert!(db.role_id("public").unwrap().is_some());
    }
}
