//! Layered configuration.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/opsboard/config.yaml`
//! 3. **User** - `~/.opsboard/config.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `OPSBOARD_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `OPSBOARD_DB_PATH` - Database path
//! - `OPSBOARD_USER_DIR` - User config dir (default: `~/.opsboard`)
//! - `OPSBOARD_PROJECT_DIR` - Project config dir (default: `./opsboard`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
