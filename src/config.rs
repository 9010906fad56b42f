// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::error::Fallible;

/// The name of the optional configuration file in the data directory.
pub const CONFIG_FILE: &str = "dailyquiz.toml";

/// The name of the database file in the data directory.
pub const DATABASE_FILE: &str = "dailyquiz.db";

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The key-value namespace the records live in.
    pub namespace: String,
    /// The store's quota, in bytes.
    pub capacity_bytes: usize,
    /// Debug override for the archival sweep; zero disables it.
    pub force_clean_count: usize,
    /// Base URL of the remote basket service.
    pub sync_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "dailyquiz".to_string(),
            capacity_bytes: 4 * 1024 * 1024,
            force_clean_count: 0,
            sync_base_url: "https://getpantry.cloud/apiv1/pantry".to_string(),
        }
    }
}

impl Config {
    /// Load `dailyquiz.toml` from `directory`, falling back to the defaults
    /// if there is no such file.
    pub fn load(directory: &Path) -> Fallible<Self> {
        let path = directory.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No configuration file, using defaults.");
            return Ok(Self::default());
        }
        let content = read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use super::*;
    use crate::helper::create_tmp_directory;

    #[test]
    fn test_missing_file() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        assert_eq!(Config::load(dir.path())?, Config::default());
        Ok(())
    }

    #[test]
    fn test_partial_file() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        write(
            dir.path().join(CONFIG_FILE),
            "capacity_bytes = 1024\nforce_clean_count = 3\n",
        )?;
        let config = Config::load(dir.path())?;
        assert_eq!(config.capacity_bytes, 1024);
        assert_eq!(config.force_clean_count, 3);
        assert_eq!(config.namespace, "dailyquiz");
        Ok(())
    }

    #[test]
    fn test_unknown_key() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        write(dir.path().join(CONFIG_FILE), "capacity = 1\n")?;
        assert!(Config::load(dir.path()).is_err());
        Ok(())
    }
}
