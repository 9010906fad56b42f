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

use std::env::current_dir;
use std::path::PathBuf;

use crate::config::Config;
use crate::config::DATABASE_FILE;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::quota::QuotaMonitor;
use crate::quota::QuotaStatus;
use crate::settings::Settings;
use crate::store::Store;
use crate::types::date::Date;
use crate::types::timestamp::Timestamp;

/// Everything a command needs: the data directory, its configuration and
/// store, and the date the command runs on.
pub struct Journal {
    pub directory: PathBuf,
    pub config: Config,
    pub store: Store,
    monitor: QuotaMonitor,
    today: Date,
}

impl Journal {
    pub fn new(directory: Option<String>) -> Fallible<Self> {
        let directory: PathBuf = match directory {
            Some(dir) => PathBuf::from(dir),
            None => current_dir()?,
        };
        let directory = if directory.exists() {
            directory.canonicalize()?
        } else {
            return fail("directory does not exist.");
        };
        let config = Config::load(&directory)?;
        Self::with_config(directory, config, Timestamp::now().local_date())
    }

    pub fn with_config(directory: PathBuf, config: Config, today: Date) -> Fallible<Self> {
        let db_path: PathBuf = directory.join(DATABASE_FILE);
        let db_path: &str = db_path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        let store = Store::new(db_path, &config.namespace, config.capacity_bytes)?;
        let monitor = QuotaMonitor::new(config.force_clean_count);
        log::debug!("Opened journal at {} on {today}", directory.display());
        Ok(Self {
            directory,
            config,
            store,
            monitor,
            today,
        })
    }

    pub fn today(&self) -> Date {
        self.today
    }

    pub fn settings(&self) -> Fallible<Settings> {
        Settings::load(&self.store)
    }

    /// Run the quota check. Called after each batch of writes.
    pub fn check_quota(&self) -> Fallible<QuotaStatus> {
        let status = self.monitor.check_and_maybe_archive(&self.store, self.today)?;
        if let Some(report) = &status.sweep {
            log::debug!("Sweep visited {} records", report.processed);
            if let Some(notice) = report.notice() {
                log::info!("{notice}");
            }
        }
        if status.warning {
            log::warn!(
                "Storage is nearly full ({}). Old tasks are archived automatically.",
                status.usage.describe()
            );
        }
        Ok(status)
    }
}
