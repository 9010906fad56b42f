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

use serde::Serialize;

use crate::archive::SweepReport;
use crate::archive::sweep;
use crate::error::Fallible;
use crate::store::Store;
use crate::store::entry_cost;
use crate::types::date::Date;

/// Below this much free space, the archival sweep runs.
const LOW_SPACE_PERCENT: f64 = 20.0;

/// How full the store is.
#[derive(Clone, Copy, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub used: usize,
    pub total: usize,
    /// Free space as a percentage of `total`, in `0..=100`.
    pub remaining_percent: f64,
}

impl Usage {
    pub fn describe(&self) -> String {
        const MB: f64 = 1024.0 * 1024.0;
        format!(
            "{:.2}MB / {:.2}MB, {:.2}% remaining",
            self.used as f64 / MB,
            self.total as f64 / MB,
            self.remaining_percent
        )
    }
}

pub fn usage(store: &Store) -> Fallible<Usage> {
    let used: usize = store
        .entries()?
        .iter()
        .map(|(key, value)| entry_cost(key, value))
        .sum();
    let total = store.capacity();
    let remaining_percent = if total == 0 {
        0.0
    } else {
        (total.saturating_sub(used) as f64 / total as f64) * 100.0
    };
    Ok(Usage {
        used,
        total,
        remaining_percent,
    })
}

/// The outcome of a quota check.
#[derive(Debug)]
pub struct QuotaStatus {
    pub usage: Usage,
    /// Whether the low-space warning should be shown.
    pub warning: bool,
    /// Present when the archival sweep ran.
    pub sweep: Option<SweepReport>,
}

/// Watches the store's usage and archives old records when space runs low.
///
/// The check is a separate step, run by callers once a batch of writes is
/// done. The sweep writes through the plain store, so it never re-enters the
/// monitor.
pub struct QuotaMonitor {
    /// Debug override: when non-zero, every check sweeps, and each sweep
    /// processes at least this many records.
    force_clean_count: usize,
}

impl QuotaMonitor {
    pub fn new(force_clean_count: usize) -> Self {
        Self { force_clean_count }
    }

    pub fn check_and_maybe_archive(&self, store: &Store, today: Date) -> Fallible<QuotaStatus> {
        let usage = usage(store)?;
        log::info!("Storage usage: {}", usage.describe());
        if self.force_clean_count == 0 && usage.remaining_percent >= LOW_SPACE_PERCENT {
            return Ok(QuotaStatus {
                usage,
                warning: false,
                sweep: None,
            });
        }
        log::warn!("Storage space is low, archiving old records.");
        match sweep(store, self.force_clean_count, today)? {
            Some(report) => Ok(QuotaStatus {
                usage: report.after,
                warning: report.warning(),
                sweep: Some(report),
            }),
            None => Ok(QuotaStatus {
                usage,
                warning: true,
                sweep: None,
            }),
        }
    }
}
