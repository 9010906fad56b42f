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

use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;

use crate::error::Fallible;
use crate::journal::Journal;
use crate::stats::stats;
use crate::stats::task_list;

#[derive(ValueEnum, Clone)]
pub enum StatsFormat {
    /// Plain text output.
    Text,
    /// JSON output.
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

pub fn print_stats(journal: &Journal, format: StatsFormat) -> Fallible<()> {
    let stats = stats(&journal.store)?;
    match format {
        StatsFormat::Text => {
            println!("Tasks completed: {}", stats.completed_total);
            println!("  of which archived: {}", stats.completed_archived);
            println!("Tasks stored: {}", stats.records);
            println!("Storage: {}", stats.usage.describe());
        }
        StatsFormat::Json => {
            let stats_json = serde_json::to_string_pretty(&stats)?;
            println!("{}", stats_json);
        }
    }
    Ok(())
}

pub fn print_task_list(journal: &Journal) -> Fallible<()> {
    let today = journal.today();
    for entry in task_list(journal)? {
        println!("{}", entry.label(today));
    }
    Ok(())
}
