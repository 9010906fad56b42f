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

use clap::Parser;
use clap::Subcommand;
use env_logger::Env;
use log::LevelFilter;

use crate::cmd::drill::drill;
use crate::cmd::drill::redo_task;
use crate::cmd::drill::show;
use crate::cmd::settings;
use crate::cmd::stats::StatsFormat;
use crate::cmd::stats::print_stats;
use crate::cmd::stats::print_task_list;
use crate::cmd::storage::clean;
use crate::cmd::storage::clear;
use crate::cmd::sync::push;
use crate::cmd::sync::restore;
use crate::error::Fallible;
use crate::journal::Journal;
use crate::prompt::Terminal;
use crate::types::date::Date;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the data directory. Defaults to the current directory.
    #[arg(long, global = true)]
    directory: Option<String>,
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer the questions for a day.
    Drill {
        /// The day, as YYYY-MM-DD. Defaults to today.
        date: Option<String>,
        /// Allow submitting with questions left unanswered.
        #[arg(long)]
        ignore_unanswered: bool,
    },
    /// Print a day's task without changing it.
    Show {
        date: String,
    },
    /// Discard a day's task and start it over.
    Redo {
        date: String,
    },
    /// List all tasks, newest first.
    List,
    /// Print statistics.
    Stats {
        #[arg(long, default_value_t = StatsFormat::Json)]
        format: StatsFormat,
    },
    /// Archive old tasks if storage is running low.
    Clean,
    /// Upload a backup to the remote basket.
    Push,
    /// Replace local data with the remote backup.
    Restore {
        /// Restore from this basket instead, and make it the default.
        #[arg(long)]
        basket: Option<String>,
    },
    /// View or change settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Delete all local data.
    Clear,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the settings, with secrets masked.
    Show,
    /// Change a setting: model, url, key, count, prompt, pantry-key, basket, or debug.
    Set { key: String, value: String },
    /// Check the access password, or choose one.
    Password,
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    init_logging(cli.debug);
    let journal = Journal::new(cli.directory)?;
    match journal.settings() {
        Ok(settings) if settings.debug_mode => enable_debug_logging(),
        Ok(_) => {}
        Err(e) => log::error!("Failed to read settings: {}", e.message()),
    }
    // Not fatal: `clear` and `restore` have to run on a store that is full.
    if let Err(e) = journal.check_quota() {
        log::error!("Storage check failed: {}", e.message());
    }
    match cli.command {
        Command::Drill {
            date,
            ignore_unanswered,
        } => {
            let date = match date {
                Some(date) => Date::parse(&date)?,
                None => journal.today(),
            };
            drill(&journal, date, ignore_unanswered).await
        }
        Command::Show { date } => show(&journal, Date::parse(&date)?),
        Command::Redo { date } => redo_task(&journal, Date::parse(&date)?, &mut Terminal),
        Command::List => print_task_list(&journal),
        Command::Stats { format } => print_stats(&journal, format),
        Command::Clean => clean(&journal),
        Command::Push => push(&journal).await,
        Command::Restore { basket } => restore(&journal, &mut Terminal, basket).await,
        Command::Settings { command } => match command {
            SettingsCommand::Show => settings::show(&journal),
            SettingsCommand::Set { key, value } => settings::set(&journal, &key, &value),
            SettingsCommand::Password => settings::password(&journal, &mut Terminal),
        },
        Command::Clear => clear(&journal, &mut Terminal),
    }
}

/// The logger lets everything through; the level is set separately, so that
/// the persisted debug flag can raise it once the store is open. An explicit
/// `RUST_LOG` always wins.
fn init_logging(debug: bool) {
    env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();
    if std::env::var_os("RUST_LOG").is_none() && !debug {
        log::set_max_level(LevelFilter::Info);
    }
}

fn enable_debug_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Debug);
    }
}
