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

use crate::error::Fallible;
use crate::journal::Journal;
use crate::prompt::Prompt;
use crate::sync::RestoreOutcome;
use crate::sync::SyncClient;

pub async fn push(journal: &Journal) -> Fallible<()> {
    let client = SyncClient::new(&journal.config.sync_base_url);
    let report = client.push(journal).await?;
    println!(
        "Uploaded {} entries to basket {}.",
        report.entries, report.basket
    );
    Ok(())
}

pub async fn restore<P: Prompt>(
    journal: &Journal,
    prompt: &mut P,
    basket: Option<String>,
) -> Fallible<()> {
    let client = SyncClient::new(&journal.config.sync_base_url);
    match client.restore(journal, prompt, basket.as_deref()).await? {
        RestoreOutcome::Cancelled => println!("Cancelled."),
        RestoreOutcome::Restored { basket, entries } => {
            println!("Restored {entries} entries from basket {basket}.");
        }
    }
    Ok(())
}
