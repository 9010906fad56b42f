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

/// Run the quota check, archiving old tasks if space is low.
pub fn clean(journal: &Journal) -> Fallible<()> {
    let status = journal.check_quota()?;
    match status.sweep.as_ref().and_then(|report| report.notice()) {
        Some(notice) => println!("{notice}"),
        None => println!("Nothing to clean up."),
    }
    println!("Storage: {}", status.usage.describe());
    Ok(())
}

/// Delete everything in the store.
pub fn clear<P: Prompt>(journal: &Journal, prompt: &mut P) -> Fallible<()> {
    if !prompt.confirm("Delete all local data? This cannot be undone.") {
        println!("Cancelled.");
        return Ok(());
    }
    {
        let _guard = journal.store.exclusive();
        journal.store.clear()?;
    }
    log::info!("All local data cleared");
    println!("All local data has been deleted.");
    Ok(())
}
