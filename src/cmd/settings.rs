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
use crate::error::fail;
use crate::journal::Journal;
use crate::prompt::Prompt;
use crate::settings::PasswordCheck;

pub fn show(journal: &Journal) -> Fallible<()> {
    let settings = journal.settings()?;
    println!("{}", serde_json::to_string_pretty(&settings.redacted()?)?);
    Ok(())
}

pub fn set(journal: &Journal, name: &str, value: &str) -> Fallible<()> {
    let mut settings = journal.settings()?;
    settings.set_field(name, value)?;
    settings.save(&journal.store)?;
    journal.check_quota()?;
    if name == "model" {
        if settings.api_url.is_empty() {
            println!("Model set. No known endpoint for it: set one with `settings set url URL`.");
        } else {
            println!("Model set. Endpoint: {}", settings.api_url);
        }
    } else {
        println!("Setting saved.");
    }
    Ok(())
}

/// Check the access password, or choose one if none is set.
pub fn password<P: Prompt>(journal: &Journal, prompt: &mut P) -> Fallible<()> {
    let mut settings = journal.settings()?;
    let Some(attempt) = prompt.ask("Password:") else {
        return fail("no password entered.");
    };
    match settings.verify_password(&attempt)? {
        PasswordCheck::Set => {
            settings.save(&journal.store)?;
            println!("Password set.");
        }
        PasswordCheck::Accepted => println!("Password accepted."),
        PasswordCheck::Rejected => return fail("wrong password."),
    }
    Ok(())
}
