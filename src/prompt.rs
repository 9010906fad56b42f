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

use std::io::BufRead;
use std::io::Write;
use std::io::stdin;
use std::io::stdout;

/// How the user is asked to confirm an action or type a line of text.
pub trait Prompt {
    /// Ask a yes/no question.
    fn confirm(&mut self, message: &str) -> bool;

    /// Ask for a line of text. `None` if there is no more input.
    fn ask(&mut self, message: &str) -> Option<String>;
}

/// Prompts on standard input and output.
pub struct Terminal;

impl Terminal {
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                log::error!("Failed to read from stdin: {e}");
                None
            }
        }
    }
}

impl Prompt for Terminal {
    fn confirm(&mut self, message: &str) -> bool {
        print!("{message} [y/N] ");
        let _ = stdout().flush();
        match self.read_line() {
            Some(line) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }

    fn ask(&mut self, message: &str) -> Option<String> {
        print!("{message} ");
        let _ = stdout().flush();
        self.read_line()
    }
}
