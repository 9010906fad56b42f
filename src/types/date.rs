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

use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveDate;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;

/// The key format for per-day records.
const KEY_FORMAT: &str = "%Y-%m-%d";

/// A calendar date. Each date owns at most one record, stored under its
/// `YYYY-MM-DD` key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Date(NaiveDate);

impl Date {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a store key. Only keys of exactly the form `YYYY-MM-DD` are
    /// record keys; anything else returns `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        let bytes = key.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return None;
        }
        NaiveDate::parse_from_str(key, KEY_FORMAT).ok().map(Self)
    }

    /// Parse user input, rejecting anything that isn't a record key.
    pub fn parse(s: &str) -> Fallible<Self> {
        Self::from_key(s.trim()).ok_or_else(|| {
            ErrorReport::with_kind(
                ErrorKind::Validation,
                format!("invalid date '{s}', expected YYYY-MM-DD"),
            )
        })
    }

    pub fn key(self) -> String {
        self.0.format(KEY_FORMAT).to_string()
    }

    pub fn minus_days(self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// English name of the weekday, lowercase.
    pub fn weekday_name(self) -> &'static str {
        match self.0.weekday().num_days_from_sunday() {
            0 => "sunday",
            1 => "monday",
            2 => "tuesday",
            3 => "wednesday",
            4 => "thursday",
            5 => "friday",
            _ => "saturday",
        }
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
