//! Inline action strings carried by rendered controls.
//!
//! The wire shape is exactly `<verb>_<position>` with `verb` one of `done`
//! or `del` and `position` a run of ASCII digits. No sign, no whitespace.

use std::fmt;
use std::str::FromStr;

use crate::errors::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionVerb {
    Done,
    Delete,
}

impl ActionVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Delete => "del",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Action {
    pub verb: ActionVerb,
    pub position: usize,
}

impl Action {
    pub fn done(position: usize) -> Self {
        Self {
            verb: ActionVerb::Done,
            position,
        }
    }

    pub fn delete(position: usize) -> Self {
        Self {
            verb: ActionVerb::Delete,
            position,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.verb.as_str(), self.position)
    }
}

impl FromStr for Action {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LedgerError::InvalidInput(format!("malformed action {s:?}"));

        let (verb, digits) = s.split_once('_').ok_or_else(malformed)?;
        let verb = match verb {
            "done" => ActionVerb::Done,
            "del" => ActionVerb::Delete,
            _ => return Err(malformed()),
        };
        // usize::from_str would also accept a leading '+'
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let position = digits.parse::<usize>().map_err(|_| malformed())?;

        Ok(Self { verb, position })
    }
}
