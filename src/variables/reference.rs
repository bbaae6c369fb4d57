//! Variable reference tokens
//!
//! Grammar: `Name`, `Name[offset]`, `Name[start:stop]` or `Name[@start:stop]`,
//! each optionally followed by `.function`. Offsets are whole days; negative
//! offsets look into the past and positive ones into the future. A leading
//! `@` makes the range relative to the day matched by the previous reference.

use std::fmt;

use super::descriptor::DescriptorTable;
use crate::error::{Result, TdfError};
use crate::functions::FunctionSpec;

/// How the day window of a reference is anchored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RangeMode {
    /// Relative to the current time point
    #[default]
    Nearest,
    /// Relative to the day matched by the previous reference in the same row
    RelativeToLastMatch,
}

/// A parsed variable token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableReference {
    /// Base variable name, as found in the descriptor table
    pub name: String,
    /// First day of the window, relative to the anchor
    pub start: i32,
    /// Last day of the window, relative to the anchor
    pub stop: i32,
    pub mode: RangeMode,
    pub function: Option<FunctionSpec>,
}

impl VariableReference {
    /// Parse a token, checking the base name against `table`
    pub fn parse(token: &str, table: &DescriptorTable) -> Result<Self> {
        let reference = Self::parse_unchecked(token)?;
        if !table.contains(&reference.name) {
            return Err(TdfError::UnknownVariable(reference.name));
        }
        Ok(reference)
    }

    /// Parse a token without consulting a descriptor table
    pub fn parse_unchecked(token: &str) -> Result<Self> {
        let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
        let malformed = |reason: &str| TdfError::MalformedReference {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let (body, function) = match compact.split_once('.') {
            Some((body, function_name)) => (body, Some(FunctionSpec::parse(function_name, token)?)),
            None => (compact.as_str(), None),
        };

        let (name, start, stop, mode) = match body.split_once('[') {
            None => (body, 0, 0, RangeMode::Nearest),
            Some((name, rest)) => {
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| malformed("missing closing ']'"))?;
                let (mode, inner) = match inner.strip_prefix('@') {
                    Some(stripped) => (RangeMode::RelativeToLastMatch, stripped),
                    None => (RangeMode::Nearest, inner),
                };
                let parse_offset = |text: &str| -> Result<i32> {
                    if text.is_empty() {
                        return Ok(0);
                    }
                    text.parse::<i32>()
                        .map_err(|_| malformed(&format!("offset '{text}' is not a whole number")))
                };
                let (start, stop) = match inner.split_once(':') {
                    Some((start, stop)) => (parse_offset(start)?, parse_offset(stop)?),
                    None => {
                        let offset = parse_offset(inner)?;
                        (offset, offset)
                    }
                };
                (name, start, stop, mode)
            }
        };

        if name.is_empty() {
            return Err(malformed("empty variable name"));
        }

        Ok(Self {
            name: name.to_string(),
            start,
            stop,
            mode,
            function,
        })
    }

    /// A plain reference to `name` on the current day
    #[must_use]
    pub fn current(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: 0,
            stop: 0,
            mode: RangeMode::Nearest,
            function: None,
        }
    }

    /// Both offsets are zero
    #[must_use]
    pub const fn is_current_day(&self) -> bool {
        self.start == 0 && self.stop == 0
    }

    /// Resolution reads the current snapshot without any search
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.is_current_day() && self.function.is_none()
    }
}

impl fmt::Display for VariableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.is_current_day() || self.mode == RangeMode::RelativeToLastMatch {
            let at = if self.mode == RangeMode::RelativeToLastMatch { "@" } else { "" };
            if self.start == self.stop && at.is_empty() {
                write!(f, "[{}]", self.start)?;
            } else {
                write!(f, "[{at}{}:{}]", self.start, self.stop)?;
            }
        }
        if let Some(function) = &self.function {
            write!(f, ".{function}")?;
        }
        Ok(())
    }
}

/// Split a `;`-separated variable list, skipping empty entries
pub fn split_variable_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(';').map(str::trim).filter(|s| !s.is_empty())
}
