use std::fmt;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Display identity of an author or committer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An identity stamped with the moment it acted.
///
/// The timestamp keeps its original UTC offset so that replayed events are
/// recorded in the timezone they were produced in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub identity: Identity,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// Sign with the current local time.
    pub fn now(identity: Identity) -> Self {
        Self {
            identity,
            when: Local::now().fixed_offset(),
        }
    }

    /// Sign with an explicit timestamp.
    pub fn at(identity: Identity, when: DateTime<FixedOffset>) -> Self {
        Self { identity, when }
    }

    /// Build a timestamp from epoch seconds and a UTC offset in minutes, the
    /// shape in which queue producers record event times.
    pub fn timestamp_from_parts(
        epoch_seconds: i64,
        offset_minutes: i32,
    ) -> Result<DateTime<FixedOffset>, TypeError> {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                TypeError::InvalidTimestamp(format!("utc offset out of range: {offset_minutes}m"))
            })?;
        offset
            .timestamp_opt(epoch_seconds, 0)
            .single()
            .ok_or_else(|| TypeError::InvalidTimestamp(format!("epoch seconds: {epoch_seconds}")))
    }

    /// Epoch seconds of the signature time.
    pub fn seconds(&self) -> i64 {
        self.when.timestamp()
    }

    /// UTC offset of the signature time, in minutes.
    pub fn offset_minutes(&self) -> i32 {
        self.when.offset().local_minus_utc() / 60
    }
}

impl fmt::Display for Signature {
    /// `Name <email> 1700000000 +0130`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.offset_minutes();
        let sign = if minutes < 0 { '-' } else { '+' };
        let abs = minutes.abs();
        write!(
            f,
            "{} {} {}{:02}{:02}",
            self.identity,
            self.seconds(),
            sign,
            abs / 60,
            abs % 60
        )
    }
}
