// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Tracker
//!
//! A `Tracker` follows an [`Envelope`](crate::Envelope) through the system. Every
//! task that receives the envelope appends a [`Stamp`], so the tracker ends up
//! holding the causal history of the data. When an envelope is split and
//! later joined again, the two histories are combined with [`Tracker::merge`].
//!

use crate::Error;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use std::{fmt, sync::OnceLock};

/// One (location, operation, time) record in a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Full name of the task or flow that received the envelope.
    pub location: String,
    /// Operation the envelope was received under.
    pub op: Option<String>,
    /// When the stamp was created.
    pub time: DateTime<Utc>,
}

impl Stamp {
    pub fn new(location: impl Into<String>, op: Option<&str>) -> Self {
        Self {
            location: location.into(),
            op: op.map(str::to_owned),
            time: Utc::now(),
        }
    }

    /// Location and operation, without the time.
    pub fn site(&self) -> String {
        format!("{}-{}", self.location, self.op.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.site(),
            self.time.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
    }
}

/// Entry of a track: a stamp, or two alternative sub-tracks that have not
/// rejoined yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackEntry {
    Stamp(Stamp),
    Branch(Vec<TrackEntry>, Vec<TrackEntry>),
}

impl TrackEntry {
    /// The stamp, when the entry is not a branch.
    pub fn stamp(&self) -> Option<&Stamp> {
        match self {
            TrackEntry::Stamp(stamp) => Some(stamp),
            TrackEntry::Branch(..) => None,
        }
    }

    fn location(&self) -> Option<&str> {
        self.stamp().map(|s| s.location.as_str())
    }
}

impl fmt::Display for TrackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackEntry::Stamp(stamp) => write!(f, "{}", stamp),
            TrackEntry::Branch(left, right) => {
                write!(f, "[{}] | [{}]", join(left), join(right))
            }
        }
    }
}

fn join(entries: &[TrackEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable causal history of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    id: String,
    track: Vec<TrackEntry>,
}

impl Tracker {
    /// Creates a tracker with a fresh id and a single stamp.
    pub fn create(location: impl Into<String>, op: Option<&str>) -> Self {
        Self {
            id: gen_id(),
            track: vec![TrackEntry::Stamp(Stamp::new(location, op))],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track(&self) -> &[TrackEntry] {
        &self.track
    }

    /// `location-op` of every top level stamp; branches are skipped.
    pub fn sites(&self) -> Vec<String> {
        self.track
            .iter()
            .filter_map(TrackEntry::stamp)
            .map(Stamp::site)
            .collect()
    }

    /// Returns a new tracker with a stamp for `location` and `op` appended.
    pub fn receive(&self, location: &str, op: Option<&str>) -> Self {
        let mut track = self.track.clone();
        track.push(TrackEntry::Stamp(Stamp::new(location, op)));
        Self {
            id: self.id.clone(),
            track,
        }
    }

    /// Combines two histories of the same tracked envelope.
    ///
    /// The common prefix is kept once. The diverging suffixes become a
    /// branch entry; when both tracks end at the same location the shared
    /// final stamp is kept after the branch, closing it.
    pub fn merge(&self, other: &Tracker) -> Result<Tracker, Error> {
        if self.id != other.id {
            return Err(Error::TrackerMismatch(
                self.id.clone(),
                other.id.clone(),
            ));
        }
        let a = &self.track;
        let b = &other.track;
        let common = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
        if common == a.len() || common == b.len() {
            // One history contains the other.
            let longer = if a.len() >= b.len() { a } else { b };
            return Ok(Tracker {
                id: self.id.clone(),
                track: longer.clone(),
            });
        }

        let mut track: Vec<TrackEntry> = a[..common].to_vec();
        let (last_a, last_b) = (&a[a.len() - 1], &b[b.len() - 1]);
        match (last_a.location(), last_b.location()) {
            (Some(la), Some(lb)) if la == lb => {
                track.push(TrackEntry::Branch(
                    a[common..a.len() - 1].to_vec(),
                    b[common..b.len() - 1].to_vec(),
                ));
                track.push(last_a.clone());
            }
            _ => {
                track.push(TrackEntry::Branch(
                    a[common..].to_vec(),
                    b[common..].to_vec(),
                ));
            }
        }
        Ok(Tracker {
            id: self.id.clone(),
            track,
        })
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tracker{{{}, track: [{}]}}", self.id, join(&self.track))
    }
}

static LAST_NANO: Mutex<i64> = Mutex::new(0);

fn machine() -> &'static str {
    static MACHINE: OnceLock<String> = OnceLock::new();
    MACHINE.get_or_init(|| {
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_owned())
    })
}

/// `host.pid.nanos`, unique within the process even under concurrent calls.
fn gen_id() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let nano = {
        let mut last = LAST_NANO.lock();
        let nano = if now <= *last { *last + 1 } else { now };
        *last = nano;
        nano
    };
    format!("{}.{}.{}", machine(), std::process::id(), nano)
}
