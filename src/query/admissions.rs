//! Hospital admission summaries
//!
//! Admissions come straight from a timeline's `Admit`, `Clinic`, `IMed` and
//! `Discharge` events; no compilation is needed.

use serde::{Deserialize, Serialize};

use crate::fragment::{Node, TimelineFragment};
use crate::timeline::{TimeStamp, parse_timestamp};

const DAYS_PER_YEAR: i32 = 365;

/// One admission or clinic visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub first: TimeStamp,
    pub last: TimeStamp,
    /// Admitting team, from the event value
    pub team: String,
    /// Admission class, from the event detail
    pub admit_class: String,
    /// Distinct drug names given during the stay, in first-given order
    pub medications: Vec<String>,
    pub is_male: bool,
    /// Age in whole years on the first day
    pub age: i32,
}

/// Summarise every admission in a timeline
///
/// `Admit` and `Clinic` open an admission; `Discharge` and `Clinic` close
/// the open one. Events without a parsable timestamp are ignored.
#[must_use]
pub fn admissions(fragment: &TimelineFragment) -> Vec<Admission> {
    let mut admissions: Vec<Admission> = Vec::new();
    let mut open: Option<usize> = None;

    for node in &fragment.nodes {
        let Node::Event(event) = node else {
            continue;
        };
        let Some(time) = event.timestamp.as_deref().and_then(parse_timestamp) else {
            continue;
        };

        if matches!(event.class.as_str(), "Admit" | "Clinic") {
            admissions.push(Admission {
                first: time,
                last: time,
                team: event.value.clone(),
                admit_class: event.detail.clone(),
                medications: Vec::new(),
                is_male: fragment.demographics.is_male,
                age: time.days / DAYS_PER_YEAR,
            });
            open = Some(admissions.len() - 1);
        }

        let Some(current) = open.map(|i| &mut admissions[i]) else {
            continue;
        };
        match event.class.as_str() {
            "IMed" => {
                for drug in event.value.split(',') {
                    let name = drug.split(':').next().unwrap_or_default().trim();
                    if !name.is_empty() && !current.medications.iter().any(|m| m == name) {
                        current.medications.push(name.to_string());
                    }
                }
            }
            "Discharge" | "Clinic" => {
                current.last = time;
                open = None;
            }
            _ => {}
        }
    }

    log::trace!("Found {} admissions", admissions.len());
    admissions
}
