//! Sign-weighted aggregation of a chart's placements into canonical modes.
//!
//! Each placement votes with its body's weight for every mode of the family
//! bound to its sign; votes are tallied per cardinality. The dominant element
//! counts placements instead, one vote per body.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    model::{Element, TimbreProfile},
    CosmologyError, Registry,
};

const BODY_WEIGHTS: [(&str, f64); 3] = [("sun", 3.0), ("moon", 2.5), ("rising", 2.0)];
pub const DEFAULT_BODY_WEIGHT: f64 = 1.0;

pub const ZODIAC: [&str; 12] = [
    "Aries",
    "Taurus",
    "Gemini",
    "Cancer",
    "Leo",
    "Virgo",
    "Libra",
    "Scorpio",
    "Sagittarius",
    "Capricorn",
    "Aquarius",
    "Pisces",
];

pub fn body_weight(body: &str) -> f64 {
    BODY_WEIGHTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(body.trim()))
        .map(|&(_, weight)| weight)
        .unwrap_or(DEFAULT_BODY_WEIGHT)
}

/// Sign containing an ecliptic longitude in degrees.
pub fn sign_from_longitude(longitude: f64) -> &'static str {
    let index = (longitude.rem_euclid(360.0) / 30.0) as usize;
    ZODIAC[index.min(ZODIAC.len() - 1)]
}

/// A body and the sign it occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub body: String,
    pub sign: String,
}

impl Placement {
    pub fn new(body: impl Into<String>, sign: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            sign: sign.into(),
        }
    }

    pub fn from_longitude(body: impl Into<String>, longitude: f64) -> Self {
        Self::new(body, sign_from_longitude(longitude))
    }
}

impl FromStr for Placement {
    type Err = CosmologyError;

    /// Parses `Body=Sign` (or `Body:Sign`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (body, sign) = raw
            .split_once(|c: char| c == '=' || c == ':')
            .map(|(body, sign)| (body.trim(), sign.trim()))
            .filter(|(body, sign)| !body.is_empty() && !sign.is_empty())
            .ok_or_else(|| {
                CosmologyError::msg(format!("`{raw}` is not of the form Body=Sign"))
            })?;
        Ok(Self::new(body, sign))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartHarmony {
    /// Cardinality -> winning mode id.
    pub primary_modes: BTreeMap<u8, String>,
    pub dominant_element: Option<Element>,
    pub waveform: Option<String>,
    /// Timbres of the primary modes, smallest cardinality first.
    pub timbres: TimbreProfile,
    /// Signs that no family is bound to.
    pub unmatched_signs: Vec<String>,
}

/// Tallies `placements` into one primary mode per cardinality.
///
/// Equal mode votes go to the mode that comes first in canonical order,
/// whatever order the placements were given in. Equal element counts go to
/// the first element in [`Element::ALL`] order.
pub fn aggregate(registry: &Registry, placements: &[Placement]) -> ChartHarmony {
    let mut mode_votes: HashMap<usize, f64> = HashMap::new();
    let mut element_votes: BTreeMap<Element, f64> = BTreeMap::new();
    let mut unmatched_signs = Vec::new();
    let mut seen_bodies = HashSet::new();

    for placement in placements {
        if !seen_bodies.insert(placement.body.trim().to_ascii_lowercase()) {
            continue;
        }
        let weight = body_weight(&placement.body);
        let Some(family) = registry.family_for_sign(&placement.sign) else {
            tracing::debug!(
                body = %placement.body,
                sign = %placement.sign,
                "no family bound to sign"
            );
            unmatched_signs.push(placement.sign.clone());
            continue;
        };
        for member in &family.members {
            if let Some(index) = registry.index_of(member) {
                *mode_votes.entry(index).or_default() += weight;
            }
        }
        if let Some(element) = registry.family_element(family) {
            *element_votes.entry(element).or_default() += 1.0;
        }
    }

    // Highest vote wins; canonical order breaks ties.
    let mut best: BTreeMap<u8, (f64, usize)> = BTreeMap::new();
    for (&index, &votes) in &mode_votes {
        let cardinality = registry.all_modes()[index].cardinality;
        let slot = best.entry(cardinality).or_insert((votes, index));
        if votes > slot.0 || (votes == slot.0 && index < slot.1) {
            *slot = (votes, index);
        }
    }

    let mut timbres = TimbreProfile::default();
    let primary_modes: BTreeMap<u8, String> = best
        .into_iter()
        .map(|(cardinality, (_, index))| {
            let mode = &registry.all_modes()[index];
            if let Ok(association) = registry.association_of(&mode.id) {
                for tag in association.timbre.tags() {
                    timbres.push(tag.as_str());
                }
            }
            (cardinality, mode.id.clone())
        })
        .collect();

    let mut dominant_element: Option<(Element, f64)> = None;
    for (&element, &votes) in &element_votes {
        if dominant_element.map_or(true, |(_, best)| votes > best) {
            dominant_element = Some((element, votes));
        }
    }
    let dominant_element = dominant_element.map(|(element, _)| element);

    ChartHarmony {
        primary_modes,
        dominant_element,
        waveform: dominant_element.map(|element| element.waveform().to_string()),
        timbres,
        unmatched_signs,
    }
}
