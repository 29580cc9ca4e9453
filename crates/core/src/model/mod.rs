use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Number of semitones a degree pattern must span.
pub const OCTAVE_SEMITONES: u32 = 12;

/// The fixed set of classical elements a mode can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Fire,
    Earth,
    Air,
    Water,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Fire, Element::Earth, Element::Air, Element::Water];

    pub fn as_str(self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Earth => "earth",
            Element::Air => "air",
            Element::Water => "water",
        }
    }

    /// Spelling used by the pre-1.3.0 mapping format.
    pub fn legacy_name(self) -> &'static str {
        match self {
            Element::Fire => "Fire",
            Element::Earth => "Earth",
            Element::Air => "Air",
            Element::Water => "Water",
        }
    }

    /// Symbolic oscillator shape associated with the element. Consumers that
    /// synthesise audio decide what to do with it.
    pub fn waveform(self) -> &'static str {
        match self {
            Element::Water => "sine",
            Element::Fire => "sawtooth",
            Element::Air => "triangle",
            Element::Earth => "square",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Element {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Element::ALL
            .into_iter()
            .find(|element| element.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!("`{trimmed}` is not one of fire, earth, air, water")
            })
    }
}

/// Qualitative descriptor tags. Order is preserved, duplicates dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimbreProfile {
    tags: Vec<String>,
}

impl TimbreProfile {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut profile = Self::default();
        for tag in tags {
            profile.push(tag);
        }
        profile
    }

    pub fn push(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() && !self.tags.iter().any(|existing| existing == tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// A canonical mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub id: String,
    pub name: String,
    /// Number of scale degrees. Metadata only; resolution never branches on it.
    pub cardinality: u8,
    /// Semitone steps between consecutive degrees, wrapping to the octave.
    pub degrees: Vec<u8>,
    pub family_id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl Mode {
    /// Degree pattern in its `2-2-3-2-3` table spelling.
    pub fn pattern(&self) -> String {
        self.degrees
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Parses a `-` or whitespace separated list of semitone steps.
pub fn parse_degree_pattern(raw: &str) -> Result<Vec<u8>, String> {
    let steps = raw
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u8>() {
            Ok(step) if step > 0 => Ok(step),
            _ => Err(format!("`{part}` is not a positive semitone step")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err("pattern is empty".to_string());
    }

    let span: u32 = steps.iter().map(|&step| u32::from(step)).sum();
    if span != OCTAVE_SEMITONES {
        return Err(format!(
            "steps span {span} semitones, expected {OCTAVE_SEMITONES}"
        ));
    }
    Ok(steps)
}

/// Cluster of modes that are rotations or relatives of one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalFamily {
    pub id: String,
    #[serde(default)]
    pub sign: Option<String>,
    #[serde(default)]
    pub ordinal: Option<u32>,
    /// Member mode ids in canonical definition order.
    pub members: Vec<String>,
}

/// What an [`ElementAssociation`] is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AssociationSubject {
    Mode(String),
    Family(String),
}

impl AssociationSubject {
    pub fn id(&self) -> &str {
        match self {
            AssociationSubject::Mode(id) | AssociationSubject::Family(id) => id,
        }
    }
}

impl fmt::Display for AssociationSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationSubject::Mode(id) => write!(f, "mode `{id}`"),
            AssociationSubject::Family(id) => write!(f, "family `{id}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAssociation {
    pub subject: AssociationSubject,
    pub element: Element,
    pub timbre: TimbreProfile,
}

/// Normalised lookup key: trimmed, lower-case, whitespace and `_` runs folded
/// into a single `-`.
pub fn alias_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_dash = !key.is_empty();
            continue;
        }
        if pending_dash {
            key.push('-');
            pending_dash = false;
        }
        key.extend(c.to_lowercase());
    }
    key
}
