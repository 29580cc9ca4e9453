//! Validated construction of a [`Registry`] from a [`TableSet`].
//!
//! Checks run in three stages and the first failure aborts the load:
//!
//! 1. structural: required columns, cell parsing, duplicate primary keys;
//! 2. referential: every foreign key resolves and every mode reaches an
//!    element through a direct or family-level association;
//! 3. cardinality: the canonical set holds exactly [`CANONICAL_MODE_COUNT`]
//!    modes.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    model::{
        parse_degree_pattern, AssociationSubject, Element, ElementAssociation, ModalFamily, Mode,
        TimbreProfile,
    },
    tables::{RawTable, TableSet},
    CosmologyError, Registry, Result,
};

/// Size of the canonical cosmology.
pub const CANONICAL_MODE_COUNT: usize = 24;

const MODE_COLUMNS: [&str; 5] = [
    "mode_id",
    "mode_name",
    "cardinality",
    "semitone_pattern",
    "family_id",
];
const FAMILY_COLUMNS: [&str; 2] = ["family_id", "members"];
const ELEMENT_COLUMNS: [&str; 2] = ["element", "timbres"];

/// Per-category counts gathered while building a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub modes: usize,
    pub families: usize,
    pub associations: usize,
    /// Distinct lookup keys in the alias index.
    pub aliases: usize,
    pub modes_by_cardinality: BTreeMap<u8, usize>,
    pub modes_by_element: BTreeMap<Element, usize>,
}

/// A parsed record and the source line it came from.
#[derive(Debug, Clone)]
struct Sourced<T> {
    line: u64,
    value: T,
}

#[derive(Debug, Default)]
struct ParsedTables {
    modes: Vec<Sourced<Mode>>,
    families: Vec<Sourced<ModalFamily>>,
    associations: Vec<Sourced<ElementAssociation>>,
}

/// Validates `tables` and builds a registry. Nothing is returned unless
/// every check passes.
pub fn load(tables: &TableSet) -> Result<Registry> {
    let parsed = check_structure(tables)?;
    tracing::debug!(
        modes = parsed.modes.len(),
        families = parsed.families.len(),
        associations = parsed.associations.len(),
        "structural checks passed"
    );

    check_references(tables, &parsed)?;
    tracing::debug!("referential checks passed");

    check_cardinality(tables, &parsed)?;

    let registry = Registry::from_parts(
        parsed.modes.into_iter().map(|m| m.value).collect(),
        parsed.families.into_iter().map(|f| f.value).collect(),
        parsed.associations.into_iter().map(|a| a.value).collect(),
    );
    let report = registry.report();
    tracing::info!(
        modes = report.modes,
        families = report.families,
        associations = report.associations,
        aliases = report.aliases,
        "mode cosmology loaded"
    );
    Ok(registry)
}

fn check_structure(tables: &TableSet) -> Result<ParsedTables> {
    Ok(ParsedTables {
        modes: parse_modes(&tables.modes)?,
        families: parse_families(&tables.families)?,
        associations: parse_associations(&tables.elements)?,
    })
}

fn parse_modes(table: &RawTable) -> Result<Vec<Sourced<Mode>>> {
    table.require_columns(&MODE_COLUMNS)?;

    let mut seen: HashMap<String, u64> = HashMap::new();
    let mut modes = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let id = table.required(row, "mode_id")?;
        reject_duplicate(table, &mut seen, id, row.line, "mode_id")?;

        let raw_cardinality = table.required(row, "cardinality")?;
        let cardinality = match raw_cardinality.parse::<u8>() {
            Ok(value) if value > 0 => value,
            _ => {
                return Err(CosmologyError::validation(
                    table.location(Some(row.line), "cardinality"),
                    format!("`{raw_cardinality}` is not a positive degree count"),
                ))
            }
        };

        let degrees = parse_degree_pattern(table.required(row, "semitone_pattern")?)
            .map_err(|reason| {
                CosmologyError::validation(
                    table.location(Some(row.line), "semitone_pattern"),
                    reason,
                )
            })?;
        if degrees.len() != usize::from(cardinality) {
            return Err(CosmologyError::validation(
                table.location(Some(row.line), "semitone_pattern"),
                format!(
                    "pattern has {} steps but cardinality is {cardinality}",
                    degrees.len()
                ),
            ));
        }

        modes.push(Sourced {
            line: row.line,
            value: Mode {
                id: id.to_string(),
                name: table.required(row, "mode_name")?.to_string(),
                cardinality,
                degrees,
                family_id: table.required(row, "family_id")?.to_string(),
                aliases: table.list(row, "aliases"),
                notes: table.cell(row, "notes").unwrap_or_default().to_string(),
            },
        });
    }
    Ok(modes)
}

fn parse_families(table: &RawTable) -> Result<Vec<Sourced<ModalFamily>>> {
    table.require_columns(&FAMILY_COLUMNS)?;

    let mut seen: HashMap<String, u64> = HashMap::new();
    let mut families = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let id = table.required(row, "family_id")?;
        reject_duplicate(table, &mut seen, id, row.line, "family_id")?;

        let ordinal = match table.cell(row, "ordinal").filter(|v| !v.is_empty()) {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                CosmologyError::validation(
                    table.location(Some(row.line), "ordinal"),
                    format!("`{raw}` is not an integer position"),
                )
            })?),
            None => None,
        };

        let members = table.list(row, "members");
        {
            let mut listed = HashSet::new();
            if let Some(repeat) = members.iter().find(|member| !listed.insert(member.as_str())) {
                return Err(CosmologyError::validation(
                    table.location(Some(row.line), "members"),
                    format!("mode `{repeat}` is listed more than once"),
                ));
            }
        }

        families.push(Sourced {
            line: row.line,
            value: ModalFamily {
                id: id.to_string(),
                sign: table
                    .cell(row, "sign")
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                ordinal,
                members,
            },
        });
    }
    Ok(families)
}

fn parse_associations(table: &RawTable) -> Result<Vec<Sourced<ElementAssociation>>> {
    table.require_columns(&ELEMENT_COLUMNS)?;
    if !table.has_column("family_id") && !table.has_column("mode_id") {
        return Err(CosmologyError::validation(
            table.location(None, "family_id"),
            "table needs a `family_id` or `mode_id` column",
        ));
    }

    let mut seen_families: HashMap<String, u64> = HashMap::new();
    let mut seen_modes: HashMap<String, u64> = HashMap::new();
    let mut associations = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let family = table.cell(row, "family_id").filter(|v| !v.is_empty());
        let mode = table.cell(row, "mode_id").filter(|v| !v.is_empty());
        let subject = match (family, mode) {
            (Some(family), None) => {
                reject_duplicate(table, &mut seen_families, family, row.line, "family_id")?;
                AssociationSubject::Family(family.to_string())
            }
            (None, Some(mode)) => {
                reject_duplicate(table, &mut seen_modes, mode, row.line, "mode_id")?;
                AssociationSubject::Mode(mode.to_string())
            }
            _ => {
                return Err(CosmologyError::validation(
                    table.location(Some(row.line), "family_id"),
                    "exactly one of `family_id` or `mode_id` must be set",
                ))
            }
        };

        let element = table
            .required(row, "element")?
            .parse::<Element>()
            .map_err(|reason| {
                CosmologyError::validation(table.location(Some(row.line), "element"), reason)
            })?;
        table.required(row, "timbres")?;

        associations.push(Sourced {
            line: row.line,
            value: ElementAssociation {
                subject,
                element,
                timbre: TimbreProfile::new(table.list(row, "timbres")),
            },
        });
    }
    Ok(associations)
}

fn reject_duplicate(
    table: &RawTable,
    seen: &mut HashMap<String, u64>,
    key: &str,
    line: u64,
    field: &str,
) -> Result<()> {
    if let Some(first) = seen.insert(key.to_string(), line) {
        return Err(CosmologyError::validation(
            table.location(Some(line), field),
            format!("duplicate key `{key}`, first defined on line {first}"),
        ));
    }
    Ok(())
}

fn check_references(tables: &TableSet, parsed: &ParsedTables) -> Result<()> {
    let modes: HashMap<&str, &Mode> = parsed
        .modes
        .iter()
        .map(|m| (m.value.id.as_str(), &m.value))
        .collect();
    let families: HashMap<&str, &ModalFamily> = parsed
        .families
        .iter()
        .map(|f| (f.value.id.as_str(), &f.value))
        .collect();
    let modes_table = &tables.modes;
    let families_table = &tables.families;
    let elements_table = &tables.elements;

    for sourced in &parsed.modes {
        let mode = &sourced.value;
        let Some(family) = families.get(mode.family_id.as_str()) else {
            return Err(CosmologyError::integrity(
                modes_table.location(Some(sourced.line), "family_id"),
                format!(
                    "family `{}` is not defined in {}",
                    mode.family_id,
                    families_table.name()
                ),
            ));
        };
        if !family.members.iter().any(|member| member == &mode.id) {
            return Err(CosmologyError::integrity(
                modes_table.location(Some(sourced.line), "family_id"),
                format!(
                    "mode `{}` is not listed among the members of family `{}`",
                    mode.id, family.id
                ),
            ));
        }
    }

    for sourced in &parsed.families {
        let family = &sourced.value;
        if family.members.is_empty() {
            return Err(CosmologyError::integrity(
                families_table.location(Some(sourced.line), "members"),
                format!("family `{}` has no members", family.id),
            ));
        }
        for member in &family.members {
            let Some(mode) = modes.get(member.as_str()) else {
                return Err(CosmologyError::integrity(
                    families_table.location(Some(sourced.line), "members"),
                    format!("mode `{member}` is not defined in {}", modes_table.name()),
                ));
            };
            if mode.family_id != family.id {
                return Err(CosmologyError::integrity(
                    families_table.location(Some(sourced.line), "members"),
                    format!(
                        "mode `{member}` belongs to family `{}`, not `{}`",
                        mode.family_id, family.id
                    ),
                ));
            }
        }
    }

    let mut direct = HashSet::new();
    let mut by_family = HashSet::new();
    for sourced in &parsed.associations {
        match &sourced.value.subject {
            AssociationSubject::Mode(id) => {
                if !modes.contains_key(id.as_str()) {
                    return Err(CosmologyError::integrity(
                        elements_table.location(Some(sourced.line), "mode_id"),
                        format!("mode `{id}` is not defined in {}", modes_table.name()),
                    ));
                }
                direct.insert(id.as_str());
            }
            AssociationSubject::Family(id) => {
                if !families.contains_key(id.as_str()) {
                    return Err(CosmologyError::integrity(
                        elements_table.location(Some(sourced.line), "family_id"),
                        format!("family `{id}` is not defined in {}", families_table.name()),
                    ));
                }
                by_family.insert(id.as_str());
            }
        }
    }

    for sourced in &parsed.modes {
        let mode = &sourced.value;
        if !direct.contains(mode.id.as_str()) && !by_family.contains(mode.family_id.as_str()) {
            return Err(CosmologyError::integrity(
                modes_table.location(Some(sourced.line), "mode_id"),
                format!(
                    "mode `{}` has no element: neither it nor family `{}` appears in {}",
                    mode.id,
                    mode.family_id,
                    elements_table.name()
                ),
            ));
        }
    }

    Ok(())
}

fn check_cardinality(tables: &TableSet, parsed: &ParsedTables) -> Result<()> {
    let found = parsed.modes.len();
    if found != CANONICAL_MODE_COUNT {
        return Err(CosmologyError::integrity(
            tables.modes.location(None, "mode_id"),
            format!("expected {CANONICAL_MODE_COUNT} canonical modes, found {found}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic table sets built around the seven diatonic modes.

    use crate::tables::TableSet;

    pub const DIATONIC: [(&str, &str, &str); 7] = [
        ("ionian", "Ionian", "2-2-1-2-2-2-1"),
        ("dorian", "Dorian", "2-1-2-2-2-1-2"),
        ("phrygian", "Phrygian", "1-2-2-2-1-2-2"),
        ("lydian", "Lydian", "2-2-2-1-2-2-1"),
        ("mixolydian", "Mixolydian", "2-2-1-2-2-1-2"),
        ("aeolian", "Aeolian", "2-1-2-2-1-2-2"),
        ("locrian", "Locrian", "1-2-2-1-2-2-2"),
    ];

    pub struct FixtureTables {
        pub modes: String,
        pub families: String,
        pub elements: String,
    }

    impl FixtureTables {
        /// Seven diatonic modes plus `fillers` quadratonic modes in their own
        /// family. `fillers = 17` yields the canonical 24.
        pub fn with_fillers(fillers: usize) -> Self {
            let mut modes =
                String::from("mode_id,mode_name,cardinality,semitone_pattern,family_id,aliases\n");
            for (id, name, pattern) in DIATONIC {
                let aliases = match id {
                    "dorian" => "doric;hypophrygian",
                    "ionian" => "major",
                    "aeolian" => "natural minor",
                    _ => "",
                };
                modes.push_str(&format!("{id},{name},7,{pattern},rotational-major,{aliases}\n"));
            }
            let filler_ids: Vec<String> = (1..=fillers).map(|n| format!("tetra-{n:02}")).collect();
            for id in &filler_ids {
                modes.push_str(&format!("{id},Tetra {id},4,3-3-3-3,tetrads,\n"));
            }

            let diatonic_ids: Vec<&str> = DIATONIC.iter().map(|(id, _, _)| *id).collect();
            let mut families = format!(
                "family_id,members\nrotational-major,{}\n",
                diatonic_ids.join(";")
            );
            if !filler_ids.is_empty() {
                families.push_str(&format!("tetrads,{}\n", filler_ids.join(";")));
            }

            let elements = String::from(
                "family_id,mode_id,element,timbres\n\
                 rotational-major,,air,bright\n\
                 tetrads,,earth,dark;woody\n",
            );

            Self {
                modes,
                families,
                elements,
            }
        }

        pub fn canonical() -> Self {
            Self::with_fillers(17)
        }

        pub fn tables(&self) -> TableSet {
            TableSet::from_texts(&self.modes, &self.families, &self.elements)
                .expect("fixture tables parse")
        }
    }
}
