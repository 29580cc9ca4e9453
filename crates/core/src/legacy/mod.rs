//! Pre-1.3.0 mapping shapes, produced from the canonical [`Registry`].
//!
//! Nothing here validates or caches anything; every function is a straight
//! translation of registry contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CosmologyError, Registry, Result};

/// One entry of the legacy mode map. Field names are part of the external
/// contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyModeRecord {
    pub mode_id: String,
    pub mode_name: String,
    pub element: String,
    pub signs: String,
    pub semitone_pattern: String,
    pub notes: String,
}

/// Mode id -> legacy record.
pub type LegacyMap = BTreeMap<String, LegacyModeRecord>;

/// One entry of the legacy sign-keyed family index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyFamilyRow {
    pub sign: String,
    pub family_id: String,
    pub element: String,
    pub pentatonic_mode_id: String,
    pub quadratonic_mode_id: String,
}

/// Result of [`load_table`]; the variant depends on the requested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LegacyTable {
    Modes(LegacyMap),
    FamilyIndex(BTreeMap<String, LegacyFamilyRow>),
    ElementTimbres(BTreeMap<String, Vec<String>>),
}

/// Every canonical mode in the legacy record format, keyed by mode id.
pub fn load_map(registry: &Registry) -> LegacyMap {
    records_where(registry, |_| true)
}

/// Legacy per-file loader. Accepts the file names older callers passed.
pub fn load_table(registry: &Registry, file_name: &str) -> Result<LegacyTable> {
    match file_name.trim() {
        "pentatonic_modes.csv" => Ok(LegacyTable::Modes(records_where(registry, |c| c == 5))),
        "quadratonic_modes.csv" => Ok(LegacyTable::Modes(records_where(registry, |c| c == 4))),
        "modes.csv" => Ok(LegacyTable::Modes(load_map(registry))),
        "modal_families_index.csv" => Ok(LegacyTable::FamilyIndex(family_index(registry))),
        "element_timbres.csv" => Ok(LegacyTable::ElementTimbres(element_timbres(registry))),
        other => Err(CosmologyError::NotFound {
            query: other.to_string(),
            nearest: None,
        }),
    }
}

fn records_where(registry: &Registry, keep: impl Fn(u8) -> bool) -> LegacyMap {
    registry
        .all_modes()
        .iter()
        .filter(|mode| keep(mode.cardinality))
        .map(|mode| {
            let element = registry
                .effective_association(mode)
                .map(|association| association.element.legacy_name().to_string())
                .unwrap_or_default();
            let signs = registry
                .family(&mode.family_id)
                .and_then(|family| family.sign.clone())
                .unwrap_or_default();
            (
                mode.id.clone(),
                LegacyModeRecord {
                    mode_id: mode.id.clone(),
                    mode_name: mode.name.clone(),
                    element,
                    signs,
                    semitone_pattern: mode.pattern(),
                    notes: mode.notes.clone(),
                },
            )
        })
        .collect()
}

fn family_index(registry: &Registry) -> BTreeMap<String, LegacyFamilyRow> {
    registry
        .families()
        .iter()
        .filter_map(|family| {
            let sign = family.sign.clone()?;
            let member_with = |cardinality: u8| {
                family
                    .members
                    .iter()
                    .filter_map(|member| registry.mode(member))
                    .find(|mode| mode.cardinality == cardinality)
                    .map(|mode| mode.id.clone())
                    .unwrap_or_default()
            };
            let element = registry
                .family_element(family)
                .map(|element| element.legacy_name().to_string())
                .unwrap_or_default();
            Some((
                sign.clone(),
                LegacyFamilyRow {
                    sign,
                    family_id: family.id.clone(),
                    element,
                    pentatonic_mode_id: member_with(5),
                    quadratonic_mode_id: member_with(4),
                },
            ))
        })
        .collect()
}

/// Element -> timbre tags of its family-level associations, in canonical
/// family order.
fn element_timbres(registry: &Registry) -> BTreeMap<String, Vec<String>> {
    let mut timbres: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for family in registry.families() {
        let Some(association) = registry.family_association(&family.id) else {
            continue;
        };
        let tags = timbres
            .entry(association.element.legacy_name().to_string())
            .or_default();
        for tag in association.timbre.tags() {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }
    timbres
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::{fixtures::FixtureTables, load},
        tables::TableSet,
    };

    const PRE_1_3_FIXTURE: &str = include_str!("../../fixtures/legacy_map_v1_2.json");

    fn bundled() -> Registry {
        load(&TableSet::bundled().unwrap()).unwrap()
    }

    #[test]
    fn legacy_modes_match_the_pre_1_3_fixture() {
        let expected: LegacyMap = serde_json::from_str(PRE_1_3_FIXTURE).unwrap();
        let map = load_map(&bundled());

        assert_eq!(expected.len(), 12);
        for (mode_id, record) in &expected {
            assert_eq!(map.get(mode_id), Some(record), "legacy record for {mode_id}");
        }
    }

    #[test]
    fn legacy_json_shape_is_stable() {
        let expected: serde_json::Value = serde_json::from_str(PRE_1_3_FIXTURE).unwrap();
        let actual = serde_json::to_value(load_map(&bundled())).unwrap();
        for (mode_id, record) in expected.as_object().unwrap() {
            assert_eq!(&actual[mode_id], record);
        }
    }

    #[test]
    fn new_modes_are_additive() {
        let map = load_map(&bundled());
        assert_eq!(map.len(), 24);
        let quad = &map["QUAD-PIS-1"];
        assert_eq!(quad.element, "Water");
        assert_eq!(quad.signs, "Pisces");
        assert_eq!(quad.semitone_pattern, "4-3-2-3");
    }

    #[test]
    fn legacy_map_has_one_record_per_mode() {
        let fixture = FixtureTables::canonical();
        for registry in [bundled(), load(&fixture.tables()).unwrap()] {
            let map = load_map(&registry);
            let ids: Vec<&str> = registry.all_modes().iter().map(|m| m.id.as_str()).collect();
            assert_eq!(map.len(), ids.len());
            for id in ids {
                assert!(!map[id].element.is_empty(), "element for {id}");
            }
        }
    }

    #[test]
    fn per_file_tables_follow_the_old_dispatch() {
        let registry = bundled();

        match load_table(&registry, "pentatonic_modes.csv").unwrap() {
            LegacyTable::Modes(modes) => {
                assert_eq!(modes.len(), 12);
                assert!(modes.keys().all(|id| id.starts_with("PENT-")));
            }
            other => panic!("unexpected {other:?}"),
        }

        match load_table(&registry, "modal_families_index.csv").unwrap() {
            LegacyTable::FamilyIndex(index) => {
                let leo = &index["Leo"];
                assert_eq!(leo.pentatonic_mode_id, "PENT-LEO-1");
                assert_eq!(leo.quadratonic_mode_id, "QUAD-LEO-1");
                assert_eq!(leo.element, "Fire");
            }
            other => panic!("unexpected {other:?}"),
        }

        match load_table(&registry, "element_timbres.csv").unwrap() {
            LegacyTable::ElementTimbres(timbres) => {
                assert_eq!(timbres.len(), 4);
                assert_eq!(timbres["Fire"][0], "brass stabs");
                assert_eq!(
                    timbres["Fire"].iter().filter(|t| *t == "brass stabs").count(),
                    1
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(load_table(&registry, "aspects.csv").is_err());
    }
}
