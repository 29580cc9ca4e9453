use std::collections::{BTreeMap, HashMap};

use crate::{
    loader::LoadReport,
    model::{alias_key, AssociationSubject, Element, ElementAssociation, ModalFamily, Mode},
    CosmologyError, Result,
};

/// Read-only snapshot of the canonical cosmology.
///
/// Built once by [`crate::loader::load`] and never mutated afterwards, so a
/// shared reference can be queried from any number of threads. To pick up new
/// tables, build a fresh registry and swap it in (see
/// [`crate::engine::SharedEngine`]).
#[derive(Debug, Clone)]
pub struct Registry {
    /// Canonical order: by family, then by the family's member order.
    modes: Vec<Mode>,
    mode_index: HashMap<String, usize>,
    families: Vec<ModalFamily>,
    family_index: HashMap<String, usize>,
    sign_index: HashMap<String, usize>,
    direct: HashMap<String, ElementAssociation>,
    by_family: HashMap<String, ElementAssociation>,
    /// Normalised key -> indexes into `modes`, ascending and unique.
    aliases: BTreeMap<String, Vec<usize>>,
    report: LoadReport,
}

impl Registry {
    /// Assembles already validated records. Only the loader calls this.
    pub(crate) fn from_parts(
        modes: Vec<Mode>,
        mut families: Vec<ModalFamily>,
        associations: Vec<ElementAssociation>,
    ) -> Self {
        families.sort_by(|a, b| {
            (a.ordinal.is_none(), a.ordinal, &a.id).cmp(&(b.ordinal.is_none(), b.ordinal, &b.id))
        });

        let mut pending: HashMap<String, Mode> =
            modes.into_iter().map(|mode| (mode.id.clone(), mode)).collect();
        let mut ordered = Vec::with_capacity(pending.len());
        for family in &families {
            for member in &family.members {
                if let Some(mode) = pending.remove(member) {
                    ordered.push(mode);
                }
            }
        }
        let mut leftovers: Vec<Mode> = pending.into_values().collect();
        leftovers.sort_by(|a, b| a.id.cmp(&b.id));
        ordered.extend(leftovers);

        let mode_index = ordered
            .iter()
            .enumerate()
            .map(|(index, mode)| (mode.id.clone(), index))
            .collect();
        let family_index = families
            .iter()
            .enumerate()
            .map(|(index, family)| (family.id.clone(), index))
            .collect();
        let sign_index = families
            .iter()
            .enumerate()
            .filter_map(|(index, family)| {
                family.sign.as_deref().map(|sign| (alias_key(sign), index))
            })
            .collect();

        let association_count = associations.len();
        let mut direct = HashMap::new();
        let mut by_family = HashMap::new();
        for association in associations {
            match &association.subject {
                AssociationSubject::Mode(id) => {
                    direct.insert(id.clone(), association);
                }
                AssociationSubject::Family(id) => {
                    by_family.insert(id.clone(), association);
                }
            }
        }

        let mut aliases: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, mode) in ordered.iter().enumerate() {
            let keys = std::iter::once(mode.id.as_str())
                .chain(std::iter::once(mode.name.as_str()))
                .chain(mode.aliases.iter().map(String::as_str));
            for key in keys.map(alias_key).filter(|key| !key.is_empty()) {
                let slots = aliases.entry(key).or_default();
                if !slots.contains(&index) {
                    slots.push(index);
                }
            }
        }

        let mut registry = Self {
            modes: ordered,
            mode_index,
            families,
            family_index,
            sign_index,
            direct,
            by_family,
            aliases,
            report: LoadReport::default(),
        };
        registry.report = registry.tally(association_count);
        registry
    }

    fn tally(&self, associations: usize) -> LoadReport {
        let mut report = LoadReport {
            modes: self.modes.len(),
            families: self.families.len(),
            associations,
            aliases: self.aliases.len(),
            ..LoadReport::default()
        };
        for mode in &self.modes {
            *report
                .modes_by_cardinality
                .entry(mode.cardinality)
                .or_default() += 1;
            if let Some(association) = self.effective_association(mode) {
                *report
                    .modes_by_element
                    .entry(association.element)
                    .or_default() += 1;
            }
        }
        report
    }

    /// Counts gathered while loading.
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Every canonical mode in canonical order.
    pub fn all_modes(&self) -> &[Mode] {
        &self.modes
    }

    /// Families in canonical order.
    pub fn families(&self) -> &[ModalFamily] {
        &self.families
    }

    /// Exact id match only.
    pub fn mode(&self, id: &str) -> Option<&Mode> {
        self.mode_index.get(id).map(|&index| &self.modes[index])
    }

    pub fn family(&self, id: &str) -> Option<&ModalFamily> {
        self.family_index.get(id).map(|&index| &self.families[index])
    }

    /// Family bound to a zodiac sign, matched case-insensitively.
    pub fn family_for_sign(&self, sign: &str) -> Option<&ModalFamily> {
        self.sign_index
            .get(&alias_key(sign))
            .map(|&index| &self.families[index])
    }

    /// Finds a mode by exact id, then by case-insensitive id, name or
    /// historical alias.
    pub fn lookup_mode(&self, query: &str) -> Result<&Mode> {
        if let Some(mode) = self.mode(query.trim()) {
            return Ok(mode);
        }

        let key = alias_key(query);
        match self.aliases.get(&key).map(Vec::as_slice) {
            Some([index]) => Ok(&self.modes[*index]),
            Some(indexes) if !indexes.is_empty() => Err(CosmologyError::AmbiguousQuery {
                query: query.to_string(),
                candidates: indexes
                    .iter()
                    .map(|&index| self.modes[index].id.clone())
                    .collect(),
            }),
            _ => Err(CosmologyError::NotFound {
                query: query.to_string(),
                nearest: nearest_key(&key, self.aliases.keys().map(String::as_str)),
            }),
        }
    }

    /// Members of `family_id` in the family's definition order.
    pub fn modes_in_family(&self, family_id: &str) -> Result<Vec<&Mode>> {
        let family = self.family(family_id).ok_or_else(|| CosmologyError::NotFound {
            query: family_id.to_string(),
            nearest: nearest_key(
                family_id,
                self.families.iter().map(|family| family.id.as_str()),
            ),
        })?;
        Ok(family
            .members
            .iter()
            .filter_map(|member| self.mode(member))
            .collect())
    }

    /// Element reached through the mode's direct association, or through its
    /// family's.
    pub fn element_of(&self, mode_id: &str) -> Result<Element> {
        self.association_of(mode_id)
            .map(|association| association.element)
    }

    /// The association that decides a mode's element and timbre.
    pub fn association_of(&self, mode_id: &str) -> Result<&ElementAssociation> {
        let mode = self.lookup_mode(mode_id)?;
        self.effective_association(mode).ok_or_else(|| {
            CosmologyError::msg(format!(
                "mode `{}` has no element association",
                mode.id
            ))
        })
    }

    /// Family-level association, without considering per-mode overrides.
    pub fn family_association(&self, family_id: &str) -> Option<&ElementAssociation> {
        self.by_family.get(family_id)
    }

    /// Element of a family: its own association, or else that of its first
    /// member.
    pub fn family_element(&self, family: &ModalFamily) -> Option<Element> {
        if let Some(association) = self.family_association(&family.id) {
            return Some(association.element);
        }
        family
            .members
            .first()
            .and_then(|member| self.mode(member))
            .and_then(|mode| self.effective_association(mode))
            .map(|association| association.element)
    }

    pub(crate) fn index_of(&self, mode_id: &str) -> Option<usize> {
        self.mode_index.get(mode_id).copied()
    }

    pub(crate) fn effective_association(&self, mode: &Mode) -> Option<&ElementAssociation> {
        self.direct
            .get(&mode.id)
            .or_else(|| self.by_family.get(&mode.family_id))
    }
}

/// Closest candidate by edit distance, if it is close enough to be a
/// plausible typo. Ties go to the lexicographically smaller candidate.
fn nearest_key<'a>(query: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let query = alias_key(query);
    if query.is_empty() {
        return None;
    }
    let limit = (query.chars().count() / 2).max(1);

    candidates
        .map(|candidate| (edit_distance(&query, &alias_key(candidate)), candidate))
        .filter(|(distance, _)| *distance <= limit)
        .min()
        .map(|(_, candidate)| candidate.to_string())
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::{fixtures::FixtureTables, load, CANONICAL_MODE_COUNT},
        tables::TableSet,
    };

    fn bundled() -> Registry {
        load(&TableSet::bundled().unwrap()).unwrap()
    }

    fn diatonic() -> Registry {
        load(&FixtureTables::canonical().tables()).unwrap()
    }

    #[test]
    fn all_modes_has_canonical_length() {
        assert_eq!(bundled().all_modes().len(), CANONICAL_MODE_COUNT);
        assert_eq!(diatonic().all_modes().len(), CANONICAL_MODE_COUNT);
    }

    #[test]
    fn every_mode_has_an_element() {
        let registry = bundled();
        for mode in registry.all_modes() {
            let element = registry.element_of(&mode.id).unwrap();
            assert!(Element::ALL.contains(&element));
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_follows_aliases() {
        let registry = diatonic();
        let dorian = registry.lookup_mode("dorian").unwrap();
        assert_eq!(registry.lookup_mode("Dorian").unwrap(), dorian);
        assert_eq!(registry.lookup_mode("doric").unwrap(), dorian);
        assert_eq!(registry.lookup_mode(" DORIC ").unwrap(), dorian);
        assert_eq!(registry.lookup_mode("natural_minor").unwrap().id, "aeolian");
    }

    #[test]
    fn lookup_by_display_name() {
        let registry = bundled();
        assert_eq!(registry.lookup_mode("major pentatonic").unwrap().id, "PENT-ARIES-1");
        assert_eq!(registry.lookup_mode("pent-aries-1").unwrap().id, "PENT-ARIES-1");
        assert_eq!(registry.lookup_mode("dim7 tetrad").unwrap().id, "QUAD-CAP-1");
    }

    #[test]
    fn unknown_mode_suggests_nearest_alias() {
        let registry = diatonic();
        match registry.lookup_mode("dorain") {
            Err(CosmologyError::NotFound { query, nearest }) => {
                assert_eq!(query, "dorain");
                assert_eq!(nearest.as_deref(), Some("dorian"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match registry.lookup_mode("zzzzzzzzzzzz") {
            Err(CosmologyError::NotFound { nearest, .. }) => assert_eq!(nearest, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shared_alias_is_ambiguous() {
        let mut fixture = FixtureTables::canonical();
        fixture.modes = fixture.modes.replacen(
            "tetra-01,Tetra tetra-01,4,3-3-3-3,tetrads,",
            "tetra-01,Tetra tetra-01,4,3-3-3-3,tetrads,doric",
            1,
        );
        let registry = load(&fixture.tables()).unwrap();

        match registry.lookup_mode("doric") {
            Err(CosmologyError::AmbiguousQuery { candidates, .. }) => {
                assert_eq!(candidates, vec!["dorian".to_string(), "tetra-01".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        // The exact id still wins.
        assert_eq!(registry.lookup_mode("dorian").unwrap().id, "dorian");
    }

    #[test]
    fn family_members_follow_definition_order() {
        let registry = diatonic();
        let ids: Vec<&str> = registry
            .modes_in_family("rotational-major")
            .unwrap()
            .into_iter()
            .map(|mode| mode.id.as_str())
            .collect();
        assert_eq!(
            ids,
            ["ionian", "dorian", "phrygian", "lydian", "mixolydian", "aeolian", "locrian"]
        );
        assert!(registry.modes_in_family("rotational-minor").is_err());
    }

    #[test]
    fn order_is_independent_of_row_order() {
        let fixture = FixtureTables::canonical();
        let mut lines: Vec<&str> = fixture.modes.lines().collect();
        let header = lines.remove(0);
        lines.reverse();
        let shuffled_modes = format!("{header}\n{}\n", lines.join("\n"));

        let mut family_lines: Vec<&str> = fixture.families.lines().collect();
        let family_header = family_lines.remove(0);
        family_lines.reverse();
        let shuffled_families = format!("{family_header}\n{}\n", family_lines.join("\n"));

        let shuffled = TableSet::from_texts(&shuffled_modes, &shuffled_families, &fixture.elements)
            .unwrap();
        let a = diatonic();
        let b = load(&shuffled).unwrap();

        let ids = |registry: &Registry| -> Vec<String> {
            registry.all_modes().iter().map(|mode| mode.id.clone()).collect()
        };
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.all_modes()[0].id, "ionian");
    }

    #[test]
    fn bundled_families_follow_zodiac_order() {
        let registry = bundled();
        let signs: Vec<&str> = registry
            .families()
            .iter()
            .filter_map(|family| family.sign.as_deref())
            .collect();
        assert_eq!(signs.first(), Some(&"Aries"));
        assert_eq!(signs.last(), Some(&"Pisces"));
        assert_eq!(registry.all_modes()[0].id, "PENT-ARIES-1");
        assert_eq!(registry.all_modes()[1].id, "QUAD-ARIES-1");
    }

    #[test]
    fn direct_association_overrides_family() {
        let registry = bundled();
        let direct = registry.association_of("QUAD-SCOR-1").unwrap();
        assert_eq!(direct.subject, AssociationSubject::Mode("QUAD-SCOR-1".to_string()));
        assert_eq!(direct.timbre.tags(), ["sub-bass", "dark drone"]);

        let inherited = registry.association_of("PENT-SCOR-1").unwrap();
        assert_eq!(inherited.subject, AssociationSubject::Family("FAM-SCORPIO".to_string()));
        assert_eq!(inherited.element, Element::Water);
    }

    #[test]
    fn signs_map_to_families() {
        let registry = bundled();
        let family = registry.family_for_sign("leo").unwrap();
        assert_eq!(family.id, "FAM-LEO");
        assert_eq!(registry.family_element(family), Some(Element::Fire));
        assert!(registry.family_for_sign("Ophiuchus").is_none());
    }

    #[test]
    fn edit_distance_counts_single_edits() {
        assert_eq!(edit_distance("dorian", "dorian"), 0);
        assert_eq!(edit_distance("dorain", "dorian"), 2);
        assert_eq!(edit_distance("lydian", "lydia"), 1);
        assert_eq!(edit_distance("", "ion"), 3);
    }
}
