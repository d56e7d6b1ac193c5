//! Parameter-name standardization against the soil/leaf vocabulary.

use crate::models::{find_spec, parameters_for, ParameterSpec, LEAF_PARAMETERS, SOIL_PARAMETERS};
use crate::types::ReportKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use tracing::debug;

/// Variants shorter than this only match exactly (bare `n` must not match `mn`).
pub const MIN_FUZZY_LEN: usize = 3;

struct DomainIndex {
    exact: HashMap<&'static str, &'static str>,
    /// (variant, canonical), longest variant first.
    by_len: Vec<(&'static str, &'static str)>,
}

impl DomainIndex {
    fn build(specs: &[&'static [ParameterSpec]]) -> Self {
        let mut exact = HashMap::new();
        let mut by_len = Vec::new();
        for table in specs {
            for spec in table.iter() {
                for variant in spec.variants {
                    exact.entry(*variant).or_insert(spec.canonical);
                    by_len.push((*variant, spec.canonical));
                }
            }
        }
        by_len.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        by_len.dedup();
        Self { exact, by_len }
    }
}

struct VocabularyIndex {
    soil: DomainIndex,
    leaf: DomainIndex,
    combined: DomainIndex,
}

static INDEX: OnceLock<VocabularyIndex> = OnceLock::new();

fn index() -> &'static VocabularyIndex {
    INDEX.get_or_init(|| VocabularyIndex {
        soil: DomainIndex::build(&[SOIL_PARAMETERS]),
        leaf: DomainIndex::build(&[LEAF_PARAMETERS]),
        combined: DomainIndex::build(&[SOIL_PARAMETERS, LEAF_PARAMETERS]),
    })
}

/// Trim, collapse whitespace, lowercase.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Every start offset where `needle` occurs in `haystack` without being glued
/// to a neighbouring letter or digit. Boundaries are only enforced on the
/// sides where the needle itself ends in an alphanumeric character.
pub fn boundary_matches(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let check_left = needle.chars().next().map_or(false, |c| c.is_alphanumeric());
    let check_right = needle.chars().last().map_or(false, |c| c.is_alphanumeric());
    haystack
        .match_indices(needle)
        .filter(|(start, _)| {
            let left_ok = !check_left
                || haystack[..*start]
                    .chars()
                    .last()
                    .map_or(true, |c| !c.is_alphanumeric());
            let right_ok = !check_right
                || haystack[start + needle.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric());
            left_ok && right_ok
        })
        .count()
}

pub fn contains_at_boundary(haystack: &str, needle: &str) -> bool {
    boundary_matches(haystack, needle) > 0
}

/// Split `"avail p (ppm)"` into `("avail p", "ppm")`.
fn split_unit(name: &str) -> Option<(&str, &str)> {
    if !name.ends_with(')') {
        return None;
    }
    let open = name.find('(')?;
    let base = name[..open].trim();
    let unit = name[open + 1..name.len() - 1].trim();
    if base.is_empty() || unit.is_empty() {
        return None;
    }
    Some((base, unit))
}

fn unit_accepted(canonical: &str, unit: &str) -> bool {
    [ReportKind::Soil, ReportKind::Leaf]
        .into_iter()
        .filter_map(|kind| find_spec(kind, canonical))
        .any(|spec| spec.units.is_empty() || spec.units.contains(&unit))
}

fn lookup(raw: &str, domain: &DomainIndex) -> Option<&'static str> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return None;
    }
    if let Some(canonical) = domain.exact.get(name.as_str()) {
        return Some(*canonical);
    }
    if let Some((base, unit)) = split_unit(&name) {
        if let Some(&canonical) = domain.exact.get(base) {
            if unit_accepted(canonical, unit) {
                return Some(canonical);
            }
            debug!(name = %name, canonical, unit, "unit does not fit parameter");
            return None;
        }
    }
    // Variant inside the input: most specific (longest) variant wins.
    for &(variant, canonical) in &domain.by_len {
        if variant.len() >= MIN_FUZZY_LEN && contains_at_boundary(&name, variant) {
            return Some(canonical);
        }
    }
    // Input inside a variant: only when it points at a single parameter.
    if name.len() >= MIN_FUZZY_LEN {
        let mut owners: Vec<&'static str> = domain
            .by_len
            .iter()
            .filter(|(variant, _)| contains_at_boundary(variant, &name))
            .map(|(_, canonical)| *canonical)
            .collect();
        owners.sort_unstable();
        owners.dedup();
        if owners.len() == 1 {
            return Some(owners[0]);
        }
    }
    None
}

/// Map any spelling to its canonical parameter name, searching soil then leaf.
pub fn standardize_name(raw_name: &str) -> Option<&'static str> {
    lookup(raw_name, &index().combined)
}

/// Like [`standardize_name`] but restricted to one domain's variants.
/// `Unknown` searches both domains.
pub fn standardize_name_for(raw_name: &str, kind: ReportKind) -> Option<&'static str> {
    let idx = index();
    match kind {
        ReportKind::Soil => lookup(raw_name, &idx.soil),
        ReportKind::Leaf => lookup(raw_name, &idx.leaf),
        ReportKind::Unknown => lookup(raw_name, &idx.combined),
    }
}

/// Rename every key that maps to a canonical parameter; other keys (such as
/// `sample_id`) pass through unchanged. On collisions the first key in map
/// order keeps its value.
pub fn standardize_data_dict<V>(data: BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut out = BTreeMap::new();
    for (key, value) in data {
        let target = standardize_name(&key)
            .map(str::to_string)
            .unwrap_or(key);
        if out.contains_key(&target) {
            debug!(key = %target, "duplicate parameter after standardization, keeping first");
            continue;
        }
        out.insert(target, value);
    }
    out
}

/// Canonical name → presentation label. `Unknown` merges both domains,
/// soil labels taking precedence.
pub fn display_name_mapping(kind: ReportKind) -> BTreeMap<&'static str, &'static str> {
    let mut mapping = BTreeMap::new();
    let domains: &[ReportKind] = match kind {
        ReportKind::Unknown => &[ReportKind::Soil, ReportKind::Leaf],
        ReportKind::Soil => &[ReportKind::Soil],
        ReportKind::Leaf => &[ReportKind::Leaf],
    };
    for domain in domains {
        for spec in parameters_for(*domain) {
            mapping.entry(spec.canonical).or_insert(spec.display);
        }
    }
    mapping
}
