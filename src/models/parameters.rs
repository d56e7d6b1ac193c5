//! Canonical parameter vocabulary for soil and leaf reports.
//!
//! Tables are listed in canonical report order (soil: pH → CEC, leaf: N → Zn).
//! Positional reconstruction relies on that order. Variants are stored already
//! normalized: lowercase, single spaces.

use crate::types::ReportKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub canonical: &'static str,
    /// Label for presentation layers.
    pub display: &'static str,
    /// Unit spellings accepted in a trailing `(...)`; empty for unitless.
    pub units: &'static [&'static str],
    pub variants: &'static [&'static str],
    /// Display group for leaf reports.
    pub group: Option<&'static str>,
}

pub const LEAF_PERCENT_GROUP: &str = "% Dry Matter";
pub const LEAF_MGKG_GROUP: &str = "mg/kg Dry Matter";

const PERCENT: &[&str] = &["%", "% w/w"];
const MG_PER_KG: &[&str] = &["mg/kg", "ppm", "mg kg-1", "ug/g"];
const EXCHANGEABLE: &[&str] = &[
    "meq%",
    "meq/100g",
    "meq/100 g",
    "cmol/kg",
    "cmol+/kg",
    "cmol(+)/kg",
    "cmolc/kg",
];
const LEAF_PERCENT: &[&str] = &["%", "% dm", "% dry matter", "% dry wt"];
const LEAF_MG_PER_KG: &[&str] = &["mg/kg", "ppm", "mg/kg dm", "mg/kg dry matter"];

pub const SOIL_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        canonical: "pH",
        display: "pH",
        units: &[],
        variants: &[
            "ph",
            "ph value",
            "soil ph",
            "ph (h2o)",
            "ph h2o",
            "ph-h2o",
            "ph (water)",
            "ph (kcl)",
            "ph kcl",
            "ph (cacl2)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "N (%)",
        display: "Nitrogen (%)",
        units: PERCENT,
        variants: &[
            "n (%)",
            "n",
            "n%",
            "n %",
            "nitrogen",
            "nitrogen (%)",
            "total n",
            "total n (%)",
            "total nitrogen",
            "total nitrogen (%)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Org. C (%)",
        display: "Organic Carbon (%)",
        units: PERCENT,
        variants: &[
            "org. c (%)",
            "org. c",
            "org c",
            "org c (%)",
            "org.c (%)",
            "org. carbon (%)",
            "organic c",
            "organic c (%)",
            "organic carbon",
            "organic carbon (%)",
            "total organic carbon",
            "oc",
            "oc (%)",
            "o.c. (%)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Total P (mg/kg)",
        display: "Total P (mg/kg)",
        units: MG_PER_KG,
        variants: &[
            "total p (mg/kg)",
            "total p",
            "total p (ppm)",
            "total phosphorus",
            "total phosphorus (mg/kg)",
            "tp",
            "tp (mg/kg)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Avail P (mg/kg)",
        display: "Available P (mg/kg)",
        units: MG_PER_KG,
        variants: &[
            "avail p (mg/kg)",
            "avail p",
            "avail. p",
            "avail. p (mg/kg)",
            "avail p (ppm)",
            "av. p",
            "available p",
            "available p (mg/kg)",
            "available phosphorus",
            "available phosphorus (mg/kg)",
            "bray p",
            "bray ii p",
            "bray-2 p",
            "olsen p",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Exch. K (meq%)",
        display: "Exchangeable K (meq%)",
        units: EXCHANGEABLE,
        variants: &[
            "exch. k (meq%)",
            "exch. k",
            "exch k",
            "exch k (meq%)",
            "exch. k (cmol/kg)",
            "exchangeable k",
            "exchangeable k (meq%)",
            "exchangeable potassium",
            "k (meq%)",
            "k (cmol/kg)",
            "potassium (meq%)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Exch. Ca (meq%)",
        display: "Exchangeable Ca (meq%)",
        units: EXCHANGEABLE,
        variants: &[
            "exch. ca (meq%)",
            "exch. ca",
            "exch ca",
            "exch ca (meq%)",
            "exch. ca (cmol/kg)",
            "exchangeable ca",
            "exchangeable ca (meq%)",
            "exchangeable calcium",
            "ca (meq%)",
            "ca (cmol/kg)",
            "calcium (meq%)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "Exch. Mg (meq%)",
        display: "Exchangeable Mg (meq%)",
        units: EXCHANGEABLE,
        variants: &[
            "exch. mg (meq%)",
            "exch. mg",
            "exch mg",
            "exch mg (meq%)",
            "exch. mg (cmol/kg)",
            "exchangeable mg",
            "exchangeable mg (meq%)",
            "exchangeable magnesium",
            "mg (meq%)",
            "mg (cmol/kg)",
            "magnesium (meq%)",
        ],
        group: None,
    },
    ParameterSpec {
        canonical: "CEC (meq%)",
        display: "CEC (meq%)",
        units: EXCHANGEABLE,
        variants: &[
            "cec (meq%)",
            "cec",
            "cec (cmol/kg)",
            "c.e.c",
            "c.e.c.",
            "cation exchange capacity",
            "cation exchange capacity (meq%)",
        ],
        group: None,
    },
];

pub const LEAF_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        canonical: "N (%)",
        display: "N",
        units: LEAF_PERCENT,
        variants: &[
            "n (%)",
            "n",
            "n%",
            "nitrogen",
            "nitrogen (%)",
            "n (% dm)",
            "n (% dry matter)",
        ],
        group: Some(LEAF_PERCENT_GROUP),
    },
    ParameterSpec {
        canonical: "P (%)",
        display: "P",
        units: LEAF_PERCENT,
        variants: &[
            "p (%)",
            "p",
            "p%",
            "phosphorus",
            "phosphorus (%)",
            "p (% dm)",
            "p (% dry matter)",
        ],
        group: Some(LEAF_PERCENT_GROUP),
    },
    ParameterSpec {
        canonical: "K (%)",
        display: "K",
        units: LEAF_PERCENT,
        variants: &[
            "k (%)",
            "k",
            "k%",
            "potassium",
            "potassium (%)",
            "k (% dm)",
            "k (% dry matter)",
        ],
        group: Some(LEAF_PERCENT_GROUP),
    },
    ParameterSpec {
        canonical: "Mg (%)",
        display: "Mg",
        units: LEAF_PERCENT,
        variants: &[
            "mg (%)",
            "mg",
            "mg%",
            "magnesium",
            "magnesium (%)",
            "mg (% dm)",
            "mg (% dry matter)",
        ],
        group: Some(LEAF_PERCENT_GROUP),
    },
    ParameterSpec {
        canonical: "Ca (%)",
        display: "Ca",
        units: LEAF_PERCENT,
        variants: &[
            "ca (%)",
            "ca",
            "ca%",
            "calcium",
            "calcium (%)",
            "ca (% dm)",
            "ca (% dry matter)",
        ],
        group: Some(LEAF_PERCENT_GROUP),
    },
    ParameterSpec {
        canonical: "B (mg/kg)",
        display: "B",
        units: LEAF_MG_PER_KG,
        variants: &[
            "b (mg/kg)",
            "b",
            "boron",
            "boron (mg/kg)",
            "b (ppm)",
            "b (mg/kg dm)",
            "b (mg/kg dry matter)",
        ],
        group: Some(LEAF_MGKG_GROUP),
    },
    ParameterSpec {
        canonical: "Cu (mg/kg)",
        display: "Cu",
        units: LEAF_MG_PER_KG,
        variants: &[
            "cu (mg/kg)",
            "cu",
            "copper",
            "copper (mg/kg)",
            "cu (ppm)",
            "cu (mg/kg dm)",
            "cu (mg/kg dry matter)",
        ],
        group: Some(LEAF_MGKG_GROUP),
    },
    ParameterSpec {
        canonical: "Zn (mg/kg)",
        display: "Zn",
        units: LEAF_MG_PER_KG,
        variants: &[
            "zn (mg/kg)",
            "zn",
            "zinc",
            "zinc (mg/kg)",
            "zn (ppm)",
            "zn (mg/kg dm)",
            "zn (mg/kg dry matter)",
        ],
        group: Some(LEAF_MGKG_GROUP),
    },
];

/// Vocabulary for one domain; `Unknown` has none.
pub fn parameters_for(kind: ReportKind) -> &'static [ParameterSpec] {
    match kind {
        ReportKind::Soil => SOIL_PARAMETERS,
        ReportKind::Leaf => LEAF_PARAMETERS,
        ReportKind::Unknown => &[],
    }
}

/// Canonical names in report order.
pub fn canonical_order(kind: ReportKind) -> Vec<&'static str> {
    parameters_for(kind).iter().map(|p| p.canonical).collect()
}

pub fn find_spec(kind: ReportKind, canonical: &str) -> Option<&'static ParameterSpec> {
    parameters_for(kind).iter().find(|p| p.canonical == canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_sizes() {
        assert_eq!(SOIL_PARAMETERS.len(), 9);
        assert_eq!(LEAF_PARAMETERS.len(), 8);
        assert_eq!(canonical_order(ReportKind::Soil).first(), Some(&"pH"));
        assert_eq!(canonical_order(ReportKind::Soil).last(), Some(&"CEC (meq%)"));
        assert_eq!(canonical_order(ReportKind::Leaf).last(), Some(&"Zn (mg/kg)"));
        assert!(canonical_order(ReportKind::Unknown).is_empty());
    }

    #[test]
    fn variants_are_stored_normalized() {
        for spec in SOIL_PARAMETERS.iter().chain(LEAF_PARAMETERS) {
            for variant in spec.variants {
                let normalized = variant
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                assert_eq!(&normalized, variant, "variant of {}", spec.canonical);
            }
        }
    }

    #[test]
    fn no_variant_belongs_to_two_canonical_names() {
        let all: Vec<(&str, &str)> = SOIL_PARAMETERS
            .iter()
            .chain(LEAF_PARAMETERS)
            .flat_map(|s| s.variants.iter().map(move |v| (*v, s.canonical)))
            .collect();
        for (variant, owner) in &all {
            for (other_variant, other_owner) in &all {
                if variant == other_variant {
                    assert_eq!(owner, other_owner, "variant '{}' is ambiguous", variant);
                }
            }
        }
    }

    #[test]
    fn leaf_parameters_are_grouped() {
        let percent: Vec<_> = LEAF_PARAMETERS
            .iter()
            .filter(|p| p.group == Some(LEAF_PERCENT_GROUP))
            .map(|p| p.display)
            .collect();
        assert_eq!(percent, vec!["N", "P", "K", "Mg", "Ca"]);
        assert!(SOIL_PARAMETERS.iter().all(|p| p.group.is_none()));
    }
}
