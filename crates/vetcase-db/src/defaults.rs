//! Default observation vocabularies seeded into every new case.
//!
//! These lists are process-wide constant configuration: each freshly created
//! case gets one lab test group per entry in [`DEFAULT_GROUPS`], populated
//! with the matching vocabulary, all options initially not part of the
//! answer key.

use crate::models::LabTestKind;

/// Default options for the CBC group.
pub const CBC_DEFAULT_OPTIONS: &[&str] = &[
    "Polycythemia",
    "No abnormalities",
    "Mild nonregenerative anemia",
    "Mild regenerative anemia",
    "Neutrophilia",
    "Neutropenia",
    "Lymphopenia",
    "Lymphocytosis",
    "Eosinophilia",
    "Eosinopenia",
    "Monocytosis",
];

/// Default options for the clinical chemistry group.
pub const CHEM_DEFAULT_OPTIONS: &[&str] = &[
    "No abnormalities",
    "Physiological hypoglycemia",
    "Physiological hyperglycemia",
    "Significative hyperglycemia",
    "Artifactual hypoglycemia",
    "Uremia",
    "Low urea",
    "High liver enzymes",
    "Hyperproteinemia",
    "Hypoproteinemia",
    "Hypoalbuminemia",
    "Hyperglobulinemia",
    "Physiological hypercalcemia",
    "Significant hypercalcemia",
    "Hypocalcemia (hypoalbuminemia)",
    "Significant hypocalcemia",
    "Hyperphosphatemia",
    "Hyperkalemia",
    "Hypokalemia",
    "Hypernatremia",
    "Hyponatremia",
    "Hyperchloremia",
    "Hypochloremia",
    "High anion gap metabolic acidosis",
    "Hyperchloremic metabolic acidosis",
    "Metabolic alkalosis",
    "Mixed acid-base disorder",
];

/// Default options for the morphologic changes group.
pub const MORPHO_DEFAULT_OPTIONS: &[&str] = &[
    "No abnormalities",
    "Reactive lymphocytes",
    "Circulating blasts",
    "Spherocytes",
    "Acanthocytes",
    "Keratocytes",
    "Schizocytes",
    "Heinz bodies",
    "Howell-Joly bodies",
    "Autoagglutination",
    "Microcytosis",
    "Megaloblasts",
    "Nucleated red blood cells",
    "Toxic neutrophils",
    "Immature neutrophils",
];

/// Groups seeded on case creation, in display order.
pub const DEFAULT_GROUPS: &[(LabTestKind, &str)] = &[
    (LabTestKind::Cbc, "CBC"),
    (LabTestKind::Chem, "Clinical Chemistry"),
    (LabTestKind::Morpho, "Morphologic Changes"),
];

/// The default vocabulary for a test kind, if it has one.
pub const fn default_options(kind: LabTestKind) -> Option<&'static [&'static str]> {
    match kind {
        LabTestKind::Cbc => Some(CBC_DEFAULT_OPTIONS),
        LabTestKind::Chem => Some(CHEM_DEFAULT_OPTIONS),
        LabTestKind::Morpho => Some(MORPHO_DEFAULT_OPTIONS),
        LabTestKind::Other | LabTestKind::Slide => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_group_has_a_vocabulary() {
        for &(kind, _) in DEFAULT_GROUPS {
            assert!(default_options(kind).is_some(), "{kind:?} has no defaults");
        }
    }

    #[test]
    fn test_slide_and_other_have_no_defaults() {
        assert!(default_options(LabTestKind::Slide).is_none());
        assert!(default_options(LabTestKind::Other).is_none());
    }
}
