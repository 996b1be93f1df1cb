//! NAICS and PSC reference codes
//!
//! NAICS: 6-digit North American Industry Classification System codes.
//! PSC: 4-character Product Service Codes used in federal procurement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const NAICS: &str = "NAICS";
pub const PSC: &str = "PSC";

const NAICS_CODES: &[(&str, &str)] = &[
    ("541511", "Custom Computer Programming Services"),
    ("541512", "Computer Systems Design Services"),
    ("541513", "Computer Facilities Management Services"),
    ("541519", "Other Computer Related Services"),
    ("518210", "Data Processing, Hosting, and Related Services"),
    ("334111", "Electronic Computer Manufacturing"),
    ("423430", "Computer and Computer Peripheral Equipment Wholesalers"),
    ("443142", "Electronics Stores"),
    ("611420", "Computer Training"),
    ("811212", "Computer and Office Machine Repair"),
    ("236220", "Commercial and Institutional Building Construction"),
    ("238210", "Electrical Contractors and Other Wiring Installation"),
    ("541330", "Engineering Services"),
    ("541310", "Architectural Services"),
    ("722511", "Full-Service Restaurants"),
    ("722513", "Limited-Service Restaurants"),
    ("561320", "Temporary Help Services"),
    ("621111", "Offices of Physicians"),
    ("484110", "General Freight Trucking, Local"),
    ("336411", "Aircraft Manufacturing"),
];

const PSC_CODES: &[(&str, &str)] = &[
    ("7030", "Information Technology Software"),
    ("7035", "Information Technology Support Services"),
    ("D302", "IT and Telecom- IT and Telecom Solutions"),
    ("D307", "IT and Telecom- Cyber Security and Data Protection"),
    ("R425", "Professional Services- Engineering/Technical"),
    ("R408", "Professional Services- Program Management/Support Services"),
    ("J015", "Maintenance of Real Property- General Services"),
    ("Z2A1", "Facilities Related Services- Lease/Rental of Equipment"),
    (
        "W152",
        "Transportation/Travel/Relocation- Aircraft and Airframe Structural Components",
    ),
    ("5945", "Aviation Ground Support Equipment"),
    ("7045", "Training Services"),
    ("6515", "Medical/Surgical Instruments and Supplies"),
    ("8810", "Construction Services"),
    ("2840", "Cleaning Compounds and Toilet Preparations"),
    ("7540", "Equipment Rental and Leasing Services"),
    ("R413", "Professional Services- Information Services"),
    ("4240", "Safety and Rescue Equipment"),
    ("1560", "Airframe Structural Components"),
    (
        "C211",
        "Architectural and Engineering Services- Architectural Services",
    ),
    ("Q201", "Fire Protection Services"),
];

/// Code -> description tables for NAICS and PSC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCatalog {
    pub naics: BTreeMap<String, String>,
    pub psc: BTreeMap<String, String>,
}

impl CodeCatalog {
    /// Catalog of the bundled reference codes
    pub fn builtin() -> Self {
        fn table(codes: &[(&str, &str)]) -> BTreeMap<String, String> {
            codes
                .iter()
                .map(|(code, description)| (code.to_string(), description.to_string()))
                .collect()
        }

        Self {
            naics: table(NAICS_CODES),
            psc: table(PSC_CODES),
        }
    }

    /// Table for a label, if the label names a code system
    pub fn table(&self, label: &str) -> Option<&BTreeMap<String, String>> {
        match label {
            NAICS => Some(&self.naics),
            PSC => Some(&self.psc),
            _ => None,
        }
    }

    /// Description of `code` under `label`
    pub fn describe(&self, label: &str, code: &str) -> Option<&str> {
        self.table(label)?.get(code.trim()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.naics.is_empty() && self.psc.is_empty()
    }
}
