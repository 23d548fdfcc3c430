//! Azure region short names, as used in resource naming conventions.
//!
//! Lookups ignore case and whitespace, so `West Europe` and `westeurope`
//! both map to `we`.

const SHORT_NAMES: &[(&str, &str)] = &[
    ("australiacentral", "acl"),
    ("australiaeast", "ae"),
    ("australiasoutheast", "ase"),
    ("brazilsouth", "brs"),
    ("canadacentral", "cnc"),
    ("canadaeast", "cne"),
    ("centralindia", "inc"),
    ("centralus", "cus"),
    ("eastasia", "ea"),
    ("eastus", "eus"),
    ("eastus2", "eus2"),
    ("francecentral", "frc"),
    ("germanywestcentral", "gwc"),
    ("italynorth", "itn"),
    ("japaneast", "jpe"),
    ("japanwest", "jpw"),
    ("koreacentral", "krc"),
    ("northcentralus", "ncus"),
    ("northeurope", "ne"),
    ("norwayeast", "nwe"),
    ("polandcentral", "plc"),
    ("southafricanorth", "san"),
    ("southcentralus", "scus"),
    ("southeastasia", "sea"),
    ("southindia", "ins"),
    ("swedencentral", "sdc"),
    ("switzerlandnorth", "szn"),
    ("uaenorth", "uan"),
    ("uksouth", "uks"),
    ("ukwest", "ukw"),
    ("westcentralus", "wcus"),
    ("westeurope", "we"),
    ("westus", "wus"),
    ("westus2", "wus2"),
    ("westus3", "wus3"),
];

/// Short name for `region`, or `None` when the region is not known.
pub fn short_name(region: &str) -> Option<&'static str> {
    let key: String = region
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    SHORT_NAMES
        .binary_search_by(|(name, _)| name.cmp(&key.as_str()))
        .ok()
        .map(|i| SHORT_NAMES[i].1)
}
