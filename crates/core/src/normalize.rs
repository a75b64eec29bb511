//! Company name normalization: split a display name into a stem and a legal-form ending.

/// Known legal-form endings. Matching takes the first entry the name ends with,
/// so the order of this table is part of the output contract.
pub const NAME_ENDINGS: &[&str] = &[
    "AEIE",
    "ANGHYFYNGEDIG",
    "C.B.C",
    "C.C.C",
    "C.I.C",
    "CBC",
    "CBCN",
    "CBP",
    "CCC",
    "CCG CYF",
    "CCG CYFYNGEDIG",
    "CIC",
    "COMMUNITY INTEREST COMPANY",
    "COMMUNITY INTEREST P.L.C",
    "COMMUNITY INTEREST PLC",
    "COMMUNITY INTEREST PUBLIC LIMITED COMPANY",
    "CWMNI BUDDIANT C.C.C",
    "CWMNI BUDDIANT CCC",
    "CWMNI BUDDIANT CYMUNEDOL C.C.C",
    "CWMNI BUDDIANT CYMUNEDOL CCC",
    "CWMNI BUDDIANT CYMUNEDOL CYHOEDDUS CYFYNGEDIG",
    "CWMNI BUDDIANT CYMUNEDOL",
    "CWMNI BUDDSODDIA CHYFALAF NEWIDIOL",
    "CWMNI BUDDSODDIANT PENAGORED",
    "CWMNI CELL GWARCHODEDIG",
    "CWMNI CYFYNGEDIG CYHOEDDUS",
    "CYF",
    "CYFYNGEDIG",
    "EEIG",
    "EESV",
    "EOFG",
    "EOOS",
    "EUROPEAN ECONOMIC INTEREST GROUPING",
    "GEIE",
    "GELE",
    "ICVC",
    "INVESTMENT COMPANY WITH VARIABLE CAPITAL",
    "L.P",
    "L.T.D",
    "LIMITED - THE",
    "LIMITED LIABILITY PARTNERSHIP",
    "LIMITED PARTNERSHIP",
    "LIMITED THE",
    "LIMITED",
    "LIMITED-THE",
    "LIMITED...THE",
    "LIMITED..THE",
    "LIMITED.THE",
    "LLP",
    "LP",
    "LTD",
    "LTD...THE",
    "LTD..THE",
    "LTD.THE",
    "OEIC",
    "OPEN-ENDED INVESTMENT COMPANY",
    "P.L.C",
    "PAC",
    "PARTNERIAETH ATEBOLRWYDD CYFYNGEDIG",
    "PARTNERIAETH CYFYNGEDIG",
    "PCC LIMITED",
    "PCC LTD",
    "PCC",
    "PLC",
    "PROTECTED CELL COMPANY",
    "PUBLIC LIMITED COMPANY .THE",
    "PUBLIC LIMITED COMPANY THE",
    "PUBLIC LIMITED COMPANY",
    "PUBLIC LIMITED COMPANY.THE",
    "UNLIMITED",
    "UNLTD",
];

/// Split `name` into `(stem, suffix)`.
///
/// Trailing non-word characters are ignored while matching, but the suffix is cut
/// from the original name so its punctuation survives. Without a match the stem is
/// the whole name and the suffix is empty.
pub fn normalize(name: &str) -> (String, String) {
    let stripped = name.trim_end_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
    for &ending in NAME_ENDINGS {
        if !stripped.ends_with(ending) {
            continue;
        }
        let stem = stripped
            .strip_suffix(ending)
            .and_then(|s| s.strip_suffix(' '))
            .unwrap_or(stripped);
        // stem is a prefix of `stripped`, itself a prefix of `name`
        return (stem.to_string(), name[stem.len()..].to_string());
    }
    (name.to_string(), String::new())
}

/// Seam for the transformer so callers can observe or replace normalization.
pub trait NameNormalizer: Send + Sync {
    fn normalize(&self, name: &str) -> (String, String);
}

/// Default normalizer backed by [`NAME_ENDINGS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LegalSuffixNormalizer;

impl NameNormalizer for LegalSuffixNormalizer {
    fn normalize(&self, name: &str) -> (String, String) {
        normalize(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) { normalize(name) }

    #[test]
    fn splits_simple_ending() {
        assert_eq!(split("TEST LIMITED"), ("TEST".into(), " LIMITED".into()));
    }

    #[test]
    fn no_ending_keeps_whole_name() {
        assert_eq!(split("ACME"), ("ACME".into(), String::new()));
    }

    #[test]
    fn suffix_keeps_original_trailing_punctuation() {
        assert_eq!(split("ACME LTD."), ("ACME".into(), " LTD.".into()));
        assert_eq!(split("ACME P.L.C."), ("ACME".into(), " P.L.C.".into()));
    }

    #[test]
    fn first_declared_ending_wins_over_longest() {
        // "LIMITED" is declared before "PCC LIMITED"
        assert_eq!(split("ACME PCC LIMITED"), ("ACME PCC".into(), " LIMITED".into()));
        // "PUBLIC LIMITED COMPANY" is the first entry ending in COMPANY that matches
        assert_eq!(split("ACME PUBLIC LIMITED COMPANY"), ("ACME".into(), " PUBLIC LIMITED COMPANY".into()));
    }

    #[test]
    fn ending_without_separating_space_yields_stripped_stem() {
        assert_eq!(split("FOOLTD"), ("FOOLTD".into(), String::new()));
        assert_eq!(split("FOOLTD!"), ("FOOLTD".into(), "!".into()));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(split("Acme Limited"), ("Acme Limited".into(), String::new()));
    }

    #[test]
    fn trait_delegates_to_table() {
        let n = LegalSuffixNormalizer;
        assert_eq!(n.normalize("WIDGETS PLC"), ("WIDGETS".into(), " PLC".into()));
    }
}
