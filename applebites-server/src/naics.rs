//! NAICS industry reference table.
//!
//! Static, read-only table of the twenty 2022 NAICS sectors with base
//! EBITDA multiples, consulted by the paid-tier multiple selector.
//! Lookup accepts any full NAICS code (2-6 digits) and resolves by
//! sector prefix, including the ranged sectors (31-33, 44-45, 48-49).

use serde::Serialize;

use crate::valuation::MultipleTriple;

/// One NAICS sector row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NaicsSector {
    /// Sector code as published (ranged sectors keep their range form)
    pub code: &'static str,
    /// Sector title
    pub title: &'static str,
    /// Base low multiple
    pub low: f64,
    /// Base mid multiple
    pub mid: f64,
    /// Base high multiple
    pub high: f64,
}

impl NaicsSector {
    /// Base multiples as a triple.
    pub const fn multiples(&self) -> MultipleTriple {
        MultipleTriple::new(self.low, self.mid, self.high)
    }
}

/// The twenty 2022 NAICS sectors.
pub const SECTORS: [NaicsSector; 20] = [
    NaicsSector { code: "11", title: "Agriculture, Forestry, Fishing and Hunting", low: 2.00, mid: 3.00, high: 4.00 },
    NaicsSector { code: "21", title: "Mining, Quarrying, and Oil and Gas Extraction", low: 2.50, mid: 3.50, high: 4.75 },
    NaicsSector { code: "22", title: "Utilities", low: 4.00, mid: 5.25, high: 6.50 },
    NaicsSector { code: "23", title: "Construction", low: 2.25, mid: 3.25, high: 4.25 },
    NaicsSector { code: "31-33", title: "Manufacturing", low: 3.00, mid: 4.25, high: 5.50 },
    NaicsSector { code: "42", title: "Wholesale Trade", low: 2.75, mid: 3.75, high: 5.00 },
    NaicsSector { code: "44-45", title: "Retail Trade", low: 2.00, mid: 3.00, high: 4.00 },
    NaicsSector { code: "48-49", title: "Transportation and Warehousing", low: 2.50, mid: 3.50, high: 4.50 },
    NaicsSector { code: "51", title: "Information", low: 4.50, mid: 6.00, high: 7.50 },
    NaicsSector { code: "52", title: "Finance and Insurance", low: 3.50, mid: 4.75, high: 6.00 },
    NaicsSector { code: "53", title: "Real Estate and Rental and Leasing", low: 3.00, mid: 4.00, high: 5.00 },
    NaicsSector { code: "54", title: "Professional, Scientific, and Technical Services", low: 3.25, mid: 4.50, high: 5.75 },
    NaicsSector { code: "55", title: "Management of Companies and Enterprises", low: 3.00, mid: 4.00, high: 5.25 },
    NaicsSector { code: "56", title: "Administrative and Support and Waste Management Services", low: 2.50, mid: 3.50, high: 4.50 },
    NaicsSector { code: "61", title: "Educational Services", low: 2.75, mid: 3.75, high: 4.75 },
    NaicsSector { code: "62", title: "Health Care and Social Assistance", low: 3.50, mid: 4.75, high: 6.00 },
    NaicsSector { code: "71", title: "Arts, Entertainment, and Recreation", low: 2.25, mid: 3.25, high: 4.25 },
    NaicsSector { code: "72", title: "Accommodation and Food Services", low: 2.00, mid: 2.75, high: 3.75 },
    NaicsSector { code: "81", title: "Other Services (except Public Administration)", low: 2.00, mid: 3.00, high: 4.00 },
    NaicsSector { code: "92", title: "Public Administration", low: 1.75, mid: 2.50, high: 3.50 },
];

/// Resolve a full NAICS code to its sector row.
///
/// Returns `None` for codes that do not start with a known two-digit
/// sector prefix.
pub fn lookup(code: &str) -> Option<&'static NaicsSector> {
    let trimmed = code.trim();
    if trimmed.len() < 2 || !trimmed.chars().take(2).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let prefix: u32 = trimmed[..2].parse().ok()?;

    let sector_code = match prefix {
        11 | 21 | 22 | 23 | 42 | 51 | 52 | 53 | 54 | 55 | 56 | 61 | 62 | 71 | 72 | 81 | 92 => {
            return SECTORS.iter().find(|s| {
                s.code.len() == 2 && s.code.parse::<u32>().map(|c| c == prefix).unwrap_or(false)
            });
        }
        31..=33 => "31-33",
        44..=45 => "44-45",
        48..=49 => "48-49",
        _ => return None,
    };

    SECTORS.iter().find(|s| s.code == sector_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_twenty_sectors_with_ascending_multiples() {
        assert_eq!(SECTORS.len(), 20);
        for sector in &SECTORS {
            assert!(sector.low <= sector.mid, "{}: low > mid", sector.code);
            assert!(sector.mid <= sector.high, "{}: mid > high", sector.code);
            assert!(sector.low > 0.0);
        }
    }

    #[test]
    fn test_lookup_plain_sector() {
        let sector = lookup("541330").unwrap();
        assert_eq!(sector.code, "54");

        let sector = lookup("722511").unwrap();
        assert_eq!(sector.code, "72");
    }

    #[test]
    fn test_lookup_ranged_sectors() {
        assert_eq!(lookup("311811").unwrap().code, "31-33");
        assert_eq!(lookup("325412").unwrap().code, "31-33");
        assert_eq!(lookup("445110").unwrap().code, "44-45");
        assert_eq!(lookup("484121").unwrap().code, "48-49");
        assert_eq!(lookup("492110").unwrap().code, "48-49");
    }

    #[test]
    fn test_lookup_two_digit_codes() {
        assert_eq!(lookup("11").unwrap().code, "11");
        assert_eq!(lookup("33").unwrap().code, "31-33");
    }

    #[test]
    fn test_lookup_unknown_or_malformed() {
        assert!(lookup("99").is_none());
        assert!(lookup("12").is_none());
        assert!(lookup("").is_none());
        assert!(lookup("x54").is_none());
        assert!(lookup("5").is_none());
    }
}
