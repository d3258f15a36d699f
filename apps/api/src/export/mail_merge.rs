//! Mail-Merge Record Builder for the bulk postal system's fixed-field import.

use serde::Deserialize;

pub const DELIMITER: char = ';';
pub const FIELD_COUNT: usize = 17;

/// Street-type prefixes recognised as the first word of a street line.
const STREET_TYPES: [&str; 14] = [
    "RUA", "AVENIDA", "AV", "ALAMEDA", "TRAVESSA", "PRACA", "PRAÇA", "RODOVIA", "ESTRADA", "LARGO",
    "VIADUTO", "VIA", "ROD", "EST",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressRecord {
    pub name: String,
    pub street_full: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub case_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetParts {
    pub street_type: String,
    pub name: String,
}

/// Splits "AV. PAULISTA" into ("AV", "PAULISTA"). A single word, or a first
/// word that is not a known prefix, yields an empty type and the whole line.
pub fn split_street(street_full: &str) -> StreetParts {
    let words: Vec<&str> = street_full.split_whitespace().collect();
    if words.len() > 1 {
        let first = words[0].to_uppercase().replacen('.', "", 1);
        if STREET_TYPES.contains(&first.as_str()) {
            return StreetParts {
                street_type: first,
                name: words[1..].join(" "),
            };
        }
    }
    StreetParts {
        street_type: String::new(),
        name: street_full.trim().to_string(),
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// One import line. Field positions are fixed by the downstream system:
///
/// | 0 | 1 | 2..=5 | 6 | 7 | 8 | 9 | 10 | 11 | 12 | 13 | 14 | 15 | 16 |
/// |---|---|---|---|---|---|---|---|---|---|---|---|---|---|
/// | empty | NAME | empty | postal code | street type | street | DISTRICT | CITY | UF | `N` | COMPLEMENT | number | `PROCESSO:<ref>` | empty |
///
/// `case_reference` overrides the record's own reference when non-empty.
pub fn build_record(addr: &AddressRecord, case_reference: &str) -> String {
    let street = split_street(&addr.street_full);
    let reference = if case_reference.trim().is_empty() {
        addr.case_reference.trim()
    } else {
        case_reference.trim()
    };

    let fields: [String; FIELD_COUNT] = [
        String::new(),
        addr.name.trim().to_uppercase(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        digits_only(&addr.postal_code),
        street.street_type,
        street.name,
        addr.district.trim().to_uppercase(),
        addr.city.trim().to_uppercase(),
        addr.state.trim().to_uppercase(),
        "N".to_string(),
        addr.complement.trim().to_uppercase(),
        addr.number.trim().to_string(),
        format!("PROCESSO:{reference}"),
        String::new(),
    ];

    fields
        .iter()
        .map(|field| field.replace(DELIMITER, ","))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// `SMT_<NAME_WITH_UNDERSCORES>.csv`
pub fn record_filename(addr: &AddressRecord) -> String {
    let name: Vec<String> = addr
        .name
        .split_whitespace()
        .map(|word| word.replace(['"', '/', '\\'], ""))
        .collect();
    format!("SMT_{}.csv", name.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AddressRecord {
        AddressRecord {
            name: "Maria da Silva".into(),
            street_full: "Av. Paulista".into(),
            number: "1578".into(),
            complement: "apto 12".into(),
            district: "Bela Vista".into(),
            city: "São Paulo".into(),
            state: "sp".into(),
            postal_code: "01310-200".into(),
            case_reference: "0001111-22.2024.8.26.0050".into(),
        }
    }

    #[test]
    fn test_split_street_known_prefix() {
        assert_eq!(
            split_street("Av. Paulista"),
            StreetParts {
                street_type: "AV".into(),
                name: "Paulista".into()
            }
        );
        assert_eq!(split_street("RUA DAS FLORES 10").street_type, "RUA");
        assert_eq!(split_street("praça da Sé").street_type, "PRAÇA");
    }

    #[test]
    fn test_split_street_without_prefix() {
        let parts = split_street("Beco do Batman");
        assert_eq!(parts.street_type, "");
        assert_eq!(parts.name, "Beco do Batman");

        // A lone prefix word is a street name, not a type.
        let parts = split_street("Avenida");
        assert_eq!(parts.street_type, "");
        assert_eq!(parts.name, "Avenida");
    }

    #[test]
    fn test_build_record_field_positions() {
        let line = build_record(&record(), "1500123-45.2024.8.26.0050");
        let fields: Vec<&str> = line.split(';').collect();

        assert_eq!(fields.len(), FIELD_COUNT);
        assert_eq!(fields[0], "");
        assert_eq!(fields[1], "MARIA DA SILVA");
        assert!(fields[2..=5].iter().all(|f| f.is_empty()));
        assert_eq!(fields[6], "01310200");
        assert_eq!(fields[7], "AV");
        assert_eq!(fields[8], "Paulista");
        assert_eq!(fields[9], "BELA VISTA");
        assert_eq!(fields[10], "SÃO PAULO");
        assert_eq!(fields[11], "SP");
        assert_eq!(fields[12], "N");
        assert_eq!(fields[13], "APTO 12");
        assert_eq!(fields[14], "1578");
        assert_eq!(fields[15], "PROCESSO:1500123-45.2024.8.26.0050");
        assert_eq!(fields[16], "");
        assert!(line.ends_with(';'));
    }

    #[test]
    fn test_build_record_falls_back_to_record_reference() {
        let line = build_record(&record(), "  ");
        assert!(line.contains("PROCESSO:0001111-22.2024.8.26.0050"));
    }

    #[test]
    fn test_delimiter_inside_value_keeps_field_count() {
        let mut addr = record();
        addr.complement = "bloco B; apto 3".into();
        addr.name = "José;Santos".into();

        let line = build_record(&addr, "1");
        assert_eq!(line.split(';').count(), FIELD_COUNT);
        assert!(line.contains("BLOCO B, APTO 3"));
    }

    #[test]
    fn test_record_filename() {
        assert_eq!(record_filename(&record()), "SMT_Maria_da_Silva.csv");
    }
}
