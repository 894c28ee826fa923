// Primitives shared by the readers.

use std::path::Path;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// The last component of a path, for the log messages.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Decodes ISO-8859-1 bytes. Every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

/// Removes the accents: `"Abstención"` becomes `"Abstencion"`.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Reads a vote count as written in the published results.
///
/// Dots are thousands separators: `"12.345"` is 12345. Returns `None` when
/// the value is empty or holds anything else than digits.
pub fn parse_count(s: &str) -> Option<u64> {
    let digits: String = s.trim().chars().filter(|c| *c != '.').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// A normalized constituency identifier: `"04"` and `"4"` are the same
/// constituency. Identifiers that are not numbers are only trimmed.
pub fn normalize_id(s: &str) -> String {
    let t = s.trim();
    match parse_count(t) {
        Some(n) if !t.contains('.') => n.to_string(),
        _ => t.to_string(),
    }
}

/// The counts a column of a precinct file may hold.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum CountField {
    Census,
    Total,
    Valid,
    Blank,
    Null,
    Abstention,
}

/// What a column header stands for.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ColumnKey {
    Field(CountField),
    Party(String),
    /// Identifiers, names and counts that are not used.
    Ignored,
}

/// Classifies a column header of a precinct file.
///
/// The comparison ignores case and accents. Headers that start with a
/// lowercase letter and are not known are ignored. All the other ones are
/// party labels, without their accents.
pub fn parse_column_key(raw: &str) -> ColumnKey {
    let stripped = strip_accents(raw.trim());
    let lower = stripped.to_lowercase();
    match lower.as_str() {
        "" => ColumnKey::Ignored,
        "censo total" => ColumnKey::Field(CountField::Census),
        "votos totales" => ColumnKey::Field(CountField::Total),
        "votos validos" => ColumnKey::Field(CountField::Valid),
        "votos blancos" => ColumnKey::Field(CountField::Blank),
        "votos nulos" => ColumnKey::Field(CountField::Null),
        "abstencion" => ColumnKey::Field(CountField::Abstention),
        "certif. alta" | "certif. correc." | "censo" | "municipio" | "mesa" | "codmun"
        | "codcir" | "votos electores" | "votos interventores" | "votos candidaturas" => {
            ColumnKey::Ignored
        }
        _ => match stripped.chars().next() {
            Some(c) if c.is_lowercase() => ColumnKey::Ignored,
            _ => ColumnKey::Party(stripped),
        },
    }
}
