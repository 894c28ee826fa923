// Reading the spreadsheets published by the ministry: one row per province.
//
// The layout is:
// - a few title rows (single cell, skipped)
// - a row with the party names, starting at the first party column
// - a row with the party abbreviations
// - the column names, the first one being non-empty
// - one row per constituency, and a final "Total" row (skipped)
//
// When the column names contain "Diputados", every party uses two columns:
// votes, then seats won.

use std::collections::BTreeMap;

use calamine::DataType;

use crate::escrutinio::{io_common::normalize_id, io_common::parse_count, *};

const COL_ID: &str = "Código de Provincia";
const COL_NAME: &str = "Nombre de Provincia";
const COL_BLANK: &str = "Votos en blanco";
const COL_CENSUS: &str = "Total censo electoral";
const COL_NULL: &str = "Votos nulos";
const COL_VALID: &str = "Votos válidos";
const COL_TOTAL: &str = "Total votantes";
const COL_SEATS: &str = "Diputados";

pub fn read_ministry_xlsx(path: &str, cfs: &FileSource) -> EscResult<Vec<ConstituencyRecord>> {
    info!("read_ministry_xlsx: reading {}", io_common::simplify_file_name(path));
    let wrange = get_range(path, cfs)?;
    let rows: Vec<Vec<DataType>> = wrange.rows().map(|r| r.to_vec()).collect();
    parse_ministry_rows(&rows, cfs.use_abbreviations()?)
}

fn get_range(path: &str, cfs: &FileSource) -> EscResult<calamine::Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match &cfs.excel_worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name: name.clone() })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
    };
    Ok(wrange)
}

fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::String(s) if s.trim().is_empty() => None,
        DataType::String(s) => Some(s.trim().to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        DataType::Float(f) => Some(f.to_string()),
        DataType::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn cell_count(cell: &DataType) -> Option<u64> {
    match cell {
        DataType::Int(i) if *i >= 0 => Some(*i as u64),
        DataType::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        DataType::String(s) => parse_count(s),
        _ => None,
    }
}

/// A row is used when it has at least two values and does not start with "Total".
fn is_content_row(row: &[Option<String>]) -> bool {
    let mut values = row.iter().flatten();
    match values.next() {
        Some(first) if first == "Total" => false,
        Some(_) => values.next().is_some(),
        None => false,
    }
}

/// The position of the first value of the row, and all the values from there.
fn trim_row(row: &[Option<String>]) -> Option<(usize, Vec<String>)> {
    let start = row.iter().position(|c| c.is_some())?;
    Some((start, row[start..].iter().flatten().cloned().collect()))
}

struct Header {
    /// The index of the row holding the column names.
    row_index: usize,
    first_party_column: usize,
    party_names: Vec<String>,
    party_abbreviations: Vec<String>,
    columns: Vec<Option<String>>,
}

fn parse_header(rows: &[Vec<Option<String>>]) -> EscResult<Header> {
    let mut names: Option<(usize, Vec<String>)> = None;
    let mut abbreviations: Option<(usize, Vec<String>)> = None;
    for (idx, row) in rows.iter().enumerate() {
        if !is_content_row(row) {
            continue;
        }
        if row.first().map(|c| c.is_some()).unwrap_or(false) {
            let (first_party_column, party_names) = names.context(ExcelMissingHeaderSnafu {})?;
            let party_abbreviations = abbreviations.map(|(_, a)| a).unwrap_or_default();
            let mut columns = row.clone();
            while let Some(None) = columns.last() {
                columns.pop();
            }
            return Ok(Header {
                row_index: idx,
                first_party_column,
                party_names,
                party_abbreviations,
                columns,
            });
        }
        if names.is_none() {
            names = trim_row(row);
        } else if abbreviations.is_none() {
            abbreviations = trim_row(row);
        }
    }
    ExcelMissingHeaderSnafu {}.fail()
}

pub fn parse_ministry_rows(
    rows: &[Vec<DataType>],
    use_abbreviations: bool,
) -> EscResult<Vec<ConstituencyRecord>> {
    let texts: Vec<Vec<Option<String>>> = rows
        .iter()
        .map(|r| r.iter().map(cell_text).collect())
        .collect();
    let header = parse_header(&texts)?;
    debug!(
        "parse_ministry_rows: header at row {}: {:?}",
        header.row_index, header.columns
    );

    let column = |name: &str| header.columns.iter().position(|c| c.as_deref() == Some(name));
    let id_col = column(COL_ID).context(MissingFieldSnafu {
        field: COL_ID,
        record: header.row_index,
    })?;
    let name_col = column(COL_NAME);
    let blank_col = column(COL_BLANK);
    let census_col = column(COL_CENSUS);
    let null_col = column(COL_NULL);
    let valid_col = column(COL_VALID);
    let total_col = column(COL_TOTAL);
    let with_seats = column(COL_SEATS).is_some();
    let step = if with_seats { 2 } else { 1 };

    let labels = if use_abbreviations && !header.party_abbreviations.is_empty() {
        &header.party_abbreviations
    } else {
        &header.party_names
    };
    let party_columns: Vec<(usize, &String)> = (header.first_party_column..header.columns.len())
        .step_by(step)
        .zip(labels.iter())
        .collect();

    let mut res: Vec<ConstituencyRecord> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(header.row_index + 1) {
        let text_row = &texts[idx];
        if !is_content_row(text_row) || text_row.first().map(|c| c.is_none()).unwrap_or(true) {
            continue;
        }
        let lineno = idx as u64 + 1;
        let count = |col: Option<usize>| -> EscResult<Option<u64>> {
            match col.and_then(|c| row.get(c)) {
                None | Some(DataType::Empty) => Ok(None),
                Some(cell) => cell_count(cell).map(Some).context(ExcelWrongCellTypeSnafu {
                    lineno,
                    content: format!("{:?}", cell),
                }),
            }
        };

        let mut parties: BTreeMap<String, u64> = BTreeMap::new();
        let mut seats: i64 = 0;
        for (col, label) in party_columns.iter() {
            let votes = count(Some(*col))?.unwrap_or(0);
            if votes > 0 {
                if with_seats {
                    seats += count(Some(col + 1))?.unwrap_or(0) as i64;
                }
                parties.insert(label.to_string(), votes);
            }
        }

        let record = ConstituencyRecord {
            id: text_row.get(id_col).cloned().flatten().map(|s| normalize_id(&s)),
            name: name_col.and_then(|c| text_row.get(c).cloned().flatten()),
            seats: if with_seats { Some(seats) } else { None },
            census: count(census_col)?,
            valid_votes: count(valid_col)?,
            blank_votes: count(blank_col)?,
            null_votes: count(null_col)?,
            total_votes: count(total_col)?,
            abstention: None,
            parties: Some(parties),
        };
        debug!("parse_ministry_rows: line {}: {:?}", lineno, record);
        res.push(record);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    fn f(x: f64) -> DataType {
        DataType::Float(x)
    }

    fn e() -> DataType {
        DataType::Empty
    }

    fn sheet() -> Vec<Vec<DataType>> {
        vec![
            vec![s("Elecciones al Congreso"), e(), e(), e(), e(), e(), e(), e(), e(), e(), e(), e(), e()],
            vec![e(), e(), e(), e(), e(), e(), e(), e(), e(), s("Partido Popular"), e(), s("Vox"), e()],
            vec![e(), e(), e(), e(), e(), e(), e(), e(), e(), s("PP"), e(), s("VOX"), e()],
            vec![
                s("Nombre de Comunidad"),
                s("Código de Provincia"),
                s("Nombre de Provincia"),
                s("Población"),
                s("Total censo electoral"),
                s("Total votantes"),
                s("Votos válidos"),
                s("Votos en blanco"),
                s("Votos nulos"),
                s("Votos"),
                s("Diputados"),
                s("Votos"),
                s("Diputados"),
            ],
            vec![
                s("Andalucía"),
                f(4.0),
                s("Almería"),
                f(700000.0),
                f(1000.0),
                f(715.0),
                f(710.0),
                f(10.0),
                f(5.0),
                f(400.0),
                f(2.0),
                f(300.0),
                f(1.0),
            ],
            vec![
                s("Andalucía"),
                s("11"),
                s("Cádiz"),
                f(1200000.0),
                f(2000.0),
                f(900.0),
                f(900.0),
                f(0.0),
                f(0.0),
                f(900.0),
                f(3.0),
                f(0.0),
                f(0.0),
            ],
            vec![
                s("Total"),
                e(),
                e(),
                f(1900000.0),
                f(3000.0),
                f(1615.0),
                f(1610.0),
                f(10.0),
                f(5.0),
                f(1300.0),
                f(5.0),
                f(300.0),
                f(1.0),
            ],
        ]
    }

    #[test]
    fn reads_provinces() {
        let records = parse_ministry_rows(&sheet(), false).unwrap();
        assert_eq!(records.len(), 2);
        let almeria = &records[0];
        assert_eq!(almeria.id.as_deref(), Some("4"));
        assert_eq!(almeria.name.as_deref(), Some("Almería"));
        assert_eq!(almeria.seats, Some(3));
        assert_eq!(almeria.census, Some(1000));
        assert_eq!(almeria.total_votes, Some(715));
        assert_eq!(almeria.blank_votes, Some(10));
        let parties = almeria.parties.as_ref().unwrap();
        assert_eq!(parties.get("Partido Popular"), Some(&400));
        assert_eq!(parties.get("Vox"), Some(&300));

        // Parties without votes are left out.
        let cadiz = &records[1];
        assert_eq!(cadiz.id.as_deref(), Some("11"));
        assert_eq!(cadiz.seats, Some(3));
        assert_eq!(cadiz.parties.as_ref().map(|p| p.len()), Some(1));
    }

    #[test]
    fn abbreviations() {
        let records = parse_ministry_rows(&sheet(), true).unwrap();
        let parties = records[0].parties.as_ref().unwrap();
        assert_eq!(
            parties.keys().cloned().collect::<Vec<String>>(),
            vec!["PP", "VOX"]
        );
    }

    #[test]
    fn loads_into_store() {
        let records = parse_ministry_rows(&sheet(), false).unwrap();
        let store = ResultStore::load(records).unwrap();
        assert_eq!(store.get("4").map(|c| c.abstention()), Some(285));
    }

    #[test]
    fn wrong_cell() {
        let mut rows = sheet();
        rows[4][9] = s("many");
        assert!(matches!(
            parse_ministry_rows(&rows, false),
            Err(EscrutinioError::ExcelWrongCellType { lineno: 5, .. })
        ));
    }

    #[test]
    fn missing_header() {
        let rows = vec![vec![e(), s("PP"), s("VOX")]];
        assert!(matches!(
            parse_ministry_rows(&rows, false),
            Err(EscrutinioError::ExcelMissingHeader {})
        ));
    }
}
