// Primitives for reading the precinct CSV files.
//
// The files are separated by ';' and encoded in ISO-8859-1. Every row holds
// the results of one polling station (mesas) or one municipality
// (municipios), and the constituency it belongs to in the Codcir column.

use std::collections::{BTreeMap, HashSet};

use seat_allocation::builder::ConstituencyBuilder;

use crate::escrutinio::{
    io_common::{decode_latin1, normalize_id, parse_column_key, parse_count, simplify_file_name},
    io_common::{ColumnKey, CountField},
    io_yaml::ConstituencyInfo,
    *,
};

const ID_COLUMN: &str = "codcir";

struct Tally {
    builder: ConstituencyBuilder,
    counts: BTreeMap<CountField, u64>,
    rows: usize,
}

impl Tally {
    fn new(info: &ConstituencyInfo) -> Tally {
        let mut builder = ConstituencyBuilder::new(&info.id).seats(info.seats);
        if let Some(name) = &info.name {
            builder = builder.name(name);
        }
        Tally {
            builder,
            counts: BTreeMap::new(),
            rows: 0,
        }
    }

    fn into_record(self) -> ConstituencyRecord {
        let mut b = self.builder;
        for (field, v) in self.counts {
            b = match field {
                CountField::Census => b.census(v),
                CountField::Total => b.total(v),
                CountField::Valid => b.valid(v),
                CountField::Blank => b.blank(v),
                CountField::Null => b.null(v),
                CountField::Abstention => b.abstention(v as i64),
            };
        }
        b.record()
    }
}

/// Adds up the precinct results per constituency.
///
/// The municipality file only contributes the columns that the polling
/// station file does not have. The seats and the names come from `info`,
/// which also lists the constituencies in output order.
pub fn read_precinct_csv(
    mesas_path: &str,
    municipios_path: Option<&str>,
    info: &[ConstituencyInfo],
) -> EscResult<Vec<ConstituencyRecord>> {
    let mut tallies: BTreeMap<String, Tally> = info
        .iter()
        .map(|i| (i.id.clone(), Tally::new(i)))
        .collect();

    let mesa_keys = add_rows(mesas_path, &HashSet::new(), &mut tallies)?;
    if let Some(path) = municipios_path {
        add_rows(path, &mesa_keys, &mut tallies)?;
    }

    let mut res: Vec<ConstituencyRecord> = Vec::new();
    for i in info.iter() {
        if let Some(tally) = tallies.remove(&i.id) {
            if tally.rows == 0 {
                warn!("read_precinct_csv: no rows for constituency {}", i.id);
            }
            res.push(tally.into_record());
        }
    }
    Ok(res)
}

/// Adds the rows of one file to the tallies, skipping the columns listed in
/// `skipped_keys`. Returns the column names of the file.
fn add_rows(
    path: &str,
    skipped_keys: &HashSet<String>,
    tallies: &mut BTreeMap<String, Tally>,
) -> EscResult<HashSet<String>> {
    info!("add_rows: reading {}", simplify_file_name(path));
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut records = rdr.byte_records();
    let header: Vec<String> = match records.next() {
        Some(r) => r
            .context(CsvLineParseSnafu { lineno: 1_usize })?
            .iter()
            .map(|b| decode_latin1(b).trim().to_string())
            .collect(),
        None => whatever!("The file {} is empty", path),
    };
    let keys: Vec<ColumnKey> = header.iter().map(|h| parse_column_key(h)).collect();
    debug!("add_rows: header: {:?} keys: {:?}", header, keys);
    let id_idx = header
        .iter()
        .position(|h| h.to_lowercase() == ID_COLUMN)
        .context(MissingFieldSnafu {
            field: "Codcir",
            record: 0_usize,
        })?;

    for (idx, line_r) in records.enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let values: Vec<String> = line
            .iter()
            .map(|b| decode_latin1(b).trim().to_string())
            .collect();
        let id = match values.get(id_idx) {
            Some(x) if !x.is_empty() && x != "Total" => normalize_id(x),
            _ => continue,
        };
        let tally = tallies
            .get_mut(&id)
            .context(UnknownConstituencySnafu { id: id.clone() })?;
        tally.rows += 1;

        for ((name, key), value) in header.iter().zip(keys.iter()).zip(values.iter()) {
            if name.is_empty() || value.is_empty() || skipped_keys.contains(name) {
                continue;
            }
            if *key == ColumnKey::Ignored {
                continue;
            }
            let v = parse_count(value).context(WrongFieldTypeSnafu {
                field: name.clone(),
                record: lineno,
                content: value.clone(),
            })?;
            match key {
                ColumnKey::Field(f) => *tally.counts.entry(*f).or_insert(0) += v,
                ColumnKey::Party(label) => tally.builder.add_party_votes(label, v),
                ColumnKey::Ignored => {}
            }
        }
    }
    Ok(header.into_iter().collect())
}
