// Reading and writing the YAML datasets: one document per constituency.

use std::collections::BTreeMap;

use serde_yaml::Value as YValue;

use crate::escrutinio::{io_common::normalize_id, io_common::simplify_file_name, *};

/// A constituency as written in a YAML document.
///
/// Counts may be written as numbers or as strings. Unknown keys are skipped.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct YamlConstituency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codcir: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diputados: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub censo: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validos: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blancos: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nulos: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votos: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstencion: Option<YValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partidos: Option<BTreeMap<String, YValue>>,
}

/// The name and the seats of a constituency, as found in the info files that
/// come with the precinct results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyInfo {
    pub id: String,
    pub name: Option<String>,
    pub seats: i64,
}

pub fn read_yaml_dataset(path: &str) -> EscResult<Vec<ConstituencyRecord>> {
    info!("read_yaml_dataset: reading {}", simplify_file_name(path));
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    parse_yaml_dataset(&contents, path)
}

pub fn parse_yaml_dataset(contents: &str, path: &str) -> EscResult<Vec<ConstituencyRecord>> {
    let mut res: Vec<ConstituencyRecord> = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(contents) {
        let yc_o = Option::<YamlConstituency>::deserialize(doc).context(ParsingYamlSnafu { path })?;
        // Empty documents, for instance after a trailing separator.
        if let Some(yc) = yc_o {
            let record = yaml_to_record(res.len(), &yc)?;
            debug!("parse_yaml_dataset: {:?}", record);
            res.push(record);
        }
    }
    Ok(res)
}

fn yaml_to_record(record: usize, yc: &YamlConstituency) -> EscResult<ConstituencyRecord> {
    let parties = match &yc.partidos {
        Some(m) => {
            let mut parties: BTreeMap<String, u64> = BTreeMap::new();
            for (label, v) in m.iter() {
                if let Some(votes) = read_yaml_count(record, label, &Some(v.clone()))? {
                    parties.insert(label.clone(), votes);
                }
            }
            Some(parties)
        }
        None => None,
    };
    Ok(ConstituencyRecord {
        id: read_yaml_string(record, "codcir", &yc.codcir)?.map(|s| normalize_id(&s)),
        name: read_yaml_string(record, "nombre", &yc.nombre)?,
        seats: read_yaml_int(record, "diputados", &yc.diputados)?,
        census: read_yaml_count(record, "censo", &yc.censo)?,
        valid_votes: read_yaml_count(record, "validos", &yc.validos)?,
        blank_votes: read_yaml_count(record, "blancos", &yc.blancos)?,
        null_votes: read_yaml_count(record, "nulos", &yc.nulos)?,
        total_votes: read_yaml_count(record, "votos", &yc.votos)?,
        abstention: read_yaml_int(record, "abstencion", &yc.abstencion)?,
        parties,
    })
}

fn read_yaml_string(record: usize, field: &str, x: &Option<YValue>) -> EscResult<Option<String>> {
    match x {
        None | Some(YValue::Null) => Ok(None),
        Some(YValue::String(s)) => Ok(Some(s.clone())),
        Some(YValue::Number(n)) => Ok(Some(n.to_string())),
        Some(v) => WrongFieldTypeSnafu {
            field,
            record,
            content: format!("{:?}", v),
        }
        .fail(),
    }
}

fn read_yaml_int(record: usize, field: &str, x: &Option<YValue>) -> EscResult<Option<i64>> {
    let res = match x {
        None | Some(YValue::Null) => return Ok(None),
        Some(YValue::Number(n)) => n.as_i64(),
        Some(YValue::String(s)) => {
            let t = s.trim();
            match t.strip_prefix('-') {
                Some(rest) => io_common::parse_count(rest)
                    .and_then(|n| i64::try_from(n).ok())
                    .and_then(i64::checked_neg),
                None => io_common::parse_count(t).and_then(|n| i64::try_from(n).ok()),
            }
        }
        Some(_) => None,
    };
    res.map(Some).context(WrongFieldTypeSnafu {
        field,
        record,
        content: format!("{:?}", x),
    })
}

fn read_yaml_count(record: usize, field: &str, x: &Option<YValue>) -> EscResult<Option<u64>> {
    let res = match x {
        None | Some(YValue::Null) => return Ok(None),
        Some(YValue::Number(n)) => n.as_u64(),
        Some(YValue::String(s)) => io_common::parse_count(s),
        Some(_) => None,
    };
    res.map(Some).context(WrongFieldTypeSnafu {
        field,
        record,
        content: format!("{:?}", x),
    })
}

fn yaml_id(id: &str) -> YValue {
    match id.parse::<u64>() {
        Ok(n) => YValue::Number(n.into()),
        Err(_) => YValue::String(id.to_string()),
    }
}

fn yaml_count(n: u64) -> Option<YValue> {
    Some(YValue::Number(n.into()))
}

pub fn constituency_to_yaml(c: &Constituency) -> YamlConstituency {
    YamlConstituency {
        codcir: Some(yaml_id(&c.id)),
        nombre: c.name.clone().map(YValue::String),
        diputados: yaml_count(c.seats as u64),
        censo: yaml_count(c.census),
        validos: yaml_count(c.valid_votes),
        blancos: yaml_count(c.blank_votes),
        nulos: yaml_count(c.null_votes),
        votos: yaml_count(c.total_votes),
        abstencion: yaml_count(c.abstention()),
        partidos: Some(
            c.parties
                .iter()
                .map(|(label, votes)| (label.clone(), YValue::Number((*votes).into())))
                .collect(),
        ),
    }
}

/// Orders the constituencies by identifier, numerically when both are numbers.
fn id_order(a: &Constituency, b: &Constituency) -> std::cmp::Ordering {
    match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.id.cmp(&b.id),
    }
}

/// Writes the constituencies as a YAML stream, sorted by identifier.
pub fn dataset_to_yaml_string(constituencies: &[Constituency]) -> EscResult<String> {
    let mut sorted: Vec<&Constituency> = constituencies.iter().collect();
    sorted.sort_by(|a, b| id_order(a, b));
    let mut docs: Vec<String> = Vec::new();
    for c in sorted {
        let s = serde_yaml::to_string(&constituency_to_yaml(c)).context(WritingYamlSnafu {})?;
        docs.push(s);
    }
    Ok(docs.join("---\n"))
}

pub fn write_yaml_dataset(path: &str, constituencies: &[Constituency]) -> EscResult<()> {
    let contents = dataset_to_yaml_string(constituencies)?;
    info!(
        "write_yaml_dataset: writing {} constituencies to {}",
        constituencies.len(),
        path
    );
    fs::write(path, contents).context(WritingFileSnafu { path })
}

pub fn read_info(path: &str) -> EscResult<Vec<ConstituencyInfo>> {
    info!("read_info: reading {}", simplify_file_name(path));
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    parse_info(&contents, path)
}

pub fn parse_info(contents: &str, path: &str) -> EscResult<Vec<ConstituencyInfo>> {
    let mut res: Vec<ConstituencyInfo> = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(contents) {
        let yc_o = Option::<YamlConstituency>::deserialize(doc).context(ParsingYamlSnafu { path })?;
        if let Some(yc) = yc_o {
            let record = res.len();
            let id = read_yaml_string(record, "codcir", &yc.codcir)?
                .context(MissingFieldSnafu {
                    field: "codcir",
                    record,
                })?;
            let seats = read_yaml_int(record, "diputados", &yc.diputados)?
                .context(MissingFieldSnafu {
                    field: "diputados",
                    record,
                })?;
            res.push(ConstituencyInfo {
                id: normalize_id(&id),
                name: read_yaml_string(record, "nombre", &yc.nombre)?,
                seats,
            });
        }
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seat_allocation::builder::ConstituencyBuilder;

    const DATASET: &str = "
codcir: 4
nombre: Almería
diputados: 12
censo: 1000
blancos: 10
nulos: 5
url: https://example.org/04
partidos:
  PP: 400
  PSOE-A: '300'
  VOX: 0
---
codcir: '11'
nombre: Cádiz
diputados: 15
censo: '2.000'
blancos: 0
nulos: 0
votos: 900
partidos:
  PP: 500
  Cs: 400
---
";

    #[test]
    fn reads_documents() {
        let records = parse_yaml_dataset(DATASET, "test").unwrap();
        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.id.as_deref(), Some("4"));
        assert_eq!(r.name.as_deref(), Some("Almería"));
        assert_eq!(r.seats, Some(12));
        assert_eq!(r.census, Some(1000));
        assert_eq!(r.valid_votes, None);
        let parties = r.parties.as_ref().unwrap();
        assert_eq!(parties.get("PSOE-A"), Some(&300));
        assert_eq!(parties.get("VOX"), Some(&0));
        assert_eq!(records[1].id.as_deref(), Some("11"));
        assert_eq!(records[1].census, Some(2000));
        assert_eq!(records[1].total_votes, Some(900));
    }

    #[test]
    fn rejects_wrong_counts() {
        let res = parse_yaml_dataset("codcir: 1\ncenso: [1, 2]\n", "test");
        assert!(matches!(
            res,
            Err(EscrutinioError::WrongFieldType { record: 0, .. })
        ));
        let res = parse_yaml_dataset("codcir: 1\npartidos:\n  A: many\n", "test");
        assert!(matches!(res, Err(EscrutinioError::WrongFieldType { .. })));
    }

    #[test]
    fn negative_seats_are_read() {
        let records = parse_yaml_dataset("codcir: 1\ndiputados: -2\n", "test").unwrap();
        assert_eq!(records[0].seats, Some(-2));
        let records = parse_yaml_dataset("codcir: 1\ndiputados: '-3'\n", "test").unwrap();
        assert_eq!(records[0].seats, Some(-3));
    }

    #[test]
    fn out_of_range_integers() {
        for doc in [
            "codcir: 1\ndiputados: '9999999999999999999'\n",
            "codcir: 1\ndiputados: '-9223372036854775808'\n",
            "codcir: 1\ndiputados: 9999999999999999999\n",
        ] {
            let res = parse_yaml_dataset(doc, "test");
            assert!(
                matches!(res, Err(EscrutinioError::WrongFieldType { record: 0, .. })),
                "{}: {:?}",
                doc,
                res
            );
        }
    }

    #[test]
    fn converted_dataset_reads_back() {
        let store = ResultStore::load(parse_yaml_dataset(DATASET, "test").unwrap()).unwrap();
        let written = dataset_to_yaml_string(store.constituencies()).unwrap();
        let back = ResultStore::load(parse_yaml_dataset(&written, "written").unwrap()).unwrap();
        assert_eq!(back.constituencies(), store.constituencies());
        assert!(written.contains("abstencion: 285"));
    }

    #[test]
    fn sorted_by_identifier() {
        let records: Vec<ConstituencyRecord> = ["41", "4", "11"]
            .iter()
            .map(|id| {
                ConstituencyBuilder::new(id)
                    .seats(1)
                    .census(10)
                    .blank(0)
                    .null(0)
                    .party("A", 1)
                    .record()
            })
            .collect();
        let store = ResultStore::load(records).unwrap();
        let written = dataset_to_yaml_string(store.constituencies()).unwrap();
        let ids: Vec<String> = parse_yaml_dataset(&written, "written")
            .unwrap()
            .into_iter()
            .filter_map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["4", "11", "41"]);
    }

    #[test]
    fn info_entries() {
        let info = parse_info(
            "codcir: 4\nnombre: Almería\ndiputados: 12\nurl: x\n---\ncodcir: 11\ndiputados: 15\n",
            "info",
        )
        .unwrap();
        assert_eq!(
            info,
            vec![
                ConstituencyInfo {
                    id: "4".to_string(),
                    name: Some("Almería".to_string()),
                    seats: 12
                },
                ConstituencyInfo {
                    id: "11".to_string(),
                    name: None,
                    seats: 15
                }
            ]
        );
        assert!(matches!(
            parse_info("codcir: 4\n", "info"),
            Err(EscrutinioError::MissingField { .. })
        ));
    }
}
