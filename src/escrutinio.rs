use log::{debug, info, warn};

use seat_allocation::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::escrutinio::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_xlsx;
mod io_yaml;

#[derive(Debug, Snafu)]
pub enum EscrutinioError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The spreadsheet has no worksheet"))]
    EmptyExcel {},
    #[snafu(display("The spreadsheet has no worksheet named {name}"))]
    MissingWorksheet { name: String },
    #[snafu(display("Could not find the party names and the column names in the spreadsheet"))]
    ExcelMissingHeader {},
    #[snafu(display("Unexpected cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error parsing the YAML file {path}"))]
    ParsingYaml {
        source: serde_yaml::Error,
        path: String,
    },
    #[snafu(display("Error writing YAML"))]
    WritingYaml { source: serde_yaml::Error },
    #[snafu(display("Error reading JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Cannot read the threshold {content}"))]
    ParsingThreshold { content: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Missing field {field} in record {record}"))]
    MissingField { field: String, record: usize },
    #[snafu(display("Cannot read field {field} in record {record}: {content}"))]
    WrongFieldType {
        field: String,
        record: usize,
        content: String,
    },
    #[snafu(display("Constituency {id} is not listed in the info file"))]
    UnknownConstituency { id: String },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("{source}"))]
    Apportionment { source: ApportionmentError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type EscResult<T> = Result<T, EscrutinioError>;

/// The outcome of one scenario.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub threshold: Threshold,
    pub report: SeatsReport,
}

fn seats_to_json(seats: &[(String, u32)]) -> Vec<JSValue> {
    seats
        .iter()
        .map(|(party, s)| json!({"party": party, "seats": s}))
        .collect()
}

fn scenario_to_json(sr: &ScenarioResult) -> JSValue {
    let mut js: JSMap<String, JSValue> = JSMap::new();
    js.insert("scenario".to_string(), json!(sr.name));
    js.insert("threshold".to_string(), json!(sr.threshold.to_string()));
    js.insert("totalSeats".to_string(), json!(sr.report.total_seats()));
    js.insert(
        "totals".to_string(),
        json!(seats_to_json(&sr.report.totals)),
    );
    if !sr.report.detail.is_empty() {
        let detail: Vec<JSValue> = sr
            .report
            .detail
            .iter()
            .map(|d| json!({"codcir": d.id, "nombre": d.name, "seats": seats_to_json(&d.seats)}))
            .collect();
        js.insert("detail".to_string(), json!(detail));
    }
    JSValue::Object(js)
}

fn build_summary_js(
    config: &EscrutinioConfig,
    threshold: Threshold,
    results: &[ScenarioResult],
) -> JSValue {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_juridiction.clone(),
        threshold: Some(threshold.to_string()),
    };
    let results_js: Vec<JSValue> = results.iter().map(scenario_to_json).collect();
    json!({"config": c, "results": results_js})
}

fn format_seats(seats: &[(String, u32)]) -> String {
    seats
        .iter()
        .map(|(party, s)| format!("{}: {}", party, s))
        .collect::<Vec<String>>()
        .join(", ")
}

fn print_result(sr: &ScenarioResult) {
    println!(
        "{} ({}, threshold {}): {}",
        sr.name,
        sr.report.total_seats(),
        sr.threshold,
        format_seats(&sr.report.totals)
    );
    for d in sr.report.detail.iter() {
        println!(
            "  {} {}: {}",
            d.id,
            d.name.as_deref().unwrap_or(""),
            format_seats(&d.seats)
        );
    }
}

fn read_source(root_path: &Path, cfs: &FileSource) -> EscResult<Vec<ConstituencyRecord>> {
    let resolve = |p: &str| -> String {
        let pb: PathBuf = root_path.join(p);
        pb.as_path().display().to_string()
    };
    let p = resolve(&cfs.file_path);
    info!("read_source: provider: {} path: {:?}", cfs.provider, p);
    let info_o = match &cfs.info_path {
        Some(ip) => Some(io_yaml::read_info(&resolve(ip))?),
        None => None,
    };
    let mut records = match cfs.provider.as_str() {
        "yaml" => io_yaml::read_yaml_dataset(&p)?,
        "xlsx" => io_xlsx::read_ministry_xlsx(&p, cfs)?,
        "csv" => {
            let info = match &info_o {
                Some(x) => x,
                None => whatever!("The csv provider needs an infoPath with the seats"),
            };
            let municipios = cfs.municipios_path.as_ref().map(|m| resolve(m));
            return io_csv::read_precinct_csv(&p, municipios.as_deref(), info);
        }
        x => whatever!("Provider not implemented {:?}", x),
    };
    // The info file overrides the names and the seats of the dataset.
    if let Some(info) = info_o {
        for r in records.iter_mut() {
            if let Some(i) = info.iter().find(|i| Some(&i.id) == r.id.as_ref()) {
                r.seats = Some(i.seats);
                if i.name.is_some() {
                    r.name = i.name.clone();
                }
            }
        }
    }
    Ok(records)
}

fn load_store(root_path: &Path, sources: &[FileSource]) -> EscResult<ResultStore> {
    if sources.is_empty() {
        whatever!("No data source in the configuration");
    }
    let mut data: Vec<ConstituencyRecord> = Vec::new();
    for cfs in sources.iter() {
        let mut file_data = read_source(root_path, cfs)?;
        data.append(&mut file_data);
    }
    let store = ResultStore::load(data).context(ApportionmentSnafu {})?;
    info!("load_store: {} constituencies", store.len());
    Ok(store)
}

/// Runs every scenario from a fresh copy of the data.
pub fn run_scenarios(
    store: &ResultStore,
    threshold: Threshold,
    scenarios: &[Scenario],
) -> EscResult<Vec<ScenarioResult>> {
    let mut session = Session::new(store, threshold);
    let mut res: Vec<ScenarioResult> = Vec::new();
    for sc in scenarios.iter() {
        info!("run_scenarios: {}", sc.name);
        session.reset();
        if let Some(t) = &sc.threshold {
            session.set_threshold(read_js_threshold(t)?);
        }
        let specs = sc.merge_specs()?;
        let options = sc.join_options();
        if !specs.is_empty() {
            session.join(&specs, &options).context(ApportionmentSnafu {})?;
        } else if options != JoinOptions::NONE {
            warn!(
                "run_scenarios: {}: extra votes requested without joins, ignored",
                sc.name
            );
        }
        if let Some(sa) = &sc.spread_abstention {
            let excluded = sa.exclude.clone().unwrap_or_default();
            session
                .spread_abstention(sa.fraction, &excluded)
                .context(ApportionmentSnafu {})?;
        }
        let report = session.seats(&SeatsOptions {
            detail: sc.detail.unwrap_or(false),
        });
        debug!("run_scenarios: {}: {:?}", sc.name, report);
        res.push(ScenarioResult {
            name: sc.name.clone(),
            threshold: session.threshold(),
            report,
        });
    }
    Ok(res)
}

/// Builds a configuration from the command line, when no configuration file
/// is given. A single scenario is run.
fn config_from_args(args: &Args) -> EscResult<EscrutinioConfig> {
    let input = match &args.input {
        Some(x) => x.clone(),
        None => whatever!("Either --config or --input must be given"),
    };
    let provider = match &args.input_type {
        Some(x) => x.clone(),
        None => {
            let ext = Path::new(&input)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            match ext.as_deref() {
                Some("yml") | Some("yaml") => "yaml".to_string(),
                Some("xlsx") => "xlsx".to_string(),
                Some("csv") => "csv".to_string(),
                _ => whatever!("Cannot guess the type of {}, use --input-type", input),
            }
        }
    };
    let joins: Vec<JoinGroup> = args
        .join
        .iter()
        .flatten()
        .map(|j| {
            JoinGroup::Coalition(
                j.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )
        })
        .collect();
    let threshold = match args.threshold {
        Some(t) => Some(json!(t)),
        None => None,
    };
    Ok(EscrutinioConfig {
        output_settings: OutputSettings {
            contest_name: io_common::simplify_file_name(&input),
            output_directory: None,
            contest_date: None,
            contest_juridiction: None,
        },
        data_sources: vec![FileSource {
            provider,
            file_path: input,
            info_path: args.info.clone(),
            municipios_path: args.municipios.clone(),
            excel_worksheet_name: args.excel_worksheet_name.clone(),
            party_labels: args.party_labels.clone(),
        }],
        rules: Some(Rules { threshold }),
        scenarios: vec![Scenario {
            name: "escrutinio".to_string(),
            joins: if joins.is_empty() { None } else { Some(joins) },
            blank_votes: Some(args.blank),
            null_votes: Some(args.null),
            abstention: args.abstention,
            spread_abstention: None,
            threshold: None,
            detail: Some(args.detail),
        }],
    })
}

pub fn run_election(args: &Args) -> EscResult<()> {
    let (config, root_p): (EscrutinioConfig, PathBuf) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root_p = Path::new(config_path.as_str())
                .parent()
                .context(MissingParentDirSnafu {})?;
            (config, root_p.to_path_buf())
        }
        None => (config_from_args(args)?, PathBuf::new()),
    };
    info!("config: {:?}", config);

    let threshold = config.threshold()?;
    let store = load_store(&root_p, &config.data_sources)?;

    if let Some(convert_p) = &args.convert {
        io_yaml::write_yaml_dataset(convert_p, store.constituencies())?;
    }

    let results = run_scenarios(&store, threshold, &config.scenarios)?;
    for sr in results.iter() {
        print_result(sr);
    }

    let result_js = build_summary_js(&config, threshold, &results);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path = args.out.clone().or_else(|| {
        config
            .output_settings
            .output_directory
            .as_ref()
            .map(|d| root_p.join(d).join("summary.json").display().to_string())
    });
    match out_path.as_deref() {
        Some("stdout") => println!("{}", pretty_js_stats),
        Some(p) => {
            info!("Writing summary to {}", p);
            fs::write(p, &pretty_js_stats).context(WritingFileSnafu { path: p })?;
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.reference.clone() {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
fn test_args(config: &str, reference: Option<&str>) -> Args {
    let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");
    Args {
        config: Some(format!("{}/{}", test_dir, config)),
        reference: reference.map(|r| format!("{}/{}", test_dir, r)),
        ..Args::default()
    }
}

#[cfg(test)]
fn run_election_test(config: &str, reference: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let res = run_election(&test_args(config, Some(reference)));
    if let Err(e) = &res {
        eprintln!("An error occured {}", e);
        if let Some(bt) = snafu::ErrorCompat::backtrace(e) {
            eprintln!("trace: {}", bt);
        }
    }
    assert!(res.is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResultStore {
        let p = concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/data/andalucia_2018/circunscripciones.yml"
        );
        ResultStore::load(io_yaml::read_yaml_dataset(p).unwrap()).unwrap()
    }

    #[test]
    fn andalucia_2018_scenarios() {
        run_election_test(
            "andalucia_2018/andalucia_2018_config.json",
            "andalucia_2018/andalucia_2018_expected_summary.json",
        );
    }

    #[test]
    fn andalucia_precincts() {
        run_election_test(
            "andalucia/andalucia_config.json",
            "andalucia/andalucia_expected_summary.json",
        );
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let res = run_election(&test_args(
            "andalucia_2018/andalucia_2018_config.json",
            Some("andalucia/andalucia_expected_summary.json"),
        ));
        assert!(matches!(res, Err(EscrutinioError::Whatever { .. })));
    }

    #[test]
    fn scenarios_start_from_the_loaded_data() {
        let store = store();
        let merged: Scenario = serde_json::from_value(json!({
            "name": "merged",
            "joins": [["PP", "Cs", "VOX"]]
        }))
        .unwrap();
        let base: Scenario = serde_json::from_value(json!({"name": "base"})).unwrap();
        let res = run_scenarios(
            &store,
            Threshold::DEFAULT,
            &[base.clone(), merged, base],
        )
        .unwrap();
        assert_eq!(res[0].report, res[2].report);
        assert_ne!(res[0].report, res[1].report);
        assert_eq!(res[1].report.seats_of("Cs"), 0);
        assert_eq!(res[0].report.total_seats(), res[1].report.total_seats());
    }

    #[test]
    fn scenario_threshold_is_not_kept() {
        let store = store();
        let strict: Scenario =
            serde_json::from_value(json!({"name": "strict", "threshold": "50%"})).unwrap();
        let base: Scenario = serde_json::from_value(json!({"name": "base"})).unwrap();
        let res = run_scenarios(&store, Threshold::DEFAULT, &[strict, base]).unwrap();
        assert_eq!(res[0].threshold, Threshold::from_percent(50.0).unwrap());
        assert_eq!(res[1].threshold, Threshold::DEFAULT);
    }

    #[test]
    fn invalid_fraction() {
        let store = store();
        let sc: Scenario = serde_json::from_value(json!({
            "name": "too much",
            "joins": ["PP"],
            "abstention": 1.5
        }))
        .unwrap();
        let res = run_scenarios(&store, Threshold::DEFAULT, &[sc]);
        assert!(matches!(
            res,
            Err(EscrutinioError::Apportionment {
                source: ApportionmentError::InvalidScenario { .. }
            })
        ));
    }

    #[test]
    fn convert_then_read_back() {
        let out = std::env::temp_dir().join("escrutinio_convert_test.yml");
        let out_s = out.display().to_string();
        let args = Args {
            convert: Some(out_s.clone()),
            ..test_args("andalucia/andalucia_config.json", None)
        };
        run_election(&args).unwrap();
        let back = ResultStore::load(io_yaml::read_yaml_dataset(&out_s).unwrap()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get("4").map(|c| c.census), Some(1701));
        let _ = fs::remove_file(out);
    }

    #[test]
    fn command_line_scenario() {
        let args = Args {
            input: Some(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/tests/data/andalucia_2018/circunscripciones.yml"
            )
            .to_string()),
            join: Some(vec!["PP,Cs".to_string()]),
            threshold: Some(0.03),
            ..Args::default()
        };
        let config = config_from_args(&args).unwrap();
        assert_eq!(config.data_sources[0].provider, "yaml");
        assert_eq!(
            config.scenarios[0].merge_specs().unwrap(),
            vec![MergeSpec::new("PP", &["Cs"])]
        );
        assert_eq!(config.threshold().unwrap(), Threshold::DEFAULT);
        assert!(run_election(&args).is_ok());
    }

    #[test]
    fn unknown_input_type() {
        let args = Args {
            input: Some("results.ods".to_string()),
            ..Args::default()
        };
        assert!(matches!(
            config_from_args(&args),
            Err(EscrutinioError::Whatever { .. })
        ));
    }
}
