use crate::escrutinio::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_juridiction: Option<String>,
}

/// The header of the JSON summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub jurisdiction: Option<String>,
    pub threshold: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// One of `yaml`, `xlsx` or `csv`.
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// YAML file with the name and the seats of every constituency.
    #[serde(rename = "infoPath")]
    pub info_path: Option<String>,
    /// Municipality results, added to the precinct results of `filePath`.
    #[serde(rename = "municipiosPath")]
    pub municipios_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// `name` (default) or `abbreviation`.
    #[serde(rename = "partyLabels")]
    pub party_labels: Option<String>,
}

impl FileSource {
    pub fn use_abbreviations(&self) -> EscResult<bool> {
        match self.party_labels.as_deref() {
            None | Some("name") => Ok(false),
            Some("abbreviation") => Ok(true),
            Some(x) => whatever!("Unknown partyLabels option: {:?}", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    /// A fraction (`0.03`) or a percentage (`"3%"`).
    pub threshold: Option<JSValue>,
}

/// Either a single label or a coalition, the first label receiving the votes.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinGroup {
    Single(String),
    Coalition(Vec<String>),
}

impl JoinGroup {
    pub fn to_merge_spec(&self) -> EscResult<MergeSpec> {
        match self {
            JoinGroup::Single(label) => Ok(MergeSpec::from(label.as_str())),
            JoinGroup::Coalition(labels) => match MergeSpec::from_labels(labels) {
                Some(spec) => Ok(spec),
                None => whatever!("Empty list of labels in joins"),
            },
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SpreadAbstention {
    pub fraction: f64,
    pub exclude: Option<Vec<String>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub joins: Option<Vec<JoinGroup>>,
    #[serde(rename = "blankVotes")]
    pub blank_votes: Option<bool>,
    #[serde(rename = "nullVotes")]
    pub null_votes: Option<bool>,
    pub abstention: Option<f64>,
    #[serde(rename = "spreadAbstention")]
    pub spread_abstention: Option<SpreadAbstention>,
    pub threshold: Option<JSValue>,
    pub detail: Option<bool>,
}

impl Scenario {
    pub fn merge_specs(&self) -> EscResult<Vec<MergeSpec>> {
        self.joins
            .iter()
            .flatten()
            .map(|g| g.to_merge_spec())
            .collect()
    }

    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            blank_votes: self.blank_votes.unwrap_or(false),
            null_votes: self.null_votes.unwrap_or(false),
            abstention: self.abstention.unwrap_or(0.0),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EscrutinioConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSources")]
    pub data_sources: Vec<FileSource>,
    pub rules: Option<Rules>,
    pub scenarios: Vec<Scenario>,
}

impl EscrutinioConfig {
    pub fn threshold(&self) -> EscResult<Threshold> {
        match self.rules.as_ref().and_then(|r| r.threshold.as_ref()) {
            Some(js) => read_js_threshold(js),
            None => Ok(Threshold::DEFAULT),
        }
    }
}

pub fn read_config(path: &str) -> EscResult<EscrutinioConfig> {
    let config_str = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: EscrutinioConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: String) -> EscResult<JSValue> {
    let contents = fs::read_to_string(&path).context(OpeningFileSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Reads `0.03`, `"0.03"` or `"3%"`.
pub fn read_js_threshold(x: &JSValue) -> EscResult<Threshold> {
    let res = match x {
        JSValue::Number(n) => match n.as_f64() {
            Some(f) => Threshold::new(f),
            None => return ParsingThresholdSnafu { content: x.to_string() }.fail(),
        },
        JSValue::String(s) => {
            let t = s.trim();
            let parsed = match t.strip_suffix('%') {
                Some(p) => p.trim().parse::<f64>().map(|f| f / 100.0),
                None => t.parse::<f64>(),
            };
            match parsed {
                Ok(f) => Threshold::new(f),
                Err(_) => return ParsingThresholdSnafu { content: s.clone() }.fail(),
            }
        }
        _ => return ParsingThresholdSnafu { content: x.to_string() }.fail(),
    };
    res.context(ApportionmentSnafu {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thresholds() {
        assert_eq!(read_js_threshold(&json!("3%")).unwrap(), Threshold::DEFAULT);
        assert_eq!(read_js_threshold(&json!(0.03)).unwrap(), Threshold::DEFAULT);
        assert_eq!(read_js_threshold(&json!("0.03")).unwrap(), Threshold::DEFAULT);
        assert_eq!(read_js_threshold(&json!(0)).unwrap(), Threshold::NONE);
        assert!(matches!(
            read_js_threshold(&json!("three")),
            Err(EscrutinioError::ParsingThreshold { .. })
        ));
        assert!(matches!(
            read_js_threshold(&json!(1.5)),
            Err(EscrutinioError::Apportionment { .. })
        ));
    }

    #[test]
    fn scenario_joins() {
        let s: Scenario = serde_json::from_value(json!({
            "name": "left",
            "joins": [["PSOE-A", "ADELANTE ANDALUCIA"], "PP"],
            "blankVotes": true,
            "abstention": 0.1
        }))
        .unwrap();
        let specs = s.merge_specs().unwrap();
        assert_eq!(
            specs,
            vec![
                MergeSpec::new("PSOE-A", &["ADELANTE ANDALUCIA"]),
                MergeSpec::from("PP")
            ]
        );
        let opts = s.join_options();
        assert!(opts.blank_votes);
        assert!(!opts.null_votes);
        assert_eq!(opts.abstention, 0.1);
        assert_eq!(s.detail, None);
    }

    #[test]
    fn empty_coalition() {
        let g = JoinGroup::Coalition(vec![]);
        assert!(g.to_merge_spec().is_err());
    }

    #[test]
    fn party_labels() {
        let mut source = FileSource {
            provider: "xlsx".to_string(),
            file_path: "x.xlsx".to_string(),
            info_path: None,
            municipios_path: None,
            excel_worksheet_name: None,
            party_labels: None,
        };
        assert!(!source.use_abbreviations().unwrap());
        source.party_labels = Some("abbreviation".to_string());
        assert!(source.use_abbreviations().unwrap());
        source.party_labels = Some("acronym".to_string());
        assert!(source.use_abbreviations().is_err());
    }
}
