use clap::Parser;

/// Seat apportionment (D'Hondt) and coalition scenarios over constituency election results.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the data sources and the scenarios to run.
    /// Relative paths in this file are read from the directory of the file. When given, the
    /// options that describe the input and the scenario on the command line are not used.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of the scenarios in JSON format. If provided,
    /// escrutinio will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the scenarios will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The file containing the results, when no configuration file is given.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (yaml, xlsx or csv) The type of the input. By default, it is guessed from the extension of the file.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path) A YAML file with the name and the seats of every constituency. Required by the csv input.
    #[clap(long, value_parser)]
    pub info: Option<String>,

    /// (file path) With the csv input, the results per municipality, added to the results per polling station.
    #[clap(long, value_parser)]
    pub municipios: Option<String>,

    /// (default: the first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (name or abbreviation, default name) When using an Excel file, the header row to take the party labels from.
    #[clap(long, value_parser)]
    pub party_labels: Option<String>,

    /// (fraction, default 0.03) The minimum share of the votes to get seats.
    #[clap(long, value_parser)]
    pub threshold: Option<f64>,

    /// (comma-separated labels, can be repeated) Merges the parties: the votes of all the labels go to the first one.
    #[clap(long, value_parser)]
    pub join: Option<Vec<String>>,

    /// Gives the blank votes to the first label of the first --join.
    #[clap(long, takes_value = false)]
    pub blank: bool,

    /// Gives the null votes to the first label of the first --join.
    #[clap(long, takes_value = false)]
    pub null: bool,

    /// (fraction) Gives this fraction of the abstention to the first label of the first --join.
    #[clap(long, value_parser)]
    pub abstention: Option<f64>,

    /// Also prints the seats won in every constituency.
    #[clap(long, takes_value = false)]
    pub detail: bool,

    /// (file path) Writes the loaded results as a YAML dataset.
    #[clap(long, value_parser)]
    pub convert: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
