use gazetteer::classify::Classifier;
use gazetteer::config::PoiConfig;
use gazetteer::extract::{extract_to_csv, ExtractOptions, OutputPaths};
use gazetteer::ignore::IgnoreMode;
use gazetteer::osm::find_default_pbf;
use gazetteer::Result;
use log::info;
use std::env;
use std::path::PathBuf;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    config: PathBuf,
    outputs: OutputPaths,
    options: ExtractOptions,
    ignore_mode: Option<IgnoreMode>,
}

fn print_usage() {
    println!(
        "Usage: extract_gazetteer --config FILE [--input FILE] [--pois FILE] [--streets FILE] \
         [--rest FILE] [--distance METERS] [--name-max-length N] [--ignore-mode MODE]\n"
    );
    println!("--config           POI rule configuration (XML).");
    println!(
        "--input            Path to a .pbf or .osm file. Defaults to the only .pbf in the current folder."
    );
    println!("--pois             POI output CSV path. Defaults to pois.csv.");
    println!("--streets          Street output CSV path. Defaults to streets.csv.");
    println!("--rest             Write a histogram of unclassified tags to this CSV path.");
    println!("--distance         Road grouping distance in meters. Defaults to 500.");
    println!("--name-max-length  Longer POI names are cut and end in an ellipsis. Defaults to 100.");
    println!("--ignore-mode      on-match or always. Overrides the configuration file.");
}

fn parse_args<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut input = None;
    let mut config = None;
    let mut pois = PathBuf::from("pois.csv");
    let mut streets = PathBuf::from("streets.csv");
    let mut rest = None;
    let mut options = ExtractOptions::default();
    let mut ignore_mode = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input" => {
                input = Some(
                    args.next()
                        .ok_or("--input requires a path")
                        .map(PathBuf::from)?,
                );
            }
            "--config" => {
                config = Some(
                    args.next()
                        .ok_or("--config requires a path")
                        .map(PathBuf::from)?,
                );
            }
            "--pois" => {
                pois = args
                    .next()
                    .ok_or("--pois requires a path")
                    .map(PathBuf::from)?;
            }
            "--streets" => {
                streets = args
                    .next()
                    .ok_or("--streets requires a path")
                    .map(PathBuf::from)?;
            }
            "--rest" => {
                rest = Some(
                    args.next()
                        .ok_or("--rest requires a path")
                        .map(PathBuf::from)?,
                );
            }
            "--distance" => {
                let value = args.next().ok_or("--distance requires a value")?;
                options.distance_m = value
                    .parse::<f64>()
                    .ok()
                    .filter(|distance| distance.is_finite() && *distance >= 0.0)
                    .ok_or_else(|| format!("invalid distance: {value}"))?;
            }
            "--name-max-length" => {
                let value = args.next().ok_or("--name-max-length requires a value")?;
                options.name_max_length = value
                    .parse::<usize>()
                    .ok()
                    .filter(|length| *length > 0)
                    .ok_or_else(|| format!("invalid name length: {value}"))?;
            }
            "--ignore-mode" => {
                let value = args.next().ok_or("--ignore-mode requires a value")?;
                ignore_mode = Some(
                    IgnoreMode::parse(&value)
                        .ok_or_else(|| format!("unknown ignore mode: {value}"))?,
                );
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            _ => return Err(format!("unknown argument: {arg}").into()),
        }
    }

    let config = config.ok_or("--config is required")?;
    let input = match input {
        Some(path) => path,
        None => find_default_pbf(&env::current_dir()?)?,
    };

    Ok(Args {
        input,
        config,
        outputs: OutputPaths {
            pois,
            streets,
            rest,
        },
        options,
        ignore_mode,
    })
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;

    let mut config = PoiConfig::from_path(&args.config)?;
    if let Some(mode) = args.ignore_mode {
        config.set_ignore_mode(mode);
    }
    let classifier = Classifier::new(config);
    info!(
        "loaded {} categories from {}",
        classifier.registry().len(),
        args.config.display()
    );

    extract_to_csv(&args.input, &classifier, &args.options, &args.outputs)
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn defaults_apply() {
        let parsed = parse_args(args(&["--config", "pois.xml", "--input", "berlin.osm"])).unwrap();
        assert_eq!(parsed.config, PathBuf::from("pois.xml"));
        assert_eq!(parsed.input, PathBuf::from("berlin.osm"));
        assert_eq!(parsed.outputs.pois, PathBuf::from("pois.csv"));
        assert_eq!(parsed.outputs.streets, PathBuf::from("streets.csv"));
        assert!(parsed.outputs.rest.is_none());
        assert_eq!(parsed.options.distance_m, 500.0);
        assert_eq!(parsed.options.name_max_length, 100);
        assert!(parsed.ignore_mode.is_none());
    }

    #[test]
    fn all_options() {
        let parsed = parse_args(args(&[
            "--config",
            "rules.xml",
            "--input",
            "city.pbf",
            "--pois",
            "out/p.csv",
            "--streets",
            "out/s.csv",
            "--rest",
            "out/r.csv",
            "--distance",
            "250",
            "--name-max-length",
            "40",
            "--ignore-mode",
            "always",
        ]))
        .unwrap();
        assert_eq!(parsed.outputs.pois, PathBuf::from("out/p.csv"));
        assert_eq!(parsed.outputs.streets, PathBuf::from("out/s.csv"));
        assert_eq!(parsed.outputs.rest, Some(PathBuf::from("out/r.csv")));
        assert_eq!(parsed.options.distance_m, 250.0);
        assert_eq!(parsed.options.name_max_length, 40);
        assert_eq!(parsed.ignore_mode, Some(IgnoreMode::Always));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["--input", "city.osm"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--config", "a.xml", "--input", "b.osm", "--distance", "far"])).is_err());
        assert!(parse_args(args(&["--config", "a.xml", "--input", "b.osm", "--distance", "-1"])).is_err());
        assert!(parse_args(args(&["--config", "a.xml", "--input", "b.osm", "--name-max-length", "0"])).is_err());
        assert!(parse_args(args(&["--config", "a.xml", "--input", "b.osm", "--ignore-mode", "never"])).is_err());
        assert!(parse_args(args(&["--config", "a.xml", "--verbose"])).is_err());
    }
}
