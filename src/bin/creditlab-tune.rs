//! Developer utility to grid-search one model family on a dataset split.

use std::path::PathBuf;

use creditlab::dataset::loader::load_split;
use creditlab::ml::params::ParamValue;
use creditlab::ml::tuning::{
    DEFAULT_FOLDS, GridSearch, ParamGrid, Scoring, WorkerCount, default_grid,
};
use creditlab::ml::{ModelKind, ModelSpec};
use creditlab::report;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct CliOptions {
    data_dir: PathBuf,
    model: ModelKind,
    scoring: Scoring,
    folds: usize,
    workers: usize,
    shuffle_seed: Option<u64>,
    top: usize,
    grid: ParamGrid,
    model_out: Option<PathBuf>,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = creditlab::logging::init("creditlab-tune") {
        eprintln!("Logging disabled: {err}");
    }
    let split = load_split(&options.data_dir).map_err(|err| err.to_string())?;
    let grid = if options.grid.dims().is_empty() {
        default_grid(options.model)
    } else {
        options.grid
    };
    let outcome = GridSearch::new(ModelSpec::default_for(options.model), grid)
        .scoring(options.scoring)
        .folds(options.folds)
        .workers(WorkerCount::from_config(options.workers))
        .shuffle_seed(options.shuffle_seed)
        .run(split.train())
        .map_err(|err| err.to_string())?;
    print!("{}", report::grid_search_summary(&outcome, options.top));

    let evaluation = outcome
        .best_model
        .model
        .evaluate(split.test())
        .map_err(|err| err.to_string())?;
    println!();
    println!("{}", report::evaluation_summary("best on test", &evaluation));
    print!("{}", report::confusion_matrix_table(&evaluation.confusion));
    print!("{}", report::classification_report(&evaluation));

    if let Some(path) = &options.model_out {
        outcome
            .best_model
            .model
            .save_json(path)
            .map_err(|err| err.to_string())?;
        println!("model written to {}", path.display());
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut data_dir = PathBuf::from("data");
    let mut model = ModelKind::RandomForest;
    let mut scoring = Scoring::default();
    let mut folds = DEFAULT_FOLDS;
    let mut workers = 0usize;
    let mut shuffle_seed = None;
    let mut top = 10usize;
    let mut grid = ParamGrid::new();
    let mut model_out = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data_dir = PathBuf::from(value);
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model = value.parse::<ModelKind>()?;
            }
            "--scoring" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--scoring requires a value".to_string())?;
                scoring = value.parse::<Scoring>()?;
            }
            "--folds" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--folds requires a value".to_string())?;
                folds = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --folds value: {value}"))?;
            }
            "--workers" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--workers requires a value".to_string())?;
                workers = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --workers value: {value}"))?;
            }
            "--shuffle-seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--shuffle-seed requires a value".to_string())?;
                shuffle_seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --shuffle-seed value: {value}"))?,
                );
            }
            "--top" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--top requires a value".to_string())?;
                top = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --top value: {value}"))?;
            }
            "--param" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--param requires a value".to_string())?;
                let (name, values) = parse_param(value)?;
                grid.add(&name, values);
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                model_out = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(Some(CliOptions {
        data_dir,
        model,
        scoring,
        folds,
        workers,
        shuffle_seed,
        top,
        grid,
        model_out,
    }))
}

/// `name=v1,v2,...` into a grid dimension.
fn parse_param(spec: &str) -> Result<(String, Vec<ParamValue>), String> {
    let (name, values) = spec
        .split_once('=')
        .ok_or_else(|| format!("Invalid --param {spec} (expected name=v1,v2)"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid --param {spec} (missing name)"));
    }
    let values: Vec<ParamValue> = values
        .split(',')
        .filter(|value| !value.trim().is_empty())
        .map(|value| match value.parse::<ParamValue>() {
            Ok(parsed) => parsed,
            Err(never) => match never {},
        })
        .collect();
    if values.is_empty() {
        return Err(format!("Invalid --param {spec} (no values)"));
    }
    Ok((name.to_string(), values))
}

fn help_text() -> String {
    [
        "creditlab-tune",
        "",
        "Runs a cross-validated grid search for one model family and prints the ranking.",
        "",
        "Usage:",
        "  creditlab-tune [--data data] [--model forest] [--param name=v1,v2 ...] [options]",
        "",
        "Options:",
        "  --data <dir>           Dataset directory with manifest.json (default: data).",
        "  --model <kind>         logreg, forest or gbdt (default: forest).",
        "  --scoring <name>       roc_auc (default), accuracy, precision, recall, f1, neg_log_loss.",
        "  --folds <n>            Cross-validation folds (default: 5).",
        "  --workers <n>          Worker threads; 0 means all cores (default: 0).",
        "  --shuffle-seed <n>     Shuffle rows before assigning folds.",
        "  --top <n>              Ranked configurations to print (default: 10).",
        "  --param <name=v,...>   Grid dimension; repeatable. Without any, the model's default grid.",
        "  --out <file>           Save the refit best model as JSON.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_values_are_typed() {
        let (name, values) = parse_param("max_depth=3,none,5").unwrap();
        assert_eq!(name, "max_depth");
        assert_eq!(
            values,
            vec![
                ParamValue::Int(3),
                ParamValue::Text("none".to_string()),
                ParamValue::Int(5)
            ]
        );
        assert_eq!(parse_param("c=0.1").unwrap().1, vec![ParamValue::Float(0.1)]);
        assert!(parse_param("c").is_err());
        assert!(parse_param("c=").is_err());
    }
}
