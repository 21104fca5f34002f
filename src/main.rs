//! Credit-default experiment pipeline: load, train baselines, tune, report.

use std::path::PathBuf;

use creditlab::config::{self, ExperimentConfig};
use creditlab::dataset::{DatasetSplit, loader};
use creditlab::logging;
use creditlab::ml::tuning::Scoring;
use creditlab::ml::{ModelKind, ModelSpec};
use creditlab::report::{self, DatasetSummary, ExperimentReport, ModelReport, TuningReport};
use tracing::info;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init("creditlab") {
        eprintln!("Logging disabled: {err}");
    }

    let mut config =
        config::load_or_default(options.config.as_deref()).map_err(|err| err.to_string())?;
    options.apply(&mut config);
    config.validate().map_err(|err| err.to_string())?;

    info!("Loading dataset from {}", config.data_dir.display());
    let split = loader::load_split(&config.data_dir).map_err(|err| err.to_string())?;
    let dataset = DatasetSummary::from_split(&split);
    println!(
        "dataset: {} train / {} test rows, {} features, bad rate {:.3} / {:.3}",
        dataset.train_rows,
        dataset.test_rows,
        dataset.n_features,
        dataset.train_positive_rate,
        dataset.test_positive_rate
    );

    let mut models = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        models.push(train_baseline(config.models.spec(kind), &split)?);
    }

    let tuning = if config.tuning.enabled {
        Some(run_tuning(&config, &split)?)
    } else {
        info!("Tuning disabled");
        None
    };

    let mut rows: Vec<(&str, &_)> = models
        .iter()
        .map(|model| (model.name.as_str(), &model.evaluation))
        .collect();
    let tuned_name = tuning
        .as_ref()
        .map(|tuned| format!("Tuned {}", tuned.search.model_kind.label()));
    if let (Some(name), Some(tuned)) = (&tuned_name, &tuning) {
        rows.push((name.as_str(), &tuned.test_evaluation));
    }
    println!();
    print!("{}", report::model_comparison(&rows));

    if let (Some(path), Some(tuned)) = (&config.report.model_out, &tuning) {
        tuned
            .search
            .best_model
            .model
            .save_json(path)
            .map_err(|err| err.to_string())?;
        println!("tuned model written to {}", path.display());
    }
    if let Some(path) = &config.report.json_path {
        let report = ExperimentReport {
            dataset,
            models,
            tuning,
        };
        report.write_json(path).map_err(|err| err.to_string())?;
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn train_baseline(spec: ModelSpec, split: &DatasetSplit) -> Result<ModelReport, String> {
    let kind = spec.kind();
    info!("Training {}", kind.label());
    let fitted = spec
        .fit_dataset(split.train())
        .map_err(|err| format!("{}: {err}", kind.label()))?;
    let model_report = ModelReport::from_fit(spec, fitted, split.test())
        .map_err(|err| format!("{}: {err}", kind.label()))?;
    print_evaluation(kind.label(), &model_report.evaluation);
    if !model_report.feature_importance.is_empty() {
        print!(
            "{}",
            report::feature_importance_table(&model_report.feature_importance, 10)
        );
    }
    Ok(model_report)
}

fn run_tuning(config: &ExperimentConfig, split: &DatasetSplit) -> Result<TuningReport, String> {
    let search = config
        .grid_search()
        .run(split.train())
        .map_err(|err| err.to_string())?;
    println!();
    print!("{}", report::grid_search_summary(&search, 10));
    let test_evaluation = search
        .best_model
        .model
        .evaluate(split.test())
        .map_err(|err| err.to_string())?;
    print_evaluation(&format!("Tuned {}", search.model_kind.label()), &test_evaluation);
    Ok(TuningReport {
        search,
        test_evaluation,
    })
}

fn print_evaluation(name: &str, evaluation: &creditlab::ml::metrics::EvaluationResult) {
    println!();
    println!("{}", report::evaluation_summary(name, evaluation));
    print!("{}", report::confusion_matrix_table(&evaluation.confusion));
    print!("{}", report::classification_report(evaluation));
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    model: Option<ModelKind>,
    scoring: Option<Scoring>,
    workers: Option<usize>,
    skip_tuning: bool,
    report_json: Option<PathBuf>,
    model_out: Option<PathBuf>,
}

impl CliOptions {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(kind) = self.model {
            if kind != config.tuning.model {
                // Grid names are per model family.
                config.tuning.grid.clear();
            }
            config.tuning.model = kind;
        }
        if let Some(scoring) = self.scoring {
            config.tuning.scoring = scoring;
        }
        if let Some(workers) = self.workers {
            config.tuning.workers = workers;
        }
        if self.skip_tuning {
            config.tuning.enabled = false;
        }
        if let Some(path) = &self.report_json {
            config.report.json_path = Some(path.clone());
        }
        if let Some(path) = &self.model_out {
            config.report.model_out = Some(path.clone());
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                options.data_dir = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                options.model = Some(value.parse::<ModelKind>()?);
            }
            "--scoring" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--scoring requires a value".to_string())?;
                options.scoring = Some(value.parse::<Scoring>()?);
            }
            "--workers" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--workers requires a value".to_string())?;
                let workers = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --workers value: {value}"))?;
                options.workers = Some(workers);
            }
            "--skip-tuning" => options.skip_tuning = true,
            "--report-json" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--report-json requires a value".to_string())?;
                options.report_json = Some(PathBuf::from(value));
            }
            "--model-out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model-out requires a value".to_string())?;
                options.model_out = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "creditlab",
        "",
        "Trains logistic regression, random forest and gradient boosting on a credit",
        "dataset, tunes one family by grid search and prints a comparison.",
        "",
        "Usage:",
        "  creditlab [--config creditlab.toml] [--data <dir>] [options]",
        "",
        "Options:",
        "  --config <file>        Experiment config (default: ./creditlab.toml, then the app dir).",
        "  --data <dir>           Dataset directory with manifest.json (default: config data_dir).",
        "  --model <kind>         Model family to tune: logreg, forest or gbdt (uses its default grid).",
        "  --scoring <name>       roc_auc, accuracy, precision, recall, f1 or neg_log_loss.",
        "  --workers <n>          Grid search threads; 0 means all cores.",
        "  --skip-tuning          Only train and evaluate the baselines.",
        "  --report-json <file>   Write the full experiment report as JSON.",
        "  --model-out <file>     Save the tuned model as JSON.",
    ]
    .join("\n")
}
