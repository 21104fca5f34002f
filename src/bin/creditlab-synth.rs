//! Developer utility to generate a synthetic credit dataset and write its split.

use std::path::PathBuf;

use creditlab::dataset::export::write_split;
use creditlab::dataset::split::{SplitOptions, train_test_split};
use creditlab::dataset::synthetic::{SyntheticOptions, credit_dataset};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct CliOptions {
    out_dir: PathBuf,
    synthetic: SyntheticOptions,
    split: SplitOptions,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = creditlab::logging::init("creditlab-synth") {
        eprintln!("Logging disabled: {err}");
    }
    let data = credit_dataset(&options.synthetic).map_err(|err| err.to_string())?;
    let split = train_test_split(&data, &options.split).map_err(|err| err.to_string())?;
    let manifest = write_split(&options.out_dir, &split).map_err(|err| err.to_string())?;
    println!(
        "Wrote {} train / {} test rows x {} features (bad rate {:.3}) to {}",
        split.train().len(),
        split.test().len(),
        split.train().n_features(),
        data.positive_rate(),
        manifest.display()
    );
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut out_dir = PathBuf::from("data");
    let mut synthetic = SyntheticOptions::default();
    let mut split = SplitOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = PathBuf::from(value);
            }
            "--rows" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rows requires a value".to_string())?;
                synthetic.rows = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --rows value: {value}"))?;
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                synthetic.seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --seed value: {value}"))?;
            }
            "--split-seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--split-seed requires a value".to_string())?;
                split.seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --split-seed value: {value}"))?;
            }
            "--test-ratio" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-ratio requires a value".to_string())?;
                split.test_ratio = value
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid --test-ratio value: {value}"))?;
            }
            "--no-stratify" => split.stratify = false,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(Some(CliOptions {
        out_dir,
        synthetic,
        split,
    }))
}

fn help_text() -> String {
    [
        "creditlab-synth",
        "",
        "Generates a German-credit-like dataset (48 numeric and one-hot columns,",
        "about 30% bad credit) and writes a train/test split with a manifest.",
        "",
        "Usage:",
        "  creditlab-synth [--out data] [options]",
        "",
        "Options:",
        "  --out <dir>            Output directory (default: data).",
        "  --rows <n>             Rows to generate (default: 1000).",
        "  --seed <n>             Generator seed (default: 42).",
        "  --split-seed <n>       Split seed (default: 42).",
        "  --test-ratio <f64>     Held-out fraction (default: 0.2).",
        "  --no-stratify          Shuffle without preserving class balance.",
    ]
    .join("\n")
}
