//! Config-driven pipeline run against an isolated application directory.

mod support;

use creditlab::app_dirs::CONFIG_HOME_ENV;
use creditlab::config::{self, ExperimentConfig};
use creditlab::dataset::export::write_split;
use creditlab::dataset::loader::load_split;
use creditlab::ml::params::ParamValue;
use creditlab::ml::tuning::Scoring;
use creditlab::ml::ModelKind;
use creditlab::report::{DatasetSummary, ExperimentReport, ModelReport, TuningReport};
use support::creditlab_env::CreditlabEnvGuard;

#[test]
fn config_in_app_dir_drives_a_full_run() {
    let temp = tempfile::tempdir().unwrap();
    let _env = CreditlabEnvGuard::set(CONFIG_HOME_ENV, temp.path().join("home"));

    let path = config::config_path().unwrap();
    assert!(path.starts_with(temp.path().join("home").join(".creditlab")));

    let mut experiment = ExperimentConfig::default();
    experiment.data_dir = "data".into();
    experiment.tuning.model = ModelKind::LogisticRegression;
    experiment.tuning.scoring = Scoring::Accuracy;
    experiment.tuning.folds = 3;
    experiment
        .tuning
        .grid
        .insert("c".to_string(), vec![ParamValue::Float(0.1), ParamValue::Float(1.0)]);
    experiment.report.json_path = Some("out/report.json".into());
    config::save_to_path(&experiment, &path).unwrap();

    let app_dir = path.parent().unwrap().to_path_buf();
    let split = support::reference_split();
    write_split(&app_dir.join("data"), &split).unwrap();

    let loaded = config::load(&path).unwrap();
    assert_eq!(loaded.data_dir, app_dir.join("data"));
    let data = load_split(&loaded.data_dir).unwrap();

    let spec = loaded.models.spec(ModelKind::LogisticRegression);
    let fitted = spec.fit_dataset(data.train()).unwrap();
    let baseline = ModelReport::from_fit(spec, fitted, data.test()).unwrap();
    assert!(baseline.feature_importance.is_empty());

    let search = loaded.grid_search().run(data.train()).unwrap();
    assert_eq!(search.candidates.len(), 2);
    assert_eq!(search.scoring, Scoring::Accuracy);
    let test_evaluation = search.best_model.model.evaluate(data.test()).unwrap();

    let report_path = loaded.report.json_path.clone().unwrap();
    ExperimentReport {
        dataset: DatasetSummary::from_split(&data),
        models: vec![baseline],
        tuning: Some(TuningReport {
            search,
            test_evaluation,
        }),
    }
    .write_json(&report_path)
    .unwrap();

    assert_eq!(report_path, app_dir.join("out/report.json"));
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report_path).unwrap()).unwrap();
    assert_eq!(value["dataset"]["train_rows"], 800);
    assert!(value["models"][0]["roc_curve"].as_array().unwrap().len() > 2);
    assert_eq!(value["tuning"]["search"]["scoring"], "accuracy");
    assert_eq!(value["tuning"]["search"]["candidates"].as_array().unwrap().len(), 2);
}
