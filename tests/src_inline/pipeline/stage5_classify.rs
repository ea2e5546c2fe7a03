use super::*;

fn conditions(n_healthy: usize, n_tb: usize) -> Vec<Condition> {
    let mut out = vec![Condition::Healthy; n_healthy];
    out.extend(vec![Condition::LatentTb; n_tb]);
    out
}

/// Samples x genes with the LatentTb rows shifted upward on every gene.
fn separated_features(conditions: &[Condition]) -> Array2<f64> {
    Array2::from_shape_fn((conditions.len(), 3), |(i, g)| {
        let jitter = ((i * 7 + g * 3) % 5) as f64 * 0.1;
        let shift = match conditions[i] {
            Condition::Healthy => 2.0,
            Condition::LatentTb => 6.0,
        };
        shift + jitter + g as f64
    })
}

fn plane_of(features: &Array2<f64>) -> Array2<f64> {
    features.slice(ndarray::s![.., 0..2]).to_owned()
}

fn params() -> AnalysisParams {
    AnalysisParams {
        grid_step: 0.25,
        ..AnalysisParams::default_v1()
    }
}

fn run(conditions: &[Condition], params: &AnalysisParams, with_surfaces: bool) -> Stage5Output {
    let features = separated_features(conditions);
    let plane = plane_of(&features);
    run_stage5(&Stage5Inputs {
        features: &features,
        plane: &plane,
        conditions,
        params,
        with_surfaces,
    })
    .unwrap()
}

#[test]
fn test_separable_groups_score_perfectly() {
    let labels = conditions(10, 10);
    let out = run(&labels, &params(), true);

    assert_eq!(out.n_folds, 5);
    assert_eq!(out.n_features, 3);
    assert_eq!(out.models.len(), 3);
    for model in &out.models {
        assert_eq!(model.folds.len(), 5);
        assert_eq!(model.mean_test_accuracy, 1.0, "{:?}", model.kind);
        assert_eq!(model.mean_train_accuracy, 1.0, "{:?}", model.kind);
        for fold in &model.folds {
            assert_eq!(fold.n_train + fold.n_test, 20);
            assert_eq!(fold.n_test, 4);
        }
        let surface = model.surface.as_ref().unwrap();
        assert_eq!(surface.class_at(2.0, 3.0), 0);
        assert_eq!(surface.class_at(6.2, 7.2), 1);
        assert_eq!(model.plane_accuracy, Some(1.0));
    }
    assert!(out.best().is_some());
    assert!(out.models.iter().any(|m| m.kind == ModelKind::Knn));
}

#[test]
fn test_without_surfaces() {
    let labels = conditions(6, 6);
    let out = run(&labels, &params(), false);
    for model in &out.models {
        assert!(model.surface.is_none());
        assert!(model.plane_accuracy.is_none());
    }
}

#[test]
fn test_repeat_runs_match() {
    let labels = conditions(7, 9);
    let mut p = params();
    p.shuffle_seed = Some(3);
    let a = run(&labels, &p, false);
    let b = run(&labels, &p, false);
    for (ma, mb) in a.models.iter().zip(&b.models) {
        assert_eq!(ma.folds, mb.folds);
        assert_eq!(
            ma.mean_test_accuracy.to_bits(),
            mb.mean_test_accuracy.to_bits()
        );
    }
}

#[test]
fn test_too_many_folds_fails() {
    let labels = conditions(2, 2);
    let features = separated_features(&labels);
    let plane = plane_of(&features);
    let p = params();
    let err = run_stage5(&Stage5Inputs {
        features: &features,
        plane: &plane,
        conditions: &labels,
        params: &p,
        with_surfaces: false,
    })
    .unwrap_err();
    assert!(matches!(err, ClassifyError::Folds(_)));
}

#[test]
fn test_label_mismatch() {
    let labels = conditions(5, 5);
    let features = separated_features(&labels);
    let plane = plane_of(&features);
    let p = params();
    let err = run_stage5(&Stage5Inputs {
        features: &features,
        plane: &plane,
        conditions: &labels[..9],
        params: &p,
        with_surfaces: false,
    })
    .unwrap_err();
    assert!(matches!(err, ClassifyError::LabelMismatch { rows: 10, labels: 9 }));
}
