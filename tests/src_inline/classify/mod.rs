use super::folds::stratified_folds;
use super::knn::Knn;
use super::naive_bayes::GaussianNb;
use super::surface::{GridSpec, decision_surface};
use super::svm::{RbfSvm, scale_gamma};
use super::*;
use ndarray::array;

fn two_clusters() -> (Array2<f64>, Vec<usize>) {
    let x = array![
        [-2.0, -2.1],
        [-1.8, -2.3],
        [-2.2, -1.7],
        [-1.9, -1.9],
        [2.1, 1.9],
        [1.7, 2.2],
        [2.3, 2.0],
        [1.9, 1.8],
    ];
    (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
}

#[test]
fn test_accuracy_and_argmax() {
    assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
    assert_eq!(accuracy(&[], &[]), 0.0);
    assert_eq!(argmax_low_tie(&[1.0, 1.0]), 0);
    assert_eq!(argmax_low_tie(&[1.0, 2.0]), 1);
    assert_eq!(argmax_low_tie(&[f64::NEG_INFINITY, -5.0]), 1);
    assert_eq!(majority_class(&[0, 1, 1]), 1);
    assert_eq!(majority_class(&[1, 0, 1, 0]), 0);
}

#[test]
fn test_training_set_checks() {
    let x = array![[0.0], [1.0]];
    assert!(matches!(
        check_training_set(&x, &[0]),
        Err(ClassifyError::LabelMismatch { rows: 2, labels: 1 })
    ));
    assert!(matches!(
        check_training_set(&x, &[0, 2]),
        Err(ClassifyError::BadLabel(2))
    ));
    let empty = Array2::<f64>::zeros((0, 2));
    assert!(matches!(
        check_training_set(&empty, &[]),
        Err(ClassifyError::EmptyTrainingSet)
    ));
}

#[test]
fn test_factory_builds_each_kind() {
    let params = AnalysisParams::default_v1();
    for kind in ModelKind::ALL {
        assert_eq!(build_classifier(kind, &params).kind(), kind);
    }
    assert_eq!(ModelKind::SvmRbf.plot_stem(), "svm_pca");
}

#[test]
fn test_naive_bayes_separates_clusters() {
    let (x, y) = two_clusters();
    let mut nb = GaussianNb::new(1e-9);
    nb.fit(&x, &y).unwrap();
    assert_eq!(nb.predict(&x).unwrap(), y);
    assert_eq!(nb.predict_one(&[-3.0, -3.0]).unwrap(), 0);
    assert_eq!(nb.predict_one(&[3.0, 3.0]).unwrap(), 1);
}

#[test]
fn test_naive_bayes_constant_features() {
    let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
    let mut nb = GaussianNb::new(1e-9);
    nb.fit(&x, &[0, 1, 1]).unwrap();
    // no feature varies, so the majority class decides
    assert_eq!(nb.predict_one(&[1.0, 1.0]).unwrap(), 1);
    assert_eq!(nb.predict(&array![[0.0, 5.0]]).unwrap(), vec![1]);
}

#[test]
fn test_naive_bayes_uses_larger_spread() {
    // class 1 is wide, so a far point on the class 0 side still goes to it
    let x = array![[-0.1], [0.0], [0.1], [-4.0], [4.0], [0.5]];
    let mut nb = GaussianNb::new(1e-9);
    nb.fit(&x, &[0, 0, 0, 1, 1, 1]).unwrap();
    assert_eq!(nb.predict_one(&[0.0]).unwrap(), 0);
    assert_eq!(nb.predict_one(&[-3.0]).unwrap(), 1);
}

#[test]
fn test_models_reject_wrong_width() {
    let (x, y) = two_clusters();
    let params = AnalysisParams::default_v1();
    for kind in ModelKind::ALL {
        let mut model = build_classifier(kind, &params);
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict_one(&[0.0, 0.0, 0.0]),
            Err(ClassifyError::WrongDimension { expected: 2, found: 3 })
        ));
    }
}

#[test]
fn test_naive_bayes_requires_fit() {
    let nb = GaussianNb::new(1e-9);
    assert!(matches!(nb.predict_one(&[0.0]), Err(ClassifyError::NotFitted)));
}

#[test]
fn test_knn_vote_tie_goes_to_lower_class() {
    let x = array![[0.0], [2.0]];
    let mut knn = Knn::new(2);
    knn.fit(&x, &[1, 0]).unwrap();
    assert_eq!(knn.predict_one(&[1.0]).unwrap(), 0);
    assert_eq!(knn.predict_one(&[5.0]).unwrap(), 0);
}

#[test]
fn test_knn_equal_distance_uses_training_order() {
    let x = array![[0.0], [2.0]];
    let mut knn = Knn::new(1);
    knn.fit(&x, &[1, 0]).unwrap();
    assert_eq!(knn.predict_one(&[1.0]).unwrap(), 1);
    assert_eq!(knn.predict_one(&[1.9]).unwrap(), 0);

    let reversed = array![[2.0], [0.0]];
    knn.fit(&reversed, &[1, 0]).unwrap();
    assert_eq!(knn.predict_one(&[1.0]).unwrap(), 1);
    assert_eq!(knn.predict(&array![[1.0], [0.2]]).unwrap(), vec![1, 0]);
}

#[test]
fn test_knn_needs_k_samples() {
    let x = array![[0.0, 1.0]];
    let mut knn = Knn::new(2);
    assert!(matches!(
        knn.fit(&x, &[0]),
        Err(ClassifyError::TooFewNeighbors { k: 2, n: 1 })
    ));
}

#[test]
fn test_knn_clusters() {
    let (x, y) = two_clusters();
    let mut knn = Knn::new(2);
    knn.fit(&x, &y).unwrap();
    assert_eq!(knn.predict(&x).unwrap(), y);
}

#[test]
fn test_scale_gamma() {
    let x = array![[0.0, 2.0], [2.0, 0.0]];
    assert!((scale_gamma(&x) - 0.5).abs() < 1e-12);
    let constant = array![[3.0, 3.0], [3.0, 3.0]];
    assert_eq!(scale_gamma(&constant), 1.0);
}

#[test]
fn test_svm_separates_clusters() {
    let (x, y) = two_clusters();
    let mut svm = RbfSvm::new(1.0, 1e-3);
    svm.fit(&x, &y).unwrap();
    assert_eq!(svm.predict(&x).unwrap(), y);
    assert!(svm.decision_value(&[-2.0, -2.0]) < 0.0);
    assert!(svm.decision_value(&[2.0, 2.0]) > 0.0);
    assert!(svm.n_support() >= 2);
    assert!(svm.gamma() > 0.0);
}

#[test]
fn test_svm_is_deterministic() {
    let (x, y) = two_clusters();
    let mut a = RbfSvm::new(1.0, 1e-3);
    let mut b = RbfSvm::new(1.0, 1e-3);
    a.fit(&x, &y).unwrap();
    b.fit(&x, &y).unwrap();
    let point = [0.3, -0.1];
    assert_eq!(
        a.decision_value(&point).to_bits(),
        b.decision_value(&point).to_bits()
    );
}

#[test]
fn test_svm_single_class_is_constant() {
    let x = array![[0.0, 1.0], [1.0, 0.0]];
    let mut svm = RbfSvm::new(1.0, 1e-3);
    svm.fit(&x, &[1, 1]).unwrap();
    assert_eq!(svm.predict_one(&[-10.0, 10.0]).unwrap(), 1);
}

#[test]
fn test_stratified_fold_allocation() {
    let labels = [0, 0, 0, 1, 1, 1, 1];
    let folds = stratified_folds(&labels, 3, None).unwrap();
    assert_eq!(folds.len(), 3);
    assert_eq!(folds[0].test, vec![0, 3, 4]);
    assert_eq!(folds[1].test, vec![1, 5]);
    assert_eq!(folds[2].test, vec![2, 6]);
    assert_eq!(folds[0].train, vec![1, 2, 5, 6]);
}

#[test]
fn test_stratified_folds_partition_and_balance() {
    let labels: Vec<usize> = (0..15).map(|i| usize::from(i % 3 == 0)).collect();
    for seed in [None, Some(7)] {
        let folds = stratified_folds(&labels, 5, seed).unwrap();
        let mut seen = vec![0usize; labels.len()];
        for fold in &folds {
            for &i in &fold.test {
                seen[i] += 1;
            }
            assert_eq!(fold.train.len() + fold.test.len(), labels.len());
            assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
            let positives = fold.test.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(positives, 1);
            assert_eq!(fold.test.len(), 3);
        }
        assert!(seen.iter().all(|&c| c == 1));
    }
}

#[test]
fn test_seeded_folds_repeat() {
    let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 12)).collect();
    let a = stratified_folds(&labels, 4, Some(42)).unwrap();
    let b = stratified_folds(&labels, 4, Some(42)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_stratified_fold_errors() {
    assert!(stratified_folds(&[0, 1, 0, 1], 1, None).is_err());
    assert!(stratified_folds(&[0, 1, 0], 4, None).is_err());
    assert!(stratified_folds(&[0, 0, 1, 1, 1], 4, None).is_err());
    assert!(stratified_folds(&[0, 0, 1, 1, 1], 3, None).is_ok());
}

#[test]
fn test_grid_covering() {
    let plane = array![[0.0, 0.0], [1.0, 2.0]];
    let grid = GridSpec::covering(&plane, 1.0, 0.5, 2000);
    assert_eq!(grid.x_min, -1.0);
    assert_eq!(grid.y_min, -1.0);
    assert_eq!(grid.step, 0.5);
    assert_eq!(grid.nx, 6);
    assert_eq!(grid.ny, 8);

    let capped = GridSpec::covering(&plane, 1.0, 0.01, 10);
    assert!(capped.step > 0.01);
    assert!(capped.nx <= 10 && capped.ny <= 10);
}

#[test]
fn test_decision_surface_lookup() {
    let x = array![[-1.0, 0.0], [1.0, 0.0]];
    let mut knn = Knn::new(1);
    knn.fit(&x, &[0, 1]).unwrap();
    let grid = GridSpec::covering(&x, 1.0, 0.1, 2000);
    let surface = decision_surface(&knn, grid).unwrap();
    assert_eq!(surface.classes.len(), grid.nx * grid.ny);
    assert_eq!(surface.class_at(-0.9, 0.0), 0);
    assert_eq!(surface.class_at(0.9, 0.0), 1);
    assert!(surface.share(0) > 0.3 && surface.share(1) > 0.3);
}
