use rand::SeedableRng;
use rand::rngs::StdRng;

use gradnet::approx::{ApproxEq, GRAD_TOLERANCE, TIGHT_TOLERANCE};
use gradnet::backprop;
use gradnet::data::Batch;
use gradnet::error::Error;
use gradnet::graph::Mode;
use gradnet::net::{Linear, Mlp};
use gradnet::ops::cpu;
use gradnet::tensor;
use gradnet::tensors::{Ten64, Tensor};
use gradnet::train::Trainer;

/// 2 → 3 → 2 network with fixed parameters, chosen so no pre-activation sits
/// near the ReLU kink for the finite-difference input below.
fn toy_net() -> Mlp {
    let w1 = tensor!([[0.1, -0.2, 0.3], [0.4, 0.05, -0.15]]);
    let b1 = tensor!([0.01, -0.02, 0.03]);
    let w2 = tensor!([[0.2, -0.1], [-0.3, 0.25], [0.15, 0.05]]);
    let b2 = tensor!([0.0, 0.1]);
    Mlp::from_layers(vec![
        Linear::from_parts(w1, b1).unwrap(),
        Linear::from_parts(w2, b2).unwrap(),
    ])
    .unwrap()
}

fn loss_at(net: &Mlp, x: &Ten64, labels: &[usize]) -> f64 {
    let logits = net.infer(x).unwrap();
    cpu::mean_nll(&logits, labels).unwrap()
}

#[test]
fn test_analytic_gradients_match_finite_differences() {
    let net = toy_net();
    let x = tensor!([[0.5, -0.3], [1.2, 0.8]]);
    let labels = [0usize, 1];
    let eps = 1e-5;

    // Analytic gradients via the recorded tape.
    let mut grad_net = net.clone();
    grad_net.zero_grad();
    let mut rng = StdRng::seed_from_u64(0);
    let (logits, tape) = grad_net.forward(&x, Mode::Train, &mut rng).unwrap();
    let (_, back) = backprop::cross_entropy_from_logits(&logits, &labels).unwrap();
    tape.backward(back(1.0), grad_net.layers_mut()).unwrap();

    for li in 0..net.layers().len() {
        let weight_len = net.layers()[li].weight.value.data.len();
        for p in 0..weight_len {
            let analytic = grad_net.layers()[li].weight.grad.data[p];

            let mut plus = net.clone();
            plus.layers_mut()[li].weight.value.data[p] += eps;
            let mut minus = net.clone();
            minus.layers_mut()[li].weight.value.data[p] -= eps;

            let numeric = (loss_at(&plus, &x, &labels) - loss_at(&minus, &x, &labels)) / (2.0 * eps);
            assert!(
                analytic.approx_eq(&numeric, GRAD_TOLERANCE),
                "weight[{li}][{p}]: analytic {analytic} vs numeric {numeric}"
            );
        }

        let bias_len = net.layers()[li].bias.value.data.len();
        for p in 0..bias_len {
            let analytic = grad_net.layers()[li].bias.grad.data[p];

            let mut plus = net.clone();
            plus.layers_mut()[li].bias.value.data[p] += eps;
            let mut minus = net.clone();
            minus.layers_mut()[li].bias.value.data[p] -= eps;

            let numeric = (loss_at(&plus, &x, &labels) - loss_at(&minus, &x, &labels)) / (2.0 * eps);
            assert!(
                analytic.approx_eq(&numeric, GRAD_TOLERANCE),
                "bias[{li}][{p}]: analytic {analytic} vs numeric {numeric}"
            );
        }
    }
}

#[test]
fn test_backward_does_not_mutate_parameters() {
    let net = toy_net();
    let x = tensor!([[0.5, -0.3]]);

    let mut traced = net.clone();
    let mut rng = StdRng::seed_from_u64(0);
    let (logits, tape) = traced.forward(&x, Mode::Train, &mut rng).unwrap();
    let (_, back) = backprop::cross_entropy_from_logits(&logits, &[1]).unwrap();
    tape.backward(back(1.0), traced.layers_mut()).unwrap();

    for (before, after) in net.layers().iter().zip(traced.layers()) {
        assert_eq!(before.weight.value, after.weight.value);
        assert_eq!(before.bias.value, after.bias.value);
    }
}

#[test]
fn test_zero_initialized_net_gives_uniform_loss() {
    let net = Mlp::from_layers(vec![
        Linear::from_parts(Ten64::zeros(vec![4, 3]), Ten64::zeros(vec![3])).unwrap(),
        Linear::from_parts(Ten64::zeros(vec![3, 2]), Ten64::zeros(vec![2])).unwrap(),
    ])
    .unwrap();

    let x = tensor!([[0.0, 0.0, 0.0, 0.0]]);
    let logits = net.infer(&x).unwrap();
    assert_eq!(logits.data, vec![0.0, 0.0]);

    let loss = cpu::mean_nll(&logits, &[1]).unwrap();
    assert!(loss.approx_eq(&(2.0f64).ln(), TIGHT_TOLERANCE));
}

#[test]
fn test_input_width_mismatch_fails_fast() {
    let net = toy_net();
    let x = tensor!([[1.0, 2.0, 3.0]]);
    let mut rng = StdRng::seed_from_u64(0);

    assert!(matches!(
        net.forward(&x, Mode::Eval, &mut rng),
        Err(Error::ShapeMismatch { what: "input width", got: 3, expected: 2 })
    ));
    assert!(net.infer(&x).is_err());
}

#[test]
fn test_batch_label_count_mismatch() {
    let inputs = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert!(matches!(
        Batch::new(inputs, vec![0]),
        Err(Error::ShapeMismatch { what: "labels", got: 1, expected: 2 })
    ));
}

#[test]
fn test_batch_label_range_validation() {
    let batch = Batch::new(tensor!([[1.0, 2.0]]), vec![5]).unwrap();
    assert_eq!(
        batch.validate_labels(3).unwrap_err(),
        Error::LabelOutOfRange { label: 5, classes: 3 }
    );
    assert!(batch.validate_labels(6).is_ok());
}

#[test]
fn test_fit_rejects_out_of_range_labels_before_training() {
    let mut net = toy_net();
    let before = net.clone();
    let bad = [Batch::new(tensor!([[0.5, -0.3]]), vec![7]).unwrap()];

    let mut trainer = Trainer::with_seed(0.1, 3, 0);
    assert!(matches!(
        trainer.fit(&mut net, &bad, &bad),
        Err(Error::LabelOutOfRange { label: 7, classes: 2 })
    ));

    // The pre-flight check fires before any parameter update.
    for (before, after) in before.layers().iter().zip(net.layers()) {
        assert_eq!(before.weight.value, after.weight.value);
        assert_eq!(before.bias.value, after.bias.value);
    }
}

/// 50 linearly separable points, one full batch.
fn separable_batch() -> Batch {
    let mut rows = Vec::with_capacity(100);
    let mut labels = Vec::with_capacity(50);
    for i in 0..25 {
        rows.push(-1.0 - 0.01 * i as f64);
        rows.push(-0.5 - 0.02 * i as f64);
        labels.push(0);
        rows.push(1.0 + 0.01 * i as f64);
        rows.push(0.5 + 0.02 * i as f64);
        labels.push(1);
    }
    Batch::new(Tensor::new(vec![50, 2], rows), labels).unwrap()
}

#[test]
fn test_loss_strictly_decreases_on_separable_data() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut net = Mlp::new(&[2, 2], &mut rng).unwrap();
    let batches = [separable_batch()];

    let mut trainer = Trainer::with_seed(0.2, 10, 11);
    let stats = trainer.fit(&mut net, &batches, &batches).unwrap();

    assert_eq!(stats.len(), 10);
    for pair in stats.windows(2) {
        assert!(
            pair[1].train_loss < pair[0].train_loss,
            "loss did not decrease: {} -> {}",
            pair[0].train_loss,
            pair[1].train_loss
        );
    }
}

#[test]
fn test_evaluation_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let net = Mlp::new(&[2, 8, 2], &mut rng).unwrap();
    let batches = [separable_batch()];

    let trainer = Trainer::with_seed(0.1, 1, 3);
    let first = trainer.evaluate(&net, &batches).unwrap();
    let second = trainer.evaluate(&net, &batches).unwrap();

    assert_eq!(first.accuracy, second.accuracy);
    assert!(first.loss.approx_eq(&second.loss, TIGHT_TOLERANCE));
}

#[test]
fn test_dropout_varies_in_train_and_not_in_eval() {
    let mut rng = StdRng::seed_from_u64(21);
    let net = Mlp::new(&[4, 32, 2], &mut rng)
        .unwrap()
        .with_dropout(0.5)
        .unwrap();
    let x = tensor!([[1.0, -1.0, 0.5, 2.0]]);

    let (out1, _) = net.forward(&x, Mode::Train, &mut rng).unwrap();
    let (out2, _) = net.forward(&x, Mode::Train, &mut rng).unwrap();
    assert_ne!(out1.data, out2.data, "train-mode dropout should vary");

    let eval1 = net.infer(&x).unwrap();
    let eval2 = net.infer(&x).unwrap();
    assert_eq!(eval1.data, eval2.data, "eval must be deterministic");

    let (eval3, tape) = net.forward(&x, Mode::Eval, &mut rng).unwrap();
    assert_eq!(eval1.data, eval3.data, "eval-mode forward matches infer");
    // Eval records the graph but no dropout nodes: affine + relu + affine.
    assert_eq!(tape.len(), 3);
}

#[test]
fn test_training_reaches_high_accuracy() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut net = Mlp::new(&[2, 8, 2], &mut rng).unwrap();
    let batches = [separable_batch()];

    let mut trainer = Trainer::with_seed(0.3, 60, 5);
    let stats = trainer.fit(&mut net, &batches, &batches).unwrap();

    let last = stats.last().unwrap();
    assert!(
        last.eval_accuracy > 0.95,
        "expected separable data to be learned, got accuracy {}",
        last.eval_accuracy
    );
    assert!(last.train_loss < stats[0].train_loss);
}

#[test]
fn test_gradient_buffers_accumulate_then_reset() {
    let mut net = toy_net();
    let x = tensor!([[0.5, -0.3]]);
    let mut rng = StdRng::seed_from_u64(0);

    net.zero_grad();
    let (logits, tape) = net.forward(&x, Mode::Train, &mut rng).unwrap();
    let (_, back) = backprop::cross_entropy_from_logits(&logits, &[0]).unwrap();
    tape.backward(back(1.0), net.layers_mut()).unwrap();

    let touched = net
        .layers()
        .iter()
        .any(|layer| layer.weight.grad.data.iter().any(|&g| g != 0.0));
    assert!(touched, "backward should populate gradient buffers");

    net.step(0.1);
    for layer in net.layers() {
        assert!(layer.weight.grad.data.iter().all(|&g| g == 0.0));
        assert!(layer.bias.grad.data.iter().all(|&g| g == 0.0));
    }
}
