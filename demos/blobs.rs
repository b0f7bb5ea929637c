//! Trains a small classifier on synthetic two-class blobs.
//!
//! Run with `RUST_LOG=info cargo run --example blobs` to see per-epoch stats.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gradnet::data::Batch;
use gradnet::net::Mlp;
use gradnet::tensors::Tensor;
use gradnet::train::Trainer;

const BATCH_SIZE: usize = 16;

/// Uniform blobs around (-1.5, -1.5) for class 0 and (1.5, 1.5) for class 1.
fn make_batches(rng: &mut StdRng, n_batches: usize) -> Vec<Batch> {
    let centers = [(-1.5, -1.5), (1.5, 1.5)];
    let mut batches = Vec::with_capacity(n_batches);

    for _ in 0..n_batches {
        let mut rows = Vec::with_capacity(BATCH_SIZE * 2);
        let mut labels = Vec::with_capacity(BATCH_SIZE);
        for _ in 0..BATCH_SIZE {
            let label = rng.random_range(0..2usize);
            let (cx, cy) = centers[label];
            rows.push(cx + rng.random_range(-1.0..1.0));
            rows.push(cy + rng.random_range(-1.0..1.0));
            labels.push(label);
        }
        let inputs = Tensor::new(vec![BATCH_SIZE, 2], rows);
        batches.push(Batch::new(inputs, labels).expect("batch construction"));
    }

    batches
}

fn main() {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(7);
    let train = make_batches(&mut rng, 12);
    let eval = make_batches(&mut rng, 3);

    let mut net = Mlp::new(&[2, 16, 2], &mut rng)
        .expect("network construction")
        .with_dropout(0.2)
        .expect("dropout rate");

    let mut trainer = Trainer::with_seed(0.1, 30, 42);
    let stats = trainer.fit(&mut net, &train, &eval).expect("training");

    let last = stats.last().expect("at least one epoch");
    println!(
        "after {} epochs: train_loss={:.4} eval_loss={:.4} eval_acc={:.2}%",
        stats.len(),
        last.train_loss,
        last.eval_loss,
        last.eval_accuracy * 100.0
    );
}
