use diffusion_maps::{downsample_with_rng, DiffusionMaps, ParamGuard};

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Embed two well-separated Gaussian-ish blobs and print the dominant
/// spectrum. The second eigenvector splits the samples by cluster.
fn main() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);

    let per_cluster = 250;
    let mut data = Array2::zeros((2 * per_cluster, 2));
    for i in 0..2 * per_cluster {
        let center = if i < per_cluster { 0.0 } else { 4.0 };
        data[(i, 0)] = center + rng.gen::<f64>() - 0.5;
        data[(i, 1)] = center + rng.gen::<f64>() - 0.5;
    }

    let sample = downsample_with_rng(&data.view(), 200, &mut rng).unwrap();

    let result = DiffusionMaps::params(5)
        .epsilon(2.0)
        .cutoff(6.0)
        .check()
        .unwrap()
        .compute(&sample.view())
        .unwrap();

    println!("solver: {}", result.solver());
    println!("{:>4}  {:>12}  {:>12}", "i", "re", "im");
    for (i, value) in result.eigenvalues().iter().enumerate() {
        println!("{:>4}  {:>12.8}  {:>12.8}", i, value.re, value.im);
    }

    let psi = result.eigenvectors().column(1);
    let positive = psi.iter().filter(|v| **v > 0.0).count();
    println!(
        "second eigenvector: {} positive / {} negative entries",
        positive,
        psi.len() - positive
    );
}
