use criterion::{Criterion, black_box, criterion_group, criterion_main};
use imsim::{
    FaceDescriptor, FaceRect, ImageRecord, QueryBundle, SearchMode, SearchPolicy, SearchRanker,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vector(rng: &mut StdRng, d: usize) -> Vec<f64> {
    (0..d).map(|_| rng.random_range(0.0..1.0)).collect()
}

// 每 4 张图片中有 1 张带 2 张人脸
fn generate_collection(n: usize, d: usize, face_d: usize) -> Vec<ImageRecord> {
    let mut rng = StdRng::seed_from_u64(42); // 使用固定种子确保结果可重现
    (0..n)
        .map(|i| {
            let faces = if i % 4 == 0 {
                (0..2)
                    .map(|_| {
                        FaceDescriptor::new(FaceRect::new(0, 0, 64, 64), random_vector(&mut rng, face_d))
                    })
                    .collect()
            } else {
                vec![]
            };
            let vector = random_vector(&mut rng, d);
            ImageRecord::new(i.to_string(), format!("{i}.jpg"), Some(vector), faces)
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    let mut rng = StdRng::seed_from_u64(7);

    let test_cases = black_box(vec![(1_000, 1280), (10_000, 1280), (10_000, 160)]);

    for (n, d) in test_cases {
        let collection = black_box(generate_collection(n, d, 128));
        let face = FaceDescriptor::new(FaceRect::new(0, 0, 64, 64), random_vector(&mut rng, 128));
        let query = QueryBundle::new(Some(random_vector(&mut rng, d)), vec![face]);

        for mode in [SearchMode::VisualOnly, SearchMode::Combined] {
            let policy = SearchPolicy::builder().mode(mode).build().unwrap();
            let ranker = SearchRanker::new(policy);
            group.bench_function(format!("{mode:?}_{n}_{d}"), |b| {
                b.iter(|| ranker.rank(&query, &collection).unwrap())
            });
        }

        let gated = SearchRanker::new(SearchPolicy::builder().category_gating(true).build().unwrap());
        group.bench_function(format!("Gated_{n}_{d}"), |b| {
            b.iter(|| gated.rank(&query, &collection).unwrap())
        });

        let sequential = SearchRanker::default();
        group.bench_function(format!("Sequential_{n}_{d}"), |b| {
            b.iter(|| sequential.rank_iter(&query, &collection).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
