use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kdtree::{DynamicKdTree, KdTree, KdTreeBuilder, KdTreeIndex};
use crate::metric::{
    DistanceMetric, GeodesicCircle, GeodesicSphere, Manhattan, SimpleSquaredEuclidean,
    SquaredEuclidean,
};
use crate::result::{Neighbor, ResultSet};
use crate::source::{CoordSource, FlatPoints, PointSource};
use crate::{KdIndexError, SearchParams};

fn points() -> Vec<[f64; 2]> {
    let coords: Vec<[i32; 2]> = vec![
        [54, 1],
        [97, 21],
        [65, 35],
        [33, 54],
        [95, 39],
        [54, 3],
        [53, 54],
        [84, 72],
        [33, 34],
        [43, 15],
        [52, 83],
        [81, 23],
        [1, 61],
        [38, 74],
        [11, 91],
        [24, 56],
        [90, 31],
        [25, 57],
        [46, 61],
        [29, 69],
        [49, 60],
        [4, 98],
        [71, 15],
        [60, 25],
        [38, 84],
        [52, 38],
        [94, 51],
        [13, 25],
        [77, 73],
        [88, 87],
        [6, 27],
        [58, 22],
        [53, 28],
        [27, 91],
        [96, 98],
        [93, 14],
        [22, 93],
        [45, 94],
        [18, 28],
        [35, 15],
        [19, 81],
        [20, 81],
        [67, 53],
        [43, 3],
        [47, 66],
        [48, 34],
        [46, 12],
        [32, 38],
        [43, 12],
        [39, 94],
        [88, 62],
        [66, 14],
        [84, 30],
        [72, 81],
        [41, 92],
        [26, 4],
        [6, 76],
        [47, 21],
        [57, 70],
        [71, 82],
        [50, 68],
        [96, 18],
        [40, 31],
        [78, 53],
        [71, 90],
        [32, 14],
        [55, 6],
        [32, 88],
        [62, 32],
        [21, 67],
        [73, 81],
        [44, 64],
        [29, 50],
        [70, 5],
        [6, 22],
        [68, 3],
        [11, 23],
        [20, 42],
        [21, 73],
        [63, 86],
        [9, 40],
        [99, 2],
        [99, 76],
        [56, 77],
        [83, 6],
        [21, 72],
        [78, 30],
        [75, 53],
        [41, 11],
        [95, 20],
        [30, 38],
        [96, 82],
        [65, 48],
        [33, 18],
        [87, 28],
        [10, 10],
        [40, 34],
        [10, 20],
        [47, 29],
        [46, 78],
    ];

    coords
        .into_iter()
        .map(|[x, y]| [x.into(), y.into()])
        .collect()
}

fn random_points<const D: usize>(rng: &mut StdRng, n: usize) -> Vec<[f64; D]> {
    (0..n)
        .map(|_| std::array::from_fn(|_| rng.gen_range(-100.0..100.0)))
        .collect()
}

/// Every point sorted by distance to `query`, ties by index.
fn brute_force<N, S, M>(source: &S, metric: &M, query: &[N]) -> Vec<Neighbor>
where
    N: crate::IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    let mut all: Vec<Neighbor> = (0..source.num_points())
        .map(|i| {
            let point: Vec<N> = (0..source.dims()).map(|d| source.coord(i, d)).collect();
            Neighbor::new(i, metric.distance(query, &point))
        })
        .collect();
    all.sort();
    all
}

fn brute_force_knn<N, S, M>(source: &S, metric: &M, query: &[N], k: usize) -> Vec<Neighbor>
where
    N: crate::IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    let mut all = brute_force(source, metric, query);
    all.truncate(k);
    all
}

fn indices(result: &[Neighbor]) -> Vec<usize> {
    result.iter().map(|n| n.index).collect()
}

fn sorted_indices(result: &[Neighbor]) -> Vec<usize> {
    let mut ids = indices(result);
    ids.sort();
    ids
}

#[test]
fn knn_breaks_ties_by_index() {
    let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]];
    let tree = KdTree::build(&points).unwrap();
    let result = tree.knn(&[0.0, 0.0], 2).unwrap();
    assert_eq!(result, vec![Neighbor::new(0, 0.0), Neighbor::new(1, 1.0)]);
}

#[test]
fn radius_is_squared_for_euclidean() {
    let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]];
    let tree = KdTree::build(&points).unwrap();
    let params = SearchParams::default().with_sorted(false);
    let result = tree.radius_search(&[0.0, 0.0], 1.5, &params).unwrap();
    assert_eq!(sorted_indices(&result), vec![0, 1, 2]);

    let result = tree
        .knn_within(&[0.0, 0.0], 5, 1.5, &SearchParams::default())
        .unwrap();
    assert_eq!(indices(&result), vec![0, 1, 2]);
}

#[test]
fn radius_search() {
    let points = points();
    let tree = KdTree::build(&points).unwrap();
    let query = [50.0, 50.0];

    let result = tree
        .radius_search(&query, 20.0, &SearchParams::default())
        .unwrap();
    let mut expected = vec![60, 6, 25, 92, 42, 20, 45, 3, 71, 44, 18, 96];
    expected.sort();
    assert_eq!(sorted_indices(&result), expected, "returns ids");

    assert!(
        result.windows(2).all(|w| w[0] <= w[1]),
        "sorted by distance"
    );
    for neighbor in &result {
        let [x, y] = points[neighbor.index];
        let d = (x - 50.0) * (x - 50.0) + (y - 50.0) * (y - 50.0);
        assert_eq!(neighbor.distance, d);
    }
}

#[test]
fn integer_coordinates() {
    let points: Vec<[i32; 2]> = points()
        .into_iter()
        .map(|[x, y]| [x as i32, y as i32])
        .collect();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(3)
        .finish(&points)
        .unwrap();
    let result = tree.knn(&[50, 50], 5).unwrap();
    assert_eq!(result, brute_force_knn(&points, &SquaredEuclidean, &[50, 50], 5));
}

#[test]
fn knn_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let points: Vec<[f64; 3]> = random_points(&mut rng, 2000);
    let queries: Vec<[f64; 3]> = random_points(&mut rng, 40);

    for leaf_max_size in [1, 10, 64] {
        let tree = KdTreeBuilder::new()
            .leaf_max_size(leaf_max_size)
            .finish(&points)
            .unwrap();
        for query in &queries {
            for k in [1, 5, 33] {
                let result = tree.knn(query, k).unwrap();
                assert_eq!(
                    result,
                    brute_force_knn(&points, &SquaredEuclidean, query, k),
                    "leaf size {}, k {}",
                    leaf_max_size,
                    k
                );
            }
        }
    }
}

#[test]
fn k_larger_than_dataset_returns_everything() {
    let mut rng = StdRng::seed_from_u64(1);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 23);
    let tree = KdTree::build(&points).unwrap();
    let result = tree.knn(&[0.0, 0.0], 100).unwrap();
    assert_eq!(result.len(), 23);
    assert_eq!(result, brute_force(&points, &SquaredEuclidean, &[0.0, 0.0]));
}

#[test]
fn radius_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(3);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 1500);
    let tree = KdTree::build(&points).unwrap();

    for query in random_points::<2>(&mut rng, 20) {
        for radius in [0.0, 5.0, 30.0] {
            let result = tree
                .radius_search(&query, radius, &SearchParams::default())
                .unwrap();
            let expected: Vec<Neighbor> = brute_force(&points, &SquaredEuclidean, &query)
                .into_iter()
                .filter(|n| n.distance <= radius * radius)
                .collect();
            assert_eq!(result, expected);
        }
    }
}

#[test]
fn every_metric_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(11);
    let points: Vec<[f64; 3]> = random_points(&mut rng, 600);
    let queries: Vec<[f64; 3]> = random_points(&mut rng, 15);

    fn check<M>(points: &Vec<[f64; 3]>, queries: &[[f64; 3]], metric: M)
    where
        M: DistanceMetric<f64> + Copy,
    {
        let tree = KdTreeBuilder::new()
            .leaf_max_size(4)
            .metric(metric)
            .finish(points)
            .unwrap();
        for query in queries {
            let result = tree.knn(query, 8).unwrap();
            assert_eq!(result, brute_force_knn(points, &metric, query, 8));
        }
    }

    check(&points, &queries, Manhattan);
    check(&points, &queries, SquaredEuclidean);
    check(&points, &queries, SimpleSquaredEuclidean);
}

#[test]
fn circle_metric_wraps_around() {
    let mut rng = StdRng::seed_from_u64(5);
    let angles: Vec<[f64; 1]> = (0..500).map(|_| [rng.gen_range(0.0..TAU)]).collect();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(5)
        .metric(GeodesicCircle::default())
        .finish(&angles)
        .unwrap();

    for query in [[0.0], [0.01], [TAU - 0.01], [3.0]] {
        let result = tree.knn(&query, 6).unwrap();
        assert_eq!(
            result,
            brute_force_knn(&angles, &GeodesicCircle::default(), &query, 6)
        );
    }

    // near 0 the neighbors just below 2π are found too
    let points = vec![[0.1], [3.0], [TAU - 0.05]];
    let tree = KdTreeBuilder::new()
        .metric(GeodesicCircle::default())
        .finish(&points)
        .unwrap();
    let result = tree.knn(&[0.0], 1).unwrap();
    assert_eq!(result[0].index, 2);
}

#[test]
fn circle_metric_with_angles_past_one_turn() {
    // -4.1 and 2.0 are 0.18 apart once -4.1 is turned by 2π
    let points = vec![[-6.0], [-4.4], [1.7], [3.7], [5.8], [0.3], [2.0]];
    let tree = KdTreeBuilder::new()
        .leaf_max_size(1)
        .metric(GeodesicCircle::default())
        .finish(&points)
        .unwrap();
    let result = tree.knn(&[-4.1], 1).unwrap();
    assert_eq!(result[0].index, 6);
    assert_eq!(
        result,
        brute_force_knn(&points, &GeodesicCircle::default(), &[-4.1], 1)
    );

    let mut rng = StdRng::seed_from_u64(29);
    let metric = GeodesicCircle::with_period(4.0);
    let points: Vec<[f64; 3]> = (0..400)
        .map(|_| std::array::from_fn(|_| rng.gen_range(-10.0..10.0)))
        .collect();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(3)
        .metric(metric)
        .finish(&points)
        .unwrap();
    for _ in 0..40 {
        let query: [f64; 3] = std::array::from_fn(|_| rng.gen_range(-10.0..10.0));
        let result = tree.knn(&query, 5).unwrap();
        assert_eq!(result, brute_force_knn(&points, &metric, &query, 5));
    }
}

#[test]
fn sphere_metric_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(13);
    let unit = |rng: &mut StdRng| -> [f64; 4] {
        let v: [f64; 4] = std::array::from_fn(|_| rng.gen_range(-1.0..1.0));
        let norm = v.iter().map(|c| c * c).sum::<f64>().sqrt();
        v.map(|c| c / norm)
    };
    let quaternions: Vec<[f64; 4]> = (0..400).map(|_| unit(&mut rng)).collect();

    for metric in [GeodesicSphere::default(), GeodesicSphere::quaternion()] {
        let tree = KdTreeBuilder::new()
            .metric(metric)
            .finish(&quaternions)
            .unwrap();
        for _ in 0..10 {
            let query = unit(&mut rng);
            let result = tree.knn(&query, 5).unwrap();
            assert_eq!(result, brute_force_knn(&quaternions, &metric, &query, 5));
        }
    }

    // q and -q are the same rotation
    let tree = KdTreeBuilder::new()
        .metric(GeodesicSphere::quaternion())
        .finish(&quaternions)
        .unwrap();
    let negated = quaternions[17].map(|c| -c);
    let result = tree.knn(&negated, 1).unwrap();
    assert_eq!(result[0].index, 17);
    assert!(result[0].distance < 1e-12);
}

#[test]
fn approximate_search() {
    let mut rng = StdRng::seed_from_u64(17);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 3000);
    let tree = KdTree::build(&points).unwrap();

    for query in random_points::<2>(&mut rng, 25) {
        let exact = tree.knn(&query, 10).unwrap();
        let zero_eps = tree
            .knn_with_params(&query, 10, &SearchParams::default().with_eps(0.0))
            .unwrap();
        assert_eq!(exact, zero_eps);

        let eps = 0.5;
        let approx = tree
            .knn_with_params(&query, 10, &SearchParams::default().with_eps(eps))
            .unwrap();
        assert_eq!(approx.len(), 10);
        let true_kth = exact[9].distance;
        assert!(approx[9].distance <= (1.0 + eps) * true_kth);
    }
}

#[test]
fn leaf_checks_limit_the_search() {
    let mut rng = StdRng::seed_from_u64(19);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 1000);
    let tree = KdTreeBuilder::new()
        .leaf_max_size(4)
        .finish(&points)
        .unwrap();

    let params = SearchParams::default().with_checks(1);
    let result = tree.knn_with_params(&[0.0, 0.0], 50, &params).unwrap();
    assert!(!result.is_empty());
    assert!(result.len() <= 4);
}

#[test]
fn degenerate_datasets() {
    let single = vec![[3.0, 4.0]];
    let tree = KdTree::build(&single).unwrap();
    for query in [[0.0, 0.0], [3.0, 4.0], [-1e9, 1e9]] {
        let result = tree.knn(&query, 3).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 0);
    }
    assert_eq!(tree.knn(&[3.0, 4.0], 1).unwrap()[0].distance, 0.0);

    let coincident = vec![[1.0, 1.0]; 40];
    let tree = KdTreeBuilder::new()
        .leaf_max_size(3)
        .finish(&coincident)
        .unwrap();
    let result = tree.knn(&[1.0, 1.0], 40).unwrap();
    assert_eq!(indices(&result), (0..40).collect::<Vec<_>>());
    assert!(result.iter().all(|n| n.distance == 0.0));

    let points = points();
    let tree = KdTree::build(&points).unwrap();
    let result = tree.knn(&points[42], 1).unwrap();
    assert_eq!(result, vec![Neighbor::new(42, 0.0)]);
}

#[test]
fn invalid_queries() {
    let points = points();
    let tree = KdTree::build(&points).unwrap();

    assert!(matches!(
        tree.knn(&[1.0, 2.0, 3.0], 1),
        Err(KdIndexError::Query(_))
    ));
    assert!(matches!(
        tree.knn(&[1.0, 2.0], 0),
        Err(KdIndexError::Query(_))
    ));
    assert!(matches!(
        tree.knn_with_params(&[1.0, 2.0], 1, &SearchParams::default().with_eps(-0.1)),
        Err(KdIndexError::Query(_))
    ));
    assert!(matches!(
        tree.radius_search(&[1.0, 2.0], -1.0, &SearchParams::default()),
        Err(KdIndexError::Query(_))
    ));

    let empty: Vec<[f64; 2]> = vec![];
    assert!(matches!(
        KdTree::build(&empty),
        Err(KdIndexError::Construction(_))
    ));
}

#[test]
fn custom_result_set() {
    struct CountWithin {
        radius: f64,
        count: usize,
    }

    impl ResultSet for CountWithin {
        fn worst_dist(&self) -> f64 {
            self.radius
        }

        fn add_point(&mut self, distance: f64, _index: usize) -> bool {
            if distance <= self.radius {
                self.count += 1;
            }
            true
        }
    }

    let points = points();
    let tree = KdTree::build(&points).unwrap();
    let mut counter = CountWithin {
        radius: 400.0,
        count: 0,
    };
    tree.find_neighbors(&mut counter, &[50.0, 50.0], &SearchParams::default())
        .unwrap();
    assert_eq!(counter.count, 12);
}

#[test]
fn save_and_load() {
    let mut rng = StdRng::seed_from_u64(23);
    let points: Vec<[f32; 3]> = (0..5000)
        .map(|_| std::array::from_fn(|_| rng.gen_range(-10.0f32..10.0)))
        .collect();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(8)
        .finish(&points)
        .unwrap();

    let mut buffer = vec![];
    tree.save(&mut buffer).unwrap();
    assert_eq!(buffer, tree.to_bytes());
    assert_eq!(
        crate::CoordType::from_header(&buffer).unwrap(),
        crate::CoordType::Float32
    );

    let loaded = KdTree::load(&mut buffer.as_slice(), &points, SquaredEuclidean).unwrap();
    assert_eq!(loaded.num_nodes(), tree.num_nodes());
    assert_eq!(loaded.bounding_box(), tree.bounding_box());
    assert_eq!(loaded.to_bytes(), buffer);

    for _ in 0..20 {
        let query: [f32; 3] = std::array::from_fn(|_| rng.gen_range(-12.0f32..12.0));
        assert_eq!(tree.knn(&query, 9).unwrap(), loaded.knn(&query, 9).unwrap());
        let params = SearchParams::default();
        assert_eq!(
            tree.radius_search(&query, 2.0, &params).unwrap(),
            loaded.radius_search(&query, 2.0, &params).unwrap()
        );
    }

    let fewer = &points[..4999];
    assert!(matches!(
        KdTree::load(&mut buffer.as_slice(), fewer, SquaredEuclidean),
        Err(KdIndexError::Serialization(_))
    ));
    assert!(matches!(
        KdTree::load(&mut &buffer[..buffer.len() / 3], &points, SquaredEuclidean),
        Err(KdIndexError::Serialization(_))
    ));
}

#[test]
fn wide_permutation_round_trip() {
    // 70_000 points need u32 entries in the permutation
    let points: Vec<[u16; 2]> = (0..70_000u32)
        .map(|i| [(i % 257) as u16, (i / 257) as u16])
        .collect();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(32)
        .finish(&points)
        .unwrap();
    let buffer = tree.to_bytes();
    let loaded = KdTree::load(&mut buffer.as_slice(), &points, SquaredEuclidean).unwrap();
    assert_eq!(loaded.knn(&[100, 100], 5).unwrap(), tree.knn(&[100, 100], 5).unwrap());
}

#[test]
fn dynamic_matches_static() {
    let mut rng = StdRng::seed_from_u64(29);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 777);
    let tree = KdTree::build(&points).unwrap();

    let mut dynamic = DynamicKdTree::<f64>::new(2).unwrap();
    for i in 0..points.len() {
        dynamic.insert(&points, i).unwrap();
    }
    assert_eq!(dynamic.len(), 777);
    // 777 = 0b1100001001
    assert_eq!(dynamic.num_trees(), 4);
    assert_eq!(dynamic.tree_sizes().iter().sum::<usize>(), 777);

    let view = dynamic.with_source(&points).unwrap();
    for query in random_points::<2>(&mut rng, 30) {
        assert_eq!(view.knn(&query, 7).unwrap(), tree.knn(&query, 7).unwrap());
        let params = SearchParams::default();
        assert_eq!(
            view.radius_search(&query, 15.0, &params).unwrap(),
            tree.radius_search(&query, 15.0, &params).unwrap()
        );
    }
}

#[test]
fn dynamic_removals_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(31);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 300);
    let mut dynamic = KdTreeBuilder::new()
        .leaf_max_size(4)
        .finish_dynamic::<f64>(2)
        .unwrap();
    dynamic.insert_range(&points, 0..200).unwrap();

    let mut live: Vec<usize> = (0..200).collect();
    for i in (0..200).step_by(3) {
        assert!(dynamic.remove(i));
    }
    live.retain(|i| i % 3 != 0);
    // grow, so that some tombstoned sub-trees get merged
    dynamic.insert_range(&points, 200..300).unwrap();
    live.extend(200..300);
    assert_eq!(dynamic.len(), live.len());
    assert!(!dynamic.contains(3));
    assert!(dynamic.contains(4));

    let view = dynamic.with_source(&points).unwrap();
    for query in random_points::<2>(&mut rng, 20) {
        let expected: Vec<Neighbor> = brute_force(&points, &SquaredEuclidean, &query)
            .into_iter()
            .filter(|n| live.contains(&n.index))
            .take(9)
            .collect();
        assert_eq!(view.knn(&query, 9).unwrap(), expected);
    }
}

#[test]
fn dynamic_save_and_load() {
    let mut rng = StdRng::seed_from_u64(37);
    let points: Vec<[f64; 3]> = random_points(&mut rng, 150);
    let mut dynamic = DynamicKdTree::<f64>::new(3).unwrap();
    dynamic.insert_range(&points, 0..150).unwrap();
    for i in [0, 7, 64, 149] {
        assert!(dynamic.remove(i));
    }

    let view = dynamic.with_source(&points).unwrap();
    let buffer = view.to_bytes().unwrap();
    assert_eq!(
        crate::CoordType::from_header(&buffer).unwrap(),
        crate::CoordType::Float64
    );

    let loaded = DynamicKdTree::load(&mut buffer.as_slice(), &points, SquaredEuclidean).unwrap();
    assert_eq!(loaded.len(), 146);
    assert!(!loaded.contains(64));
    assert!(loaded.contains(65));

    let loaded_view = loaded.with_source(&points).unwrap();
    for query in random_points::<3>(&mut rng, 10) {
        assert_eq!(
            loaded_view.knn(&query, 12).unwrap(),
            view.knn(&query, 12).unwrap()
        );
    }

    let static_bytes = KdTree::build(&points).unwrap().to_bytes();
    assert!(matches!(
        DynamicKdTree::load(&mut static_bytes.as_slice(), &points, SquaredEuclidean),
        Err(KdIndexError::Serialization(_))
    ));
    assert!(matches!(
        DynamicKdTree::load(&mut &buffer[..buffer.len() - 2], &points, SquaredEuclidean),
        Err(KdIndexError::Serialization(_))
    ));
}

#[test]
fn empty_dynamic_tree_returns_nothing() {
    let points = points();
    let mut dynamic = DynamicKdTree::<f64>::new(2).unwrap();
    {
        let view = dynamic.with_source(&points).unwrap();
        assert!(view.knn(&[1.0, 1.0], 3).unwrap().is_empty());
    }
    dynamic.insert(&points, 5).unwrap();
    assert!(dynamic.remove(5));
    assert!(dynamic.is_empty());
    let view = dynamic.with_source(&points).unwrap();
    assert!(view.knn(&[1.0, 1.0], 3).unwrap().is_empty());
}

#[test]
fn other_point_sources() {
    let points = points();
    let flat: Vec<f64> = points.iter().flatten().copied().collect();
    let source = FlatPoints::try_new(&flat, 2).unwrap();
    let tree = KdTree::build(&source).unwrap();
    let expected = brute_force_knn(&points, &SquaredEuclidean, &[10.0, 90.0], 4);
    assert_eq!(tree.knn(&[10.0, 90.0], 4).unwrap(), expected);

    let nested: Vec<Vec<f64>> = points.iter().map(|p| p.to_vec()).collect();
    let tree = KdTree::build(&nested).unwrap();
    assert_eq!(tree.knn(&[10.0, 90.0], 4).unwrap(), expected);

    let coords: Vec<xy::Xy> = points
        .iter()
        .map(|&[x, y]| xy::Xy(x, y))
        .collect();
    let source = CoordSource::new(&coords);
    let tree = KdTree::build(&source).unwrap();
    assert_eq!(
        tree.knn_coord(&xy::Xy(10.0, 90.0), 4).unwrap(),
        expected
    );
}

mod xy {
    use geo_traits::{CoordTrait, Dimensions};

    #[derive(Debug, Clone, Copy)]
    pub struct Xy(pub f64, pub f64);

    impl CoordTrait for Xy {
        type T = f64;

        fn dim(&self) -> Dimensions {
            Dimensions::Xy
        }

        fn x(&self) -> f64 {
            self.0
        }

        fn y(&self) -> f64 {
            self.1
        }

        fn nth_or_panic(&self, n: usize) -> f64 {
            match n {
                0 => self.0,
                1 => self.1,
                _ => panic!("Xy has two dimensions"),
            }
        }
    }
}

#[test]
fn batch_queries() {
    let mut rng = StdRng::seed_from_u64(41);
    let points: Vec<[f64; 3]> = random_points(&mut rng, 500);
    let tree = KdTree::build(&points).unwrap();
    let all = tree
        .knn_batch(&points, 3, &SearchParams::default())
        .unwrap();
    assert_eq!(all.len(), points.len());
    for (i, neighbors) in all.iter().enumerate() {
        assert_eq!(neighbors[0], Neighbor::new(i, 0.0));
        assert_eq!(neighbors, &tree.knn(&points[i], 3).unwrap());
    }
}

#[test]
fn concurrent_queries() {
    let mut rng = StdRng::seed_from_u64(43);
    let points: Vec<[f64; 2]> = random_points(&mut rng, 2000);
    let queries: Vec<[f64; 2]> = random_points(&mut rng, 64);
    let tree = KdTree::build(&points).unwrap();
    let expected: Vec<Vec<Neighbor>> = queries.iter().map(|q| tree.knn(q, 5).unwrap()).collect();

    std::thread::scope(|scope| {
        for chunk in 0..4 {
            let tree = &tree;
            let queries = &queries;
            let expected = &expected;
            scope.spawn(move || {
                for i in (chunk..queries.len()).step_by(4) {
                    assert_eq!(tree.knn(&queries[i], 5).unwrap(), expected[i]);
                }
            });
        }
    });
}

#[test]
fn traversal_covers_every_point() {
    use geo_traits::{CoordTrait, RectTrait};

    let points = points();
    let tree = KdTreeBuilder::new()
        .leaf_max_size(6)
        .finish(&points)
        .unwrap();

    let root = tree.root();
    assert_eq!(root.min().x(), 1.0);
    assert_eq!(root.max().y(), 98.0);

    let mut seen = vec![];
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(ids) = node.point_indices() {
            assert!(ids.len() <= tree.leaf_max_size());
            for &id in ids {
                assert!(node.bounding_box().contains_point(&points[id as usize]));
                seen.push(id as usize);
            }
        } else {
            let (dim, split) = node.split().unwrap();
            assert!(dim < 2);
            let left = node.left_child().unwrap();
            let right = node.right_child().unwrap();
            assert_eq!(left.bounding_box().high()[dim], split);
            assert_eq!(right.bounding_box().low()[dim], split);
            stack.push(left);
            stack.push(right);
        }
    }
    seen.sort();
    assert_eq!(seen, (0..points.len()).collect::<Vec<_>>());
    assert!(tree.memory_usage() > 0);
}
