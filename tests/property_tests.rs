//! Property-based tests for ranking and exact search.
//!
//! These tests verify invariants that should hold regardless of input:
//! - A k-NN queue holds at most k entries, and they are the k smallest
//! - Range results hold exactly the offered entries within the radius
//! - VP-tree search with unit pruning factors equals brute force under L2.
//!   Ties at the k-th distance are resolved first-seen, and the tree visits
//!   objects in a different order than a scan, so ids are compared only for
//!   entries strictly closer than the k-th distance.

use std::sync::Arc;

use proptest::prelude::*;
use simspace::{
    Dataset, DistanceMetric, Index, KnnQuery, KnnQueue, Neighbor, Object, RangeQuery,
    RangeResults, SeqSearch, Space, VectorSpace, VpTree,
};
use simspace::vptree::VpTreeParams;

mod ranking_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn knn_queue_keeps_k_smallest(
            k in 0usize..20,
            distances in prop::collection::vec(0.0f32..100.0, 0..200),
        ) {
            let mut queue = KnnQueue::new(k);
            for (id, &d) in distances.iter().enumerate() {
                queue.push(id, d);
                prop_assert!(queue.len() <= k);
            }

            let mut reference: Vec<(f32, usize)> = distances
                .iter()
                .enumerate()
                .map(|(id, &d)| (d, id))
                .collect();
            reference.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            reference.truncate(k);

            let got: Vec<(f32, usize)> = queue.results().iter().map(|n| (n.distance, n.id)).collect();
            prop_assert_eq!(got, reference);
        }

        #[test]
        fn range_results_filter_by_radius(
            radius in 0.0f32..50.0,
            distances in prop::collection::vec(0.0f32..100.0, 0..200),
        ) {
            let mut results = RangeResults::new(radius);
            for (id, &d) in distances.iter().enumerate() {
                prop_assert_eq!(results.push(id, d), d <= radius);
            }
            let expected: Vec<usize> = distances
                .iter()
                .enumerate()
                .filter(|(_, d)| **d <= radius)
                .map(|(id, _)| id)
                .collect();
            let got: Vec<usize> = results.results().iter().map(|n| n.id).collect();
            prop_assert_eq!(got, expected);

            let sorted = results.sorted_results();
            prop_assert!(sorted.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }
}

/// Ids of the entries that every exact k-NN answer must contain: all of them
/// when fewer than `k` were found, else those strictly closer than the k-th.
fn ids_closer_than_kth(results: &[Neighbor], k: usize) -> Vec<usize> {
    let mut ids: Vec<usize> = match results.last() {
        Some(kth) if results.len() == k => results
            .iter()
            .filter(|n| n.distance < kth.distance)
            .map(|n| n.id)
            .collect(),
        _ => results.iter().map(|n| n.id).collect(),
    };
    ids.sort_unstable();
    ids
}

mod vptree_props {
    use super::*;

    prop_compose! {
        fn arb_points(max_len: usize)(
            points in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 1..max_len)
        ) -> Vec<Vec<f32>> {
            points
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn vptree_knn_equals_brute_force(
            points in arb_points(300),
            query in prop::collection::vec(-10.0f32..10.0, 3),
            k in 1usize..15,
            bucket_size in 1usize..8,
            seed in any::<u64>(),
        ) {
            let vector_space = VectorSpace::from_metric(DistanceMetric::L2);
            let dataset = Arc::new(vector_space.create_dataset(&points).unwrap());
            let space: Arc<dyn Space> = Arc::new(vector_space);
            let tree = VpTree::new(space.clone(), dataset.clone(), VpTreeParams { bucket_size, seed });
            let brute = SeqSearch::new(space.clone(), dataset);
            let q = Object::new(usize::MAX, query);

            let mut expected = KnnQuery::new(space.as_ref(), &q, k);
            brute.search(&mut expected).unwrap();
            let mut actual = KnnQuery::new(space.as_ref(), &q, k);
            tree.search(&mut actual).unwrap();

            let want: Vec<f32> = expected.results().iter().map(|n| n.distance).collect();
            let got: Vec<f32> = actual.results().iter().map(|n| n.distance).collect();
            prop_assert_eq!(got, want);
            prop_assert_eq!(
                ids_closer_than_kth(&actual.results(), k),
                ids_closer_than_kth(&expected.results(), k)
            );
        }

        #[test]
        fn vptree_range_equals_brute_force(
            points in arb_points(300),
            query in prop::collection::vec(-10.0f32..10.0, 3),
            radius in 0.0f32..8.0,
            seed in any::<u64>(),
        ) {
            let vector_space = VectorSpace::from_metric(DistanceMetric::L2);
            let dataset = Arc::new(vector_space.create_dataset(&points).unwrap());
            let space: Arc<dyn Space> = Arc::new(vector_space);
            let tree = VpTree::new(space.clone(), dataset.clone(), VpTreeParams { bucket_size: 4, seed });
            let brute = SeqSearch::new(space.clone(), dataset);
            let q = Object::new(usize::MAX, query);

            let mut expected = RangeQuery::new(space.as_ref(), &q, radius);
            brute.search(&mut expected).unwrap();
            let mut actual = RangeQuery::new(space.as_ref(), &q, radius);
            tree.search(&mut actual).unwrap();

            let mut want: Vec<usize> = expected.results().iter().map(|n| n.id).collect();
            let mut got: Vec<usize> = actual.results().iter().map(|n| n.id).collect();
            want.sort_unstable();
            got.sort_unstable();
            prop_assert_eq!(got, want);
        }
    }

    #[test]
    fn vptree_knn_on_integer_grid() {
        // Every distance on the grid is shared by several objects.
        let rows: Vec<Vec<f32>> = (0..11)
            .flat_map(|i| (0..11).map(move |j| vec![i as f32, j as f32]))
            .collect();
        let vector_space = VectorSpace::from_metric(DistanceMetric::L2);
        let dataset = Arc::new(vector_space.create_dataset(&rows).unwrap());
        let space: Arc<dyn Space> = Arc::new(vector_space);
        let brute = SeqSearch::new(space.clone(), dataset.clone());
        let q = Object::new(usize::MAX, vec![5.0, 5.0]);

        for seed in 0..20 {
            for bucket_size in [1, 3] {
                let tree = VpTree::new(space.clone(), dataset.clone(), VpTreeParams { bucket_size, seed });
                for k in [2, 3, 6, 7] {
                    let mut expected = KnnQuery::new(space.as_ref(), &q, k);
                    brute.search(&mut expected).unwrap();
                    let mut actual = KnnQuery::new(space.as_ref(), &q, k);
                    tree.search(&mut actual).unwrap();

                    let want = expected.results();
                    let got = actual.results();
                    let want_d: Vec<f32> = want.iter().map(|n| n.distance).collect();
                    let got_d: Vec<f32> = got.iter().map(|n| n.distance).collect();
                    assert_eq!(got_d, want_d, "seed {} k {}", seed, k);
                    assert_eq!(ids_closer_than_kth(&got, k), ids_closer_than_kth(&want, k));
                    // Entries tied with the k-th are real objects at that distance.
                    for n in &got {
                        assert_eq!(space.distance(&dataset[n.id], &q), n.distance);
                    }
                }
            }
        }
    }

    #[test]
    fn empty_dataset_has_no_results() {
        let space: Arc<dyn Space> = Arc::new(VectorSpace::from_metric(DistanceMetric::L2));
        let tree = VpTree::new(space.clone(), Arc::new(Dataset::default()), VpTreeParams::default());
        let q = Object::new(0, vec![1.0, 2.0, 3.0]);
        let mut query = KnnQuery::new(space.as_ref(), &q, 4);
        tree.search(&mut query).unwrap();
        assert_eq!(query.result_size(), 0);
    }
}
