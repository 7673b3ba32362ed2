use std::io::Cursor;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use corrclust::cutting_plane::{FamilyToggles, Transitivity};
use corrclust::io::{parse_graph, read_membership, write_membership};
use corrclust::{
    CuttingPlaneEngine, CuttingPlaneSettings, FeasibleSolution, Formulation, SignedGraph,
    SimplexFactory, Termination,
};

/// Cost of the best partition, by enumerating restricted growth strings.
fn brute_force(graph: &SignedGraph) -> f64 {
    fn recurse(graph: &SignedGraph, labels: &mut Vec<usize>, used: usize, best: &mut f64) {
        if labels.len() == graph.n() {
            *best = best.min(FeasibleSolution::evaluate(graph, labels));
            return;
        }
        for label in 0..=used {
            labels.push(label);
            recurse(graph, labels, used.max(label + 1), best);
            labels.pop();
        }
    }
    let mut best = f64::INFINITY;
    recurse(graph, &mut Vec::new(), 0, &mut best);
    best
}

fn random_graph(rng: &mut StdRng, n: usize, density: f64) -> SignedGraph {
    let mut edges = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if rng.gen_bool(density) {
                let weight: f64 = rng.gen_range(-3.0..3.0);
                edges.push((i, j, (weight * 4.0).round() / 4.0));
            }
        }
    }
    SignedGraph::new(n, edges).unwrap()
}

fn solve(formulation: Formulation, settings: CuttingPlaneSettings) -> corrclust::CuttingPlaneResult {
    let mut engine = CuttingPlaneEngine::new(formulation, SimplexFactory::new(), settings).unwrap();
    engine.run().unwrap()
}

#[test]
fn test_complete_formulation_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..6 {
        let n = rng.gen_range(4..=6);
        let graph = random_graph(&mut rng, n, 0.8);
        let expected = brute_force(&graph);
        let transitivity = match round % 3 {
            0 => Transitivity::Separated,
            1 => Transitivity::Lazy,
            _ => Transitivity::InModel,
        };
        let settings = CuttingPlaneSettings::default()
            .with_seed(round)
            .with_transitivity(transitivity)
            .with_threads(1 + round as usize % 2);
        let result = solve(Formulation::complete(graph.clone()), settings);

        assert!(result.proven_optimal, "round {round}: {:?}", result.termination);
        let solution = result.solution.as_ref().unwrap();
        assert_abs_diff_eq!(solution.objective(), expected, epsilon = 1e-6);
        assert_abs_diff_eq!(
            FeasibleSolution::evaluate(&graph, solution.membership()),
            expected,
            epsilon = 1e-6
        );
        assert!(result.root_bound.unwrap() <= expected + 1e-6);
    }
}

#[test]
fn test_sparse_formulation_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(23);
    for round in 0..6 {
        let n = rng.gen_range(4..=7);
        let graph = random_graph(&mut rng, n, 0.5);
        let expected = brute_force(&graph);
        let settings = CuttingPlaneSettings::default().with_seed(round);
        let result = solve(Formulation::sparse(graph), settings);

        assert!(result.proven_optimal, "round {round}: {:?}", result.termination);
        assert_abs_diff_eq!(result.objective().unwrap(), expected, epsilon = 1e-6);
    }
}

#[test]
fn test_user_cuts_do_not_change_the_optimum() {
    let mut rng = StdRng::seed_from_u64(41);
    let graph = random_graph(&mut rng, 6, 0.9);
    let expected = brute_force(&graph);
    let settings = CuttingPlaneSettings::default()
        .with_seed(3)
        .with_user_cuts(true)
        .with_transitivity(Transitivity::Lazy);
    let result = solve(Formulation::complete(graph), settings);
    assert_abs_diff_eq!(result.objective().unwrap(), expected, epsilon = 1e-6);
}

#[test]
fn test_depth_limited_and_local_user_cuts_keep_the_optimum() {
    let mut rng = StdRng::seed_from_u64(43);
    for round in 0..3 {
        let graph = random_graph(&mut rng, 6, 0.9);
        let expected = brute_force(&graph);
        let settings = CuttingPlaneSettings::default()
            .with_seed(round)
            .with_user_cuts(true)
            .with_transitivity(Transitivity::Lazy)
            .with_user_cut_max_depth(4)
            .with_local_cut_depth(round as usize);
        let result = solve(Formulation::complete(graph), settings);
        assert!(result.proven_optimal, "round {round}: {:?}", result.termination);
        assert_abs_diff_eq!(result.objective().unwrap(), expected, epsilon = 1e-6);
    }
}

#[test]
fn test_only_fractional_run_skips_branch_and_bound() {
    let mut rng = StdRng::seed_from_u64(5);
    let graph = random_graph(&mut rng, 6, 0.9);
    let expected = brute_force(&graph);
    let settings = CuttingPlaneSettings::default()
        .with_seed(9)
        .with_only_fractional_solution(true)
        .with_families(FamilyToggles {
            two_partition_kl: false,
            odd_cycle_kl: false,
            ..FamilyToggles::default()
        });
    let result = solve(Formulation::complete(graph), settings);

    assert!(result.branch_and_bound.is_none());
    assert_ne!(result.termination, Termination::OracleFailure);
    let bound = result.root_bound.unwrap();
    assert!(bound <= expected + 1e-6);
    assert!(result.objective().unwrap() >= expected - 1e-6);
}

#[test]
fn test_graph_file_to_membership_file() {
    let text = "5\t6\n0\t1\t2\n1\t2\t1\n0\t2\t-1\n2\t3\t-2\n3\t4\t3\n1\t4\t-0.5\n";
    let graph = parse_graph(Cursor::new(text)).unwrap();
    let expected = brute_force(&graph);
    let settings = CuttingPlaneSettings::default()
        .with_seed(1)
        .with_time_limit(Duration::from_secs(60));
    let result = solve(Formulation::complete(graph.clone()), settings);
    let solution = result.solution.unwrap();
    assert_abs_diff_eq!(solution.objective(), expected, epsilon = 1e-6);

    let path = std::env::temp_dir().join(format!("corrclust-membership-{}.txt", std::process::id()));
    write_membership(&path, &solution).unwrap();
    let membership = read_membership(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(membership.len(), 5);
    assert!(membership.iter().all(|&id| id >= 1));
    let reread = FeasibleSolution::from_membership(&graph, &membership).unwrap();
    assert_eq!(reread, solution);
}
