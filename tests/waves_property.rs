use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use assetdag::dag::TaskGraph;
use assetdag::errors::ConfigurationError;
use assetdag_test_utils::fakes::{fake_task, FakeProcessor};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    let valid: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        deps.into_iter().map(|d| d % i).collect()
                    };
                    valid.into_iter().collect()
                })
                .collect()
        })
    })
}

fn build(deps: &[Vec<usize>], shuffle_seed: usize) -> TaskGraph {
    let processor = FakeProcessor::succeeding(Arc::new(Mutex::new(Vec::new())));
    let n = deps.len();
    // Declare tasks in a rotated order so declaration order is not always
    // a topological order.
    let mut graph = TaskGraph::new();
    for k in 0..n {
        let i = (k + shuffle_seed) % n;
        graph.add_task(fake_task(&format!("t{i}"), processor.clone())).unwrap();
    }
    for (i, ds) in deps.iter().enumerate() {
        for d in ds {
            graph.add_dependency(&format!("t{i}"), &format!("t{d}")).unwrap();
        }
    }
    graph
}

proptest! {
    #[test]
    fn waves_are_a_valid_topological_layering(deps in dag_strategy(12), seed in 0usize..12) {
        let graph = build(&deps, seed);
        prop_assert!(graph.validate().is_ok());

        let waves: Vec<Vec<String>> = graph.execution_order().collect();

        let mut wave_of: HashMap<String, usize> = HashMap::new();
        for (w, wave) in waves.iter().enumerate() {
            prop_assert!(!wave.is_empty());
            for name in wave {
                prop_assert!(wave_of.insert(name.clone(), w).is_none(), "{} scheduled twice", name);
            }
        }
        prop_assert_eq!(wave_of.len(), deps.len());

        for (i, ds) in deps.iter().enumerate() {
            let task_wave = wave_of[&format!("t{i}")];
            for d in ds {
                let dep_wave = wave_of[&format!("t{d}")];
                prop_assert!(dep_wave < task_wave, "t{} must run before t{}", d, i);
            }
        }

        // Each wave lists its tasks in declaration order.
        let declared: Vec<&str> = graph.task_names().collect();
        for wave in &waves {
            let positions: Vec<usize> = wave
                .iter()
                .map(|n| declared.iter().position(|d| *d == n.as_str()).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|p| p[0] < p[1]));
        }
    }

    #[test]
    fn any_back_edge_is_reported_as_a_cycle(deps in dag_strategy(10)) {
        let n = deps.len();
        prop_assume!(n >= 2);

        let mut graph = build(&deps, 0);
        // Chain t0 <- t1 <- ... <- t(n-1), then close it.
        for i in 1..n {
            graph.add_dependency(&format!("t{i}"), &format!("t{}", i - 1)).unwrap();
        }
        graph.add_dependency("t0", &format!("t{}", n - 1)).unwrap();

        match graph.validate() {
            Err(ConfigurationError::Cycle { members }) => {
                let members: HashSet<String> = members.into_iter().collect();
                prop_assert_eq!(members.len(), n);
            }
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }
}
