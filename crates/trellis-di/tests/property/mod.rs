//! Property-based tests for dependency graph planning
//!
//! Uses proptest to verify invariants of the planner and resolver:
//! 1. Plan ordering - every dependency precedes its dependents
//! 2. Plan coverage - a plan holds exactly the nodes reachable from its root
//! 3. Cycle reporting - a cycle is reported as the path from the root back to itself
//! 4. Singleton identity - repeated resolution of a DAG yields the same instances

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use trellis_di::{Container, DiError, Module, Signature};

#[derive(Debug)]
struct Node(usize);

fn label(index: usize) -> String {
	format!("n{index}")
}

fn signature(index: usize) -> Signature {
	Signature::named::<Node>(label(index))
}

/// Random DAG: node `i` may depend only on nodes with a lower index.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
	(2usize..9).prop_flat_map(|size| {
		(0..size)
			.map(|index| {
				if index == 0 {
					Just(Vec::new()).boxed()
				} else {
					proptest::collection::btree_set(0..index, 0..=index.min(3))
						.prop_map(|set| set.into_iter().collect::<Vec<_>>())
						.boxed()
				}
			})
			.collect::<Vec<_>>()
	})
}

/// Registers one singleton per node, each resolving its dependencies by qualifier.
fn register_graph(container: &Container, edges: &[Vec<usize>]) -> Module {
	let mut module = Module::new("graph");
	for (index, dependencies) in edges.iter().enumerate() {
		let labels: Vec<String> = dependencies.iter().map(|&d| label(d)).collect();
		let mut builder = module
			.singleton(move |inj| {
				for dependency in &labels {
					inj.get_named::<Node>(dependency.as_str())?;
				}
				Ok(Node(index))
			})
			.named(label(index))
			.no_dependencies();
		for &dependency in dependencies {
			builder = builder.depends_on_signature(signature(dependency));
		}
	}
	container
		.register([&module])
		.expect("Generated graphs have no duplicate signatures");
	module
}

fn reachable(edges: &[Vec<usize>], root: usize) -> HashSet<usize> {
	let mut seen = HashSet::new();
	let mut stack = vec![root];
	while let Some(current) = stack.pop() {
		if seen.insert(current) {
			stack.extend(edges[current].iter().copied());
		}
	}
	seen
}

proptest! {
	#[test]
	fn plan_orders_dependencies_first(edges in dag_strategy()) {
		let container = Container::new();
		register_graph(&container, &edges);
		let root = edges.len() - 1;

		let plan = container.plan(&signature(root)).unwrap();

		let position: HashMap<Signature, usize> = plan
			.order()
			.cloned()
			.enumerate()
			.map(|(index, signature)| (signature, index))
			.collect();
		for node in plan.nodes() {
			for dependency in &node.dependencies {
				prop_assert!(position[dependency] < position[&node.signature]);
			}
		}
		let root_signature = signature(root);
		prop_assert_eq!(plan.order().last(), Some(&root_signature));
	}

	#[test]
	fn plan_covers_exactly_the_reachable_nodes(edges in dag_strategy()) {
		let container = Container::new();
		register_graph(&container, &edges);
		let root = edges.len() - 1;

		let plan = container.plan(&signature(root)).unwrap();

		let expected: HashSet<Signature> = reachable(&edges, root).into_iter().map(signature).collect();
		let actual: HashSet<Signature> = plan.order().cloned().collect();
		prop_assert_eq!(actual, expected);
	}

	#[test]
	fn dag_resolution_is_stable(edges in dag_strategy()) {
		let container = Container::new();
		register_graph(&container, &edges);
		let root = edges.len() - 1;

		let first = container.get_named::<Node>(label(root)).unwrap();
		let second = container.get_named::<Node>(label(root)).unwrap();

		prop_assert!(Arc::ptr_eq(&first, &second));
		prop_assert_eq!(first.0, root);
	}

	#[test]
	fn chain_cycle_is_reported_from_the_root(length in 1usize..7) {
		let container = Container::new();
		let edges: Vec<Vec<usize>> = (0..length).map(|index| vec![(index + 1) % length]).collect();
		register_graph(&container, &edges);

		let error = container.get_named::<Node>(label(0)).unwrap_err();

		let mut expected: Vec<Signature> = (0..length).map(signature).collect();
		expected.push(signature(0));
		match error {
			DiError::Cycle { path, .. } => prop_assert_eq!(path.signatures(), expected.as_slice()),
			other => prop_assert!(false, "Expected Cycle, got {:?}", other),
		}
	}
}
