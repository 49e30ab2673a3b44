//! Dependency graph planning
//!
//! A [`Plan`] is the validated, topologically ordered subgraph reachable from one
//! root signature. Plans are built breadth-first from the root, sorted with Kahn's
//! algorithm, and cached under the registry version they were built against. When
//! sorting cannot place every node, a depth-first walk from the root reconstructs
//! one cycle for the error.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::BindingKind;
use crate::error::{CycleOrigin, CyclePath, DiError, DiResult};
use crate::signature::Signature;

/// One binding in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
	/// Canonical signature of the binding.
	pub signature: Signature,
	pub kind: BindingKind,
	/// Canonical signatures of the registered dependencies.
	pub dependencies: Vec<Signature>,
}

/// Cycle-free resolution order for a root signature at one registry version.
#[derive(Debug, Clone)]
pub struct Plan {
	root: Signature,
	version: u64,
	nodes: Vec<PlanNode>,
}

impl Plan {
	pub fn root(&self) -> &Signature {
		&self.root
	}

	/// Registry version the plan was built against.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Signatures with every dependency before its dependents. The root is last.
	pub fn order(&self) -> impl Iterator<Item = &Signature> {
		self.nodes.iter().map(|node| &node.signature)
	}

	/// Nodes in topological order.
	pub fn nodes(&self) -> &[PlanNode] {
		&self.nodes
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn contains(&self, signature: &Signature) -> bool {
		self.nodes.iter().any(|node| node.signature == *signature)
	}
}

/// What the planner needs to know about a registered signature.
#[derive(Debug, Clone)]
pub(crate) struct PlanInput {
	pub(crate) canonical: Signature,
	pub(crate) kind: BindingKind,
	/// Dependencies as requested, possibly aliases or unregistered signatures.
	pub(crate) dependencies: Vec<Signature>,
}

/// Builds the plan for `root`.
///
/// `source` resolves a signature to its binding, or `None` when nothing is
/// registered under it. Unregistered dependencies are left out of the plan; they
/// surface as `MissingBinding` when resolved.
pub(crate) fn build(
	root: PlanInput,
	version: u64,
	mut source: impl FnMut(&Signature) -> Option<PlanInput>,
) -> DiResult<Plan> {
	let root_signature = root.canonical.clone();
	let mut index: HashMap<Signature, usize> = HashMap::new();
	let mut nodes: Vec<PlanNode> = Vec::new();
	let mut pending: Vec<Vec<Signature>> = Vec::new();

	index.insert(root.canonical.clone(), 0);
	nodes.push(PlanNode {
		signature: root.canonical,
		kind: root.kind,
		dependencies: Vec::new(),
	});
	pending.push(root.dependencies);

	let mut queue = VecDeque::from([0usize]);
	while let Some(current) = queue.pop_front() {
		let requested = std::mem::take(&mut pending[current]);
		for dependency in requested {
			let Some(input) = source(&dependency) else {
				continue;
			};
			let canonical = input.canonical.clone();
			if !index.contains_key(&canonical) {
				index.insert(canonical.clone(), nodes.len());
				queue.push_back(nodes.len());
				nodes.push(PlanNode {
					signature: input.canonical,
					kind: input.kind,
					dependencies: Vec::new(),
				});
				pending.push(input.dependencies);
			}
			let edges = &mut nodes[current].dependencies;
			if !edges.contains(&canonical) {
				edges.push(canonical);
			}
		}
	}

	let order = if nodes.len() == 1 && nodes[0].dependencies.is_empty() {
		vec![0]
	} else {
		topological_order(&nodes, &index)?
	};

	let mut slots: Vec<Option<PlanNode>> = nodes.into_iter().map(Some).collect();
	let ordered: Vec<PlanNode> = order
		.into_iter()
		.filter_map(|position| slots[position].take())
		.collect();

	tracing::debug!(root = %root_signature, version, nodes = ordered.len(), "plan built");
	Ok(Plan {
		root: root_signature,
		version,
		nodes: ordered,
	})
}

/// Kahn's algorithm over node indices. Dependencies come first.
fn topological_order(nodes: &[PlanNode], index: &HashMap<Signature, usize>) -> DiResult<Vec<usize>> {
	let mut in_degree: Vec<usize> = nodes.iter().map(|node| node.dependencies.len()).collect();
	let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
	for (position, node) in nodes.iter().enumerate() {
		for dependency in &node.dependencies {
			dependents[index[dependency]].push(position);
		}
	}

	let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
	let mut order = Vec::with_capacity(nodes.len());
	while let Some(current) = queue.pop_front() {
		order.push(current);
		for &dependent in &dependents[current] {
			in_degree[dependent] -= 1;
			if in_degree[dependent] == 0 {
				queue.push_back(dependent);
			}
		}
	}

	if order.len() < nodes.len() {
		let path = find_cycle(nodes, index).unwrap_or_default();
		return Err(DiError::Cycle {
			path: CyclePath(path),
			detected_by: CycleOrigin::Planner,
		});
	}
	Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
	Unvisited,
	Visiting,
	Done,
}

/// Depth-first search from the root (index 0) for one cycle.
fn find_cycle(nodes: &[PlanNode], index: &HashMap<Signature, usize>) -> Option<Vec<Signature>> {
	let mut marks = vec![Mark::Unvisited; nodes.len()];
	let mut path: Vec<usize> = Vec::new();
	(0..nodes.len()).find_map(|start| {
		if marks[start] == Mark::Unvisited {
			visit(start, nodes, index, &mut marks, &mut path)
		} else {
			None
		}
	})
}

fn visit(
	current: usize,
	nodes: &[PlanNode],
	index: &HashMap<Signature, usize>,
	marks: &mut [Mark],
	path: &mut Vec<usize>,
) -> Option<Vec<Signature>> {
	marks[current] = Mark::Visiting;
	path.push(current);

	for dependency in &nodes[current].dependencies {
		let next = index[dependency];
		match marks[next] {
			Mark::Visiting => {
				let start = path.iter().position(|&p| p == next)?;
				let mut cycle: Vec<Signature> = path[start..]
					.iter()
					.map(|&p| nodes[p].signature.clone())
					.collect();
				cycle.push(nodes[next].signature.clone());
				return Some(cycle);
			}
			Mark::Unvisited => {
				if let Some(cycle) = visit(next, nodes, index, marks, path) {
					return Some(cycle);
				}
			}
			Mark::Done => {}
		}
	}

	path.pop();
	marks[current] = Mark::Done;
	None
}

/// Plans keyed by canonical root, each stamped with its build version.
#[derive(Default)]
pub(crate) struct PlanCache {
	plans: Mutex<HashMap<Signature, Arc<Plan>>>,
}

impl PlanCache {
	/// Cached plan for `root`, if it was built at `version`.
	pub(crate) fn get(&self, root: &Signature, version: u64) -> Option<Arc<Plan>> {
		self.plans
			.lock()
			.get(root)
			.filter(|plan| plan.version == version)
			.cloned()
	}

	pub(crate) fn insert(&self, plan: Arc<Plan>) {
		let mut plans = self.plans.lock();
		// Newer versions only: a slow builder must not replace a fresher plan.
		match plans.get(&plan.root) {
			Some(existing) if existing.version > plan.version => {}
			_ => {
				plans.insert(plan.root.clone(), plan);
			}
		}
	}

	pub(crate) fn clear(&self) {
		self.plans.lock().clear();
	}
}
