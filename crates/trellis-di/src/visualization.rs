//! Plan visualization for development and debugging
//!
//! Renders a [`Plan`] in DOT format, which can be turned into an image with
//! Graphviz.
//!
//! ```rust
//! use trellis_di::{Container, Module, Signature};
//!
//! struct Database;
//! struct UserService;
//!
//! let mut module = Module::new("app");
//! module.singleton(|_| Ok(Database)).no_dependencies();
//! module.factory(|inj| {
//!     inj.get::<Database>()?;
//!     Ok(UserService)
//! });
//!
//! let container = Container::new();
//! container.register([&module]).unwrap();
//!
//! let dot = container.plan(&Signature::of::<UserService>()).unwrap().to_dot();
//! assert!(dot.contains("Database"));
//! assert!(dot.contains("->"));
//! ```

use crate::binding::BindingKind;
use crate::planner::Plan;

fn fill_color(kind: &BindingKind) -> &'static str {
	match kind {
		BindingKind::Singleton => "lightblue",
		BindingKind::Scoped(_) => "lightgreen",
		BindingKind::Factory => "lightyellow",
	}
}

fn escape(label: &str) -> String {
	label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Plan {
	/// Generates a DOT graph of the plan
	///
	/// Nodes are listed in resolution order and coloured by binding kind. Edges
	/// point from a binding to each of its dependencies.
	pub fn to_dot(&self) -> String {
		let mut output = String::from("digraph Plan {\n");
		output.push_str("  rankdir=LR;\n");
		output.push_str("  node [shape=box, style=rounded];\n\n");

		for node in self.nodes() {
			let name = escape(&node.signature.to_string());
			output.push_str(&format!(
				"  \"{}\" [label=\"{}\\n({})\", fillcolor={}, style=filled];\n",
				name,
				name,
				node.kind,
				fill_color(&node.kind)
			));
		}

		output.push('\n');

		for node in self.nodes() {
			let from = escape(&node.signature.to_string());
			for dependency in &node.dependencies {
				output.push_str(&format!(
					"  \"{}\" -> \"{}\";\n",
					from,
					escape(&dependency.to_string())
				));
			}
		}

		output.push_str("}\n");
		output
	}
}
