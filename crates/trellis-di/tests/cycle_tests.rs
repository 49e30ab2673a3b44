//! Cycle detection by the planner and by the resolution stack

use rstest::rstest;
use std::sync::Arc;
use trellis_di::{Container, ContainerSettings, CycleOrigin, DiError, Module, Signature};
use trellis_test::{container, untraced_container};

#[allow(dead_code)]
#[derive(Debug)]
struct A(Arc<B>);

#[allow(dead_code)]
#[derive(Debug)]
struct B(Arc<A>);

#[derive(Debug)]
struct C;

fn cycle_of(error: DiError) -> (Vec<Signature>, CycleOrigin) {
	match error {
		DiError::Cycle { path, detected_by } => (path.signatures().to_vec(), detected_by),
		other => panic!("Expected Cycle, got {:?}", other),
	}
}

fn mutual_singletons() -> Module {
	let mut module = Module::new("cyclic");
	module.singleton(|inj| Ok(A(inj.get()?)));
	module.singleton(|inj| Ok(B(inj.get()?)));
	module
}

#[rstest]
fn declared_cycle_is_rejected_by_planner(container: Container) {
	// Arrange
	let mut module = Module::new("cyclic");
	module.singleton(|inj| Ok(A(inj.get()?))).depends_on::<B>();
	module.singleton(|inj| Ok(B(inj.get()?))).depends_on::<A>();
	container.register([&module]).unwrap();

	// Act
	let error = container.get::<A>().unwrap_err();

	// Assert
	let (path, origin) = cycle_of(error);
	assert_eq!(path, vec![Signature::of::<A>(), Signature::of::<B>(), Signature::of::<A>()]);
	assert_eq!(origin, CycleOrigin::Planner);
}

#[rstest]
fn traced_cycle_is_rejected_by_planner(container: Container) {
	// Arrange
	let module = mutual_singletons();
	container.register([&module]).unwrap();

	// Act
	let error = container.get::<A>().unwrap_err();

	// Assert
	let (path, origin) = cycle_of(error);
	assert_eq!(path, vec![Signature::of::<A>(), Signature::of::<B>(), Signature::of::<A>()]);
	assert_eq!(origin, CycleOrigin::Planner);
}

#[rstest]
fn untraced_cycle_is_caught_by_resolution_stack(untraced_container: Container) {
	// Arrange
	let module = mutual_singletons();
	untraced_container.register([&module]).unwrap();

	// Act
	let first = untraced_container.get::<A>().unwrap_err();
	let second = untraced_container.get::<A>().unwrap_err();

	// Assert
	let (path, origin) = cycle_of(first);
	assert_eq!(path, vec![Signature::of::<A>(), Signature::of::<B>(), Signature::of::<A>()]);
	assert_eq!(origin, CycleOrigin::Resolver);
	assert!(second.is_cycle());
}

#[rstest]
fn stale_plan_is_rebuilt_after_registration(container: Container) {
	// Arrange
	let mut first = Module::new("first");
	first.singleton(|inj| Ok(A(inj.get()?))).depends_on::<B>();
	container.register([&first]).unwrap();
	let before = container.get::<A>().unwrap_err();
	let mut second = Module::new("second");
	second.singleton(|inj| Ok(B(inj.get()?))).depends_on::<A>();

	// Act
	container.register([&second]).unwrap();
	let after = container.get::<A>().unwrap_err();

	// Assert
	assert!(before.is_missing_binding());
	assert!(after.is_cycle());
}

#[rstest]
fn validate_reports_cycles_across_the_registry(container: Container) {
	// Arrange
	let mut healthy = Module::new("healthy");
	healthy.singleton(|_| Ok(C)).no_dependencies();
	container.register([&healthy]).unwrap();
	let clean = container.validate();
	let module = mutual_singletons();
	container.register([&module]).unwrap();

	// Act
	let result = container.validate();

	// Assert
	assert!(clean.is_ok());
	assert!(result.unwrap_err().is_cycle());
}

#[rstest]
fn depth_limit_stops_long_chains() {
	// Arrange
	#[derive(Debug)]
	struct Link<const N: usize>;
	let container = Container::with_settings(ContainerSettings::default().with_max_resolution_depth(2));
	let mut module = Module::new("chain");
	module
		.factory(|inj| {
			inj.get::<Link<1>>()?;
			Ok(Link::<0>)
		})
		.depends_on::<Link<1>>();
	module
		.factory(|inj| {
			inj.get::<Link<2>>()?;
			Ok(Link::<1>)
		})
		.depends_on::<Link<2>>();
	module.factory(|_| Ok(Link::<2>)).no_dependencies();
	container.register([&module]).unwrap();

	// Act
	let error = container.get::<Link<0>>().unwrap_err();

	// Assert
	assert!(matches!(error, DiError::MaxDepthExceeded(3)));
}
