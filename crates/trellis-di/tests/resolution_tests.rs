//! Resolution semantics: identity, qualifiers, aliases and deferred handles

use rstest::rstest;
use std::sync::Arc;
use trellis_di::{Container, DiError, MissingReason, Module, Signature};
use trellis_test::{ConstructionCounter, container, counter};

#[derive(Debug)]
struct A;

#[derive(Debug)]
struct B {
	a: Arc<A>,
}

#[derive(Debug, PartialEq)]
struct Endpoint(&'static str);

trait Speaker: Send + Sync {
	fn speak(&self) -> &'static str;
}

struct Dog;

impl Speaker for Dog {
	fn speak(&self) -> &'static str {
		"woof"
	}
}

fn same_object<T: ?Sized, U: ?Sized>(left: &Arc<T>, right: &Arc<U>) -> bool {
	Arc::as_ptr(left) as *const () == Arc::as_ptr(right) as *const ()
}

#[rstest]
fn singleton_returns_the_same_instance(container: Container) {
	// Arrange
	let mut module = Module::new("app");
	module.singleton(|_| Ok(A));
	container.register([&module]).unwrap();

	// Act
	let first = container.get::<A>().unwrap();
	let second = container.get::<A>().unwrap();

	// Assert
	assert!(Arc::ptr_eq(&first, &second));
}

#[rstest]
fn factory_returns_distinct_instances(container: Container, counter: ConstructionCounter) {
	// Arrange
	let mut module = Module::new("app");
	let hits = counter.clone();
	module
		.factory(move |_| {
			hits.hit();
			Ok(Endpoint("same"))
		})
		.no_dependencies();
	container.register([&module]).unwrap();

	// Act
	let first = container.get::<Endpoint>().unwrap();
	let second = container.get::<Endpoint>().unwrap();

	// Assert
	assert!(!Arc::ptr_eq(&first, &second));
	assert_eq!(first, second);
	assert_eq!(counter.count(), 2);
}

#[rstest]
fn factory_shares_singleton_dependency(container: Container) {
	// Arrange
	let mut module = Module::new("app");
	module.singleton(|_| Ok(A));
	module.factory(|inj| Ok(B { a: inj.get()? }));
	container.register([&module]).unwrap();

	// Act
	let first = container.get::<B>().unwrap();
	let second = container.get::<B>().unwrap();

	// Assert
	assert!(!Arc::ptr_eq(&first, &second));
	assert!(Arc::ptr_eq(&first.a, &second.a));
	assert!(Arc::ptr_eq(&first.a, &container.get::<A>().unwrap()));
}

#[rstest]
fn qualified_bindings_never_cross_resolve(container: Container) {
	// Arrange
	let mut module = Module::new("endpoints");
	module.singleton(|_| Ok(Endpoint("primary"))).named("a");
	module.singleton(|_| Ok(Endpoint("replica"))).named("b");
	container.register([&module]).unwrap();

	// Act
	let a = container.get_named::<Endpoint>("a").unwrap();
	let b = container.get_named::<Endpoint>("b").unwrap();

	// Assert
	assert!(!Arc::ptr_eq(&a, &b));
	assert_eq!(*a, Endpoint("primary"));
	assert_eq!(*b, Endpoint("replica"));
}

#[rstest]
fn unknown_type_is_reported(container: Container) {
	// Act
	let error = container.get::<A>().unwrap_err();

	// Assert
	match error {
		DiError::MissingBinding { signature, reason } => {
			assert_eq!(signature, Signature::of::<A>());
			assert_eq!(reason, MissingReason::UnknownType);
		}
		other => panic!("Expected MissingBinding, got {:?}", other),
	}
}

#[rstest]
fn unknown_qualifier_lists_alternatives(container: Container) {
	// Arrange
	let mut module = Module::new("endpoints");
	module.instance(Endpoint("default"));
	module.instance(Endpoint("replica")).named("replica");
	container.register([&module]).unwrap();

	// Act
	let error = container.get_named::<Endpoint>("primary").unwrap_err();

	// Assert
	match error {
		DiError::MissingBinding {
			reason: MissingReason::UnknownQualifier { available },
			..
		} => assert_eq!(available, vec![None, Some("replica".to_string())]),
		other => panic!("Expected UnknownQualifier, got {:?}", other),
	}
}

#[rstest]
fn aliases_share_the_canonical_slot(container: Container, counter: ConstructionCounter) {
	// Arrange
	let mut module = Module::new("animals");
	let hits = counter.clone();
	module
		.singleton(move |_| {
			hits.hit();
			Ok(Dog)
		})
		.no_dependencies()
		.bind::<dyn Speaker>(|dog| dog)
		.also_named("good-boy");
	container.register([&module]).unwrap();

	// Act
	let speaker = container.get::<dyn Speaker>().unwrap();
	let dog = container.get::<Dog>().unwrap();
	let named = container.get_named::<Dog>("good-boy").unwrap();

	// Assert
	assert_eq!(speaker.speak(), "woof");
	assert!(same_object(&speaker, &dog));
	assert!(Arc::ptr_eq(&dog, &named));
	assert_eq!(counter.count(), 1);
}

#[rstest]
fn closure_errors_carry_the_failing_signature(container: Container) {
	// Arrange
	let mut module = Module::new("app");
	module
		.singleton(|_| -> trellis_di::DiResult<A> { Err(DiError::custom("disk full")) })
		.no_dependencies();
	module.factory(|inj| Ok(B { a: inj.get()? })).depends_on::<A>();
	container.register([&module]).unwrap();

	// Act
	let error = container.get::<B>().unwrap_err();

	// Assert
	match error {
		DiError::Construction { signature, source } => {
			assert_eq!(signature, Signature::of::<A>());
			assert_eq!(source.to_string(), "disk full");
		}
		other => panic!("Expected Construction, got {:?}", other),
	}
}

#[rstest]
fn missing_dependency_surfaces_at_resolution(container: Container) {
	// Arrange
	let mut module = Module::new("app");
	module.factory(|inj| Ok(B { a: inj.get()? })).depends_on::<A>();
	container.register([&module]).unwrap();

	// Act
	let plan = container.plan(&Signature::of::<B>());
	let error = container.get::<B>().unwrap_err();

	// Assert
	assert!(plan.is_ok());
	match error {
		DiError::MissingBinding { signature, .. } => assert_eq!(signature, Signature::of::<A>()),
		other => panic!("Expected MissingBinding, got {:?}", other),
	}
}

#[rstest]
fn optional_dependency_with_try_get(container: Container) {
	// Arrange
	struct Report {
		endpoint: Option<Arc<Endpoint>>,
	}
	let mut module = Module::new("app");
	module.factory(|inj| {
		Ok(Report {
			endpoint: inj.try_get::<Endpoint>()?,
		})
	});
	container.register([&module]).unwrap();

	// Act
	let report = container.get::<Report>().unwrap();

	// Assert
	assert!(report.endpoint.is_none());
}

#[rstest]
fn lazy_handle_defers_failure_until_observed(container: Container) {
	// Arrange
	let handle = container.lazy_of::<A>(None, None);
	let mut module = Module::new("late");
	module.singleton(|_| Ok(A));

	// Act
	let before = handle.get();
	container.register([&module]).unwrap();
	let after = handle.get();

	// Assert
	assert!(before.unwrap_err().is_missing_binding());
	let value = after.unwrap();
	assert!(handle.is_resolved());
	assert!(Arc::ptr_eq(&value, &container.get::<A>().unwrap()));
	assert!(Arc::ptr_eq(&value, &handle.get().unwrap()));
}

#[rstest]
fn lazy_handle_resolves_factory_once(container: Container, counter: ConstructionCounter) {
	// Arrange
	let mut module = Module::new("app");
	let hits = counter.clone();
	module
		.factory(move |_| {
			hits.hit();
			Ok(Endpoint("lazy"))
		})
		.no_dependencies();
	container.register([&module]).unwrap();
	let handle = container.lazy_of::<Endpoint>(None, None);

	// Act
	let first = handle.get().unwrap();
	let second = handle.get().unwrap();

	// Assert
	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(counter.count(), 1);
}

#[rstest]
fn warm_up_builds_cached_nodes_dependencies_first(container: Container, counter: ConstructionCounter) {
	// Arrange
	let mut module = Module::new("app");
	let hits = counter.clone();
	module
		.singleton(move |_| {
			hits.hit();
			Ok(A)
		})
		.no_dependencies();
	module.factory(|inj| Ok(B { a: inj.get()? })).depends_on::<A>();
	container.register([&module]).unwrap();

	// Act
	let plan = container.warm_up(&Signature::of::<B>(), None).unwrap();

	// Assert
	let order: Vec<Signature> = plan.order().cloned().collect();
	assert_eq!(order, vec![Signature::of::<A>(), Signature::of::<B>()]);
	assert_eq!(counter.count(), 1);
	container.get::<B>().unwrap();
	assert_eq!(counter.count(), 1);
}

#[rstest]
fn end_to_end_factory_over_singleton() {
	// Arrange
	let container = Container::new();
	let mut module = Module::new("e2e");
	module.singleton(|_| Ok(A));
	module.factory(|inj| Ok(B { a: inj.get()? }));
	container.register([&module]).unwrap();

	// Act
	let b1 = container.get::<B>().unwrap();
	let b2 = container.get::<B>().unwrap();

	// Assert
	assert!(!Arc::ptr_eq(&b1, &b2));
	assert!(Arc::ptr_eq(&b1.a, &b2.a));
}
