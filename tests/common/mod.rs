//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Once;

use scriptwrap::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Set `RUST_LOG=scriptwrap=trace` to see wrap and destroy events.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

thread_local! {
    static DROPPED: Cell<usize> = const { Cell::new(0) };
}

pub fn reset_drops() {
    DROPPED.with(|dropped| dropped.set(0));
}

pub fn drops() -> usize {
    DROPPED.with(Cell::get)
}

fn count_drop() {
    DROPPED.with(|dropped| dropped.set(dropped.get() + 1));
}

#[repr(C)]
pub struct Animal {
    pub name: String,
}

impl Animal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn speak(&self) -> String {
        format!("{} makes a sound", self.name)
    }
}

impl Drop for Animal {
    fn drop(&mut self) {
        count_drop();
    }
}

impl NativeClass for Animal {
    const NAME: &'static str = "Animal";
}

#[repr(C)]
pub struct Dog {
    pub animal: Animal,
    pub tricks: i32,
}

impl Dog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            animal: Animal::new(name),
            tricks: 0,
        }
    }
}

impl NativeClass for Dog {
    const NAME: &'static str = "Dog";
}

inherits!(Dog => Animal, animal);

/// Declare `Animal` and `Dog` and publish both constructors as globals.
pub fn declare_animals(isolate: &mut Isolate) {
    let animal = ClassBuilder::<Animal>::new(isolate)
        .unwrap()
        .constructor(|name: String| Animal::new(name))
        .method("speak", Animal::speak)
        .member("name", field!(Animal, name))
        .js_function();
    isolate.set_global("Animal", Value::Object(animal)).unwrap();

    let dog = ClassBuilder::<Dog>::new(isolate)
        .unwrap()
        .inherit::<Animal>()
        .unwrap()
        .constructor(|name: String| Dog::new(name))
        .method_mut("learn", |dog: &mut Dog| {
            dog.tricks += 1;
            dog.tricks
        })
        .member_readonly("tricks", field!(Dog, tricks))
        .constant("LEGS", 4)
        .unwrap()
        .js_function();
    isolate.set_global("Dog", Value::Object(dog)).unwrap();
}

#[repr(C)]
pub struct A {
    pub a: u64,
}

#[repr(C)]
pub struct B {
    pub base: A,
    pub b: u64,
}

#[repr(C)]
pub struct C {
    pub base: B,
    pub c: u64,
}

impl NativeClass for A {
    const NAME: &'static str = "A";
}

impl NativeClass for B {
    const NAME: &'static str = "B";
}

impl NativeClass for C {
    const NAME: &'static str = "C";
}

inherits!(B => A, base);
inherits!(C => B, base);

/// Declare the `A <- B <- C` chain.
pub fn declare_chain(isolate: &mut Isolate) {
    ClassBuilder::<B>::new(isolate)
        .unwrap()
        .inherit::<A>()
        .unwrap();
    ClassBuilder::<C>::new(isolate)
        .unwrap()
        .inherit::<B>()
        .unwrap();
}

pub fn new_c() -> C {
    C {
        base: B {
            base: A { a: 1 },
            b: 2,
        },
        c: 3,
    }
}
