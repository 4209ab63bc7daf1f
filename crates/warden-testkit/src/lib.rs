//! # Warden Testkit
//!
//! Testing utilities for the Warden permission engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: engines on a manual clock, including the reference population
//! - **Query vectors**: fixed (principal, node, answer) batteries
//! - **Generators**: Proptest strategies for random group graphs
//!
//! ## Query Vectors
//!
//! ```rust
//! use warden_testkit::fixtures::TestFixture;
//! use warden_testkit::vectors::{mismatches, reference_vectors};
//!
//! let fixture = TestFixture::populated();
//! assert!(mismatches(&fixture.engine, &reference_vectors()).is_empty());
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::{build_engine, reference_answer, GraphParams};
//!
//! proptest! {
//!     #[test]
//!     fn engine_agrees_with_reference(params: GraphParams) {
//!         let engine = build_engine(&params);
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{principal, TestFixture, FIXTURE_EPOCH};
pub use generators::{build_engine, reference_answer, GraphParams, GeneratedGroup};
pub use vectors::{mismatches, reference_vectors, QueryVector};
