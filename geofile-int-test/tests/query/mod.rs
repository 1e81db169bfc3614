//! Query contract tests: pagination, ordering, memory bound and concurrency.

mod concurrency_test;
mod memory_test;
