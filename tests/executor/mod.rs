//! Executor tests.

mod local_test;
