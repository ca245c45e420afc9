//! Progress check tests.

mod monitor_test;
