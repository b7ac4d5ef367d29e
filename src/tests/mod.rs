//! Binary-side test suites.

mod scenario_tests;
