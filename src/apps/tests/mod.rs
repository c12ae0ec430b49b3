//! Unit tests for instance tracking and launching.

mod launcher_tests;
