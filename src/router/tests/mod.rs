//! Unit tests for the message router.
