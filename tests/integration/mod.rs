//! Integration tests for the Stadtwache harness
//! These drive both suites against local stand-ins for the backend

// Shared servers
pub mod socketio_server;

// Suites
pub mod backend_suite_test;
pub mod realtime_suite_test;
