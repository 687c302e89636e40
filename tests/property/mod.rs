//! Property-based tests for the load-option algebra and registry staging
