//! Integration tests for Catalog-Harvest

mod harvest_tests;
