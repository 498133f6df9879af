//! Integration tests for crawling and batch delivery
//!
//! These tests use wiremock to stand in for both the crawled sites and the
//! analyzer, and exercise the full crawl, archive and delivery cycle.

mod crawl_tests;
mod delivery_tests;
mod support;
