//! Fetcher tests: a scripted in-memory API and a loopback HTTP server

mod fake_api;
