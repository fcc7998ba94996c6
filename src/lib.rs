//! Waveform and annotation fetch service for physiologic signal databases.
//!
//! A request names a record, a time window, some channels and some
//! annotators; the reply carries delta-encoded samples on a common tick
//! clock together with the annotations that fall inside the window.
pub mod config;
pub mod fetch;
pub mod request;
pub mod service;
pub mod store;
pub mod timefmt;
