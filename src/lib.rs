//! # addon-gallery
//!
//! Catalog back-end for the Seeq add-on gallery.
//!
//! Lists add-ons from GitHub (or a TOML file), scrapes display images from
//! readmes, and enriches each listing with an AI-written summary through a
//! paced, one-at-a-time background queue.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod llm;
pub mod model;
pub mod provider;
pub mod telemetry;
