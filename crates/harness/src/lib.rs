//! Propcheck verification harness
//!
//! A Rust-controlled E2E harness for the property portal UI that:
//! - Attaches to (or spawns) the web application under test
//! - Controls Playwright via generated Node scripts
//! - Parses declarative YAML scenarios
//! - Verifies screenshot artifacts, optionally against visual baselines
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runner (Rust)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner                                                     │
//! │    ├── TargetHandle::acquire()   (spawn or attach + health) │
//! │    ├── PlaywrightDriver::run()   (one session per scenario) │
//! │    ├── ArtifactStore::verify()   (screenshot evidence)      │
//! │    └── ArtifactStore::compare()  (visual baselines)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags, viewport                    │
//! │    └── steps: navigate | fill | check | click | wait        │
//! │              | wait_url | assert | sleep | screenshot       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod browser;
pub mod error;
pub mod runner;
pub mod scenario;
pub mod target;

pub use error::{HarnessError, HarnessResult};
pub use runner::Runner;
pub use scenario::{Scenario, Step};
