//! # Tank Control Unit Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs   # controller behaviour through the bus
//!     └── adapters.rs    # dashboard and hardware paths into the controller
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tank-tests
//! cargo test -p tank-tests integration::scenarios::
//! ```

pub mod integration;
