//! Common test infrastructure
//!
//! This module provides the infrastructure needed for end-to-end tests:
//! a fake origin registry serving tarball bytes and fixture builders for
//! change records. Tests should only import from this module, not from
//! internal submodules.

mod fixtures;
mod origin;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use fixtures::{done_channel, module_update};
#[allow(unused_imports)]
pub use origin::TestOrigin;
