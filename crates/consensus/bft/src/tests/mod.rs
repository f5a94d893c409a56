//! Engine test suite.
//!
//! Scenario tests drive the engine through the mock chain the way the
//! node's consensus loop would: build a signed header, process it,
//! apply the best/committed outcome back to the chain, insert.

mod helpers;
