//! Engine-level integration tests on the in-memory store.

mod helpers;

mod cards_test;
mod claim_test;
mod lifecycle_test;
mod membership_test;
mod session_test;
