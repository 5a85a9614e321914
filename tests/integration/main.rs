//! HTTP-level integration tests against the in-memory session store.

mod helpers;

mod bottle_test;
mod captive_test;
mod dev_test;
mod rating_test;
mod session_test;
