//! Test suites for the connection guard and the status service.

pub(crate) mod support;
