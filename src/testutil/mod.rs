//! Test-only support code. Not part of the public API; compiled only under
//! `#[cfg(test)]`.

pub(crate) mod mock;
