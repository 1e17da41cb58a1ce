#![deny(unsafe_code)]

pub mod analysis;
pub mod intel;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_server;
