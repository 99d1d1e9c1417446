pub mod access;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod filter;
pub mod mutation;
pub mod notification;
pub mod pagination;
pub mod pending;
pub mod selection;
pub mod session;
pub mod sort;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;
