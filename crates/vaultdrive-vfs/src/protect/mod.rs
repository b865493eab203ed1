//! Folder structure protection
//!
//! [`acl`] applies/removes deny entries so non-adapter processes cannot
//! mutate a managed tree; [`tracker`] reference-counts temporary unprotect
//! leases so concurrent operations on the same folder never race to
//! re-protect it.

pub mod acl;
pub mod tracker;
