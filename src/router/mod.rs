//! # Router Module
//!
//! Maps request paths to controllers. Routes are plain strings built at
//! startup from each application's registrations:
//!
//! - exact paths: `/hello`, `/shop/cart`
//! - namespaced wildcards: `/shop/items/*` matches `/shop/items/42`
//! - catch-alls: `/*` for the root application, `/shop/*` for `shop`
//!
//! Exact routes always win over namespaced wildcards, which always win over
//! the catch-all, whatever order controllers were registered in.

mod core;

pub use core::{RouteEntry, RouteTable};
