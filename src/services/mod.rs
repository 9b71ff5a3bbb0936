//! Domain services: image storage backends, the relational catalog and the
//! asset lifecycle that ties them together.

pub mod assets;
pub mod catalog;
pub mod storage;
