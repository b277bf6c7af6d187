//! CLI command implementations

pub(crate) mod add;
pub(crate) mod add_descriptors;
pub(crate) mod bootstrap;
pub(crate) mod common;
pub(crate) mod create;
pub(crate) mod environments;
pub(crate) mod init;
pub(crate) mod status;
pub(crate) mod templates;
pub(crate) mod upgrade;
