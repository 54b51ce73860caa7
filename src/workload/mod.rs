pub mod builder;
pub mod defaults;
pub mod naming;
pub mod quota;
pub mod service;
pub mod sysctl;
