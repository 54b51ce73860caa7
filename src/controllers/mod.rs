pub mod cmdb;
pub mod deployment;
pub mod gateway;
