pub mod cmdb;
pub mod quota;
pub mod request;
