pub mod principal;
pub mod request;
