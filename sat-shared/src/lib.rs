pub mod broker;
pub mod entities;
pub mod pxe;
pub mod repos;
pub mod task;
