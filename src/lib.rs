pub mod constants;
pub mod geonet_errors;
pub mod groups;
pub mod jacobian;
pub mod network;
pub mod observations;
pub mod parameters;
pub mod point;
pub mod reduction;
