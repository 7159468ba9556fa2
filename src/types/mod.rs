pub mod artifact;
pub mod forecast;
pub mod observation;
