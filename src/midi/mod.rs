pub mod codec;
pub mod controller;
pub mod model;
