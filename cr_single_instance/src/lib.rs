// single-instance implementation of the client registry port

pub mod registry;

pub use registry::CrSingleInstance;
