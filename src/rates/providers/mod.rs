pub mod dolar_api;
pub mod json_endpoint;
pub mod pydolar;

pub use dolar_api::DolarApiSource;
pub use json_endpoint::JsonEndpointSource;
pub use pydolar::PyDolarSource;
