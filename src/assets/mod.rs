pub mod decode;
pub mod sources;
