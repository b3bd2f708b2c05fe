pub mod bullet;
pub mod document;
pub mod remote;
