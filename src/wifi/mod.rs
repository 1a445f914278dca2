pub mod qr;

pub use qr::*;
