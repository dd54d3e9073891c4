pub mod crc;
pub mod dhash;
pub mod logging;
pub mod rand;
