pub mod phenopacket;

pub use phenopacket::*;
