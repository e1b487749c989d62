pub mod residue;
pub mod structure;
pub mod sifts;
