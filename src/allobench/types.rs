use flexstr::SharedStr as FlexStr;

pub type AsdId = FlexStr;
pub type PdbId = FlexStr;
pub type UniProtAcc = FlexStr;
pub type ChainId = FlexStr;

pub type ResidueName = FlexStr;
pub type ResidueNumber = i32;

// 1-based position in a UniProt canonical sequence
pub type SeqPosition = u32;

pub type ReferenceSetName = FlexStr;
