use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use flexstr::{SharedStr as FlexStr, ToSharedStr};
use regex::Regex;

use crate::types::{ChainId, ResidueName, ResidueNumber};

// A residue in PDB author numbering, written like "A-HIS-25" or, with an
// insertion code, "A-HIS-25B".
// Field order gives the sort order: chain, number, insertion code, name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Residue {
    pub chain: ChainId,
    pub number: ResidueNumber,
    pub insertion_code: Option<char>,
    pub name: ResidueName,
}

pub type ResidueSet = BTreeSet<Residue>;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"^(-?\d+)([A-Za-z])?$").unwrap();
    static ref ASD_RESIDUE_RE: Regex = Regex::new(r"^([A-Za-z]{3})(-?\d+[A-Za-z]?)$").unwrap();
}

impl Residue {
    pub fn new(chain: &str, name: &str, number: ResidueNumber) -> Residue {
        Residue {
            chain: chain.to_shared_str(),
            number,
            insertion_code: None,
            name: name.to_uppercase().into(),
        }
    }

    // true if both refer to the same position, ignoring the residue name
    pub fn same_position(&self, other: &Residue) -> bool {
        self.chain == other.chain && self.number == other.number &&
            self.insertion_code == other.insertion_code
    }
}

fn parse_number(number_str: &str) -> Option<(ResidueNumber, Option<char>)> {
    let captures = NUMBER_RE.captures(number_str)?;
    let number = captures.get(1)?.as_str().parse().ok()?;
    let insertion_code =
        captures.get(2).and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase());
    Some((number, insertion_code))
}

impl fmt::Display for Residue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}-{}", self.chain, self.name, self.number)?;
        if let Some(insertion_code) = self.insertion_code {
            write!(f, "{}", insertion_code)?;
        }
        Ok(())
    }
}

impl FromStr for Residue {
    type Err = String;

    fn from_str(s: &str) -> Result<Residue, String> {
        let mut parts = s.trim().splitn(3, '-');
        let chain = parts.next().filter(|c| !c.is_empty());
        let name = parts.next().filter(|n| !n.is_empty());
        let number = parts.next();

        match (chain, name, number) {
            (Some(chain), Some(name), Some(number)) => {
                let (number, insertion_code) = parse_number(number)
                    .ok_or_else(|| format!("bad residue number in {}", s))?;
                Ok(Residue {
                    chain: chain.into(),
                    number,
                    insertion_code,
                    name: name.into(),
                })
            },
            _ => Err(format!("can't parse residue from \"{}\"", s)),
        }
    }
}

// Parse the ASD "Allosteric_Site_Residue" text:
//   "Chain A:HIS25,TYR258; Chain B:VAL325"
// Tokens that can't be parsed are returned separately so the caller can
// log them.
pub fn parse_allosteric_site_residues(text: &str) -> (ResidueSet, Vec<String>) {
    let mut residues = BTreeSet::new();
    let mut bad_tokens = vec![];

    for chain_part in text.split(';') {
        let chain_part = chain_part.trim();
        if chain_part.is_empty() {
            continue;
        }

        let Some((chain_name, residues_str)) = chain_part.split_once(':') else {
            bad_tokens.push(chain_part.to_owned());
            continue;
        };

        let chain_name = chain_name.trim();
        let chain_id = chain_name.strip_prefix("Chain").unwrap_or(chain_name).trim();

        if chain_id.is_empty() {
            bad_tokens.push(chain_part.to_owned());
            continue;
        }

        for token in residues_str.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let parsed = ASD_RESIDUE_RE.captures(token)
                .and_then(|captures| {
                    let (number, insertion_code) = parse_number(captures.get(2)?.as_str())?;
                    Some(Residue {
                        chain: chain_id.into(),
                        number,
                        insertion_code,
                        name: captures.get(1)?.as_str().to_uppercase().into(),
                    })
                });

            match parsed {
                Some(residue) => {
                    residues.insert(residue);
                },
                None => bad_tokens.push(format!("{}:{}", chain_id, token)),
            }
        }
    }

    (residues, bad_tokens)
}

const AMINO_ACIDS: [(char, &str); 22] = [
    ('A', "ALA"), ('R', "ARG"), ('N', "ASN"), ('D', "ASP"), ('C', "CYS"),
    ('Q', "GLN"), ('E', "GLU"), ('G', "GLY"), ('H', "HIS"), ('I', "ILE"),
    ('L', "LEU"), ('K', "LYS"), ('M', "MET"), ('F', "PHE"), ('P', "PRO"),
    ('S', "SER"), ('T', "THR"), ('W', "TRP"), ('Y', "TYR"), ('V', "VAL"),
    ('U', "SEC"), ('O', "PYL"),
];

pub fn three_letter_code(one_letter: char) -> Option<FlexStr> {
    let one_letter = one_letter.to_ascii_uppercase();
    AMINO_ACIDS.iter()
        .find(|(code, _)| *code == one_letter)
        .map(|(_, name)| FlexStr::from(*name))
}

// residue name at a 1-based position of a one-letter sequence
pub fn residue_name_at(sequence: &str, position: u32) -> Option<FlexStr> {
    if position == 0 {
        return None;
    }
    let c = sequence.chars().nth(position as usize - 1)?;
    three_letter_code(c)
}

#[test]
fn test_parse_allosteric_site_residues() {
    let (residues, bad) =
        parse_allosteric_site_residues("Chain A:HIS25,TYR258; Chain B:VAL325");
    let strings: Vec<_> = residues.iter().map(|r| r.to_string()).collect();
    assert_eq!(strings, vec!["A-HIS-25", "A-TYR-258", "B-VAL-325"]);
    assert!(bad.is_empty());

    let (residues, bad) =
        parse_allosteric_site_residues("Chain A:HIS25,??; Chain C:Lys-3,GLY100A");
    let strings: Vec<_> = residues.iter().map(|r| r.to_string()).collect();
    assert_eq!(strings, vec!["A-HIS-25", "C-LYS--3", "C-GLY-100A"]);
    assert_eq!(bad, vec!["A:??"]);

    let (residues, bad) = parse_allosteric_site_residues("");
    assert!(residues.is_empty());
    assert!(bad.is_empty());
}

#[test]
fn test_residue_from_str() {
    let residue: Residue = "A-HIS-25".parse().unwrap();
    assert_eq!(residue, Residue::new("A", "HIS", 25));

    let residue: Residue = "B-LYS--3".parse().unwrap();
    assert_eq!(residue.number, -3);

    let residue: Residue = "C-GLY-100A".parse().unwrap();
    assert_eq!(residue.insertion_code, Some('A'));
    assert_eq!(residue.to_string(), "C-GLY-100A");

    assert!("A-HIS".parse::<Residue>().is_err());
    assert!("A-HIS-x1".parse::<Residue>().is_err());
}

#[test]
fn test_residue_order() {
    let mut residues = BTreeSet::new();
    residues.insert(Residue::new("B", "ALA", 1));
    residues.insert(Residue::new("A", "TYR", 258));
    residues.insert(Residue::new("A", "HIS", 25));
    let strings: Vec<_> = residues.iter().map(|r| r.to_string()).collect();
    assert_eq!(strings, vec!["A-HIS-25", "A-TYR-258", "B-ALA-1"]);
}

#[test]
fn test_residue_name_at() {
    assert_eq!(residue_name_at("MKH", 3).unwrap().as_str(), "HIS");
    assert!(residue_name_at("MKH", 0).is_none());
    assert!(residue_name_at("MKH", 4).is_none());
    assert!(residue_name_at("MXH", 2).is_none());
}
