use std::collections::BTreeSet;
use std::io::BufReader;

use pdbtbx::{Format, ReadOptions, StrictnessLevel};

use crate::bio::residue::{Residue, ResidueSet};
use crate::types::ResidueNumber;

// Return the residues of the first model of an mmCIF file, in author
// numbering.  Text that isn't mmCIF, or has no atom_site residues, is an
// error.
pub fn read_cif_residues(cif_bytes: &[u8]) -> Result<ResidueSet, String> {
    // files from the archive often fail the stricter levels
    let (pdb, _warnings) = ReadOptions::default()
        .set_level(StrictnessLevel::Loose)
        .set_format(Format::Mmcif)
        .read_raw(BufReader::new(cif_bytes))
        .map_err(|errors| {
            match errors.first() {
                Some(err) => format!("not a readable mmCIF file: {}", err),
                None => "not a readable mmCIF file".to_owned(),
            }
        })?;

    let Some(first_model) = pdb.models().next() else {
        return Err("no models in mmCIF file".to_owned());
    };

    let mut residues = BTreeSet::new();

    for chain in first_model.chains() {
        for residue in chain.residues() {
            let Some(name) = residue.name() else {
                continue;
            };
            let Ok(number) = ResidueNumber::try_from(residue.serial_number()) else {
                continue;
            };

            residues.insert(Residue {
                chain: chain.id().into(),
                number,
                insertion_code: residue.insertion_code().and_then(|code| code.chars().next()),
                name: name.to_uppercase().into(),
            });
        }
    }

    if residues.is_empty() {
        return Err("no atom_site residues in mmCIF file".to_owned());
    }

    Ok(residues)
}

// the residue in `structure` at the same position as `residue`, if any
pub fn find_at_position<'a>(structure: &'a ResidueSet, residue: &Residue)
    -> Option<&'a Residue>
{
    structure.iter().find(|candidate| candidate.same_position(residue))
}

// residues of `residues` not present with the same name in the structure
pub fn unmatched_residues(structure: &ResidueSet, residues: &ResidueSet) -> ResidueSet {
    residues.iter()
        .filter(|residue| !structure.contains(*residue))
        .cloned()
        .collect()
}

#[test]
fn test_read_cif_residues() {
    let cif = "data_1ABC
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_entity_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.pdbx_formal_charge
_atom_site.auth_seq_id
_atom_site.auth_comp_id
_atom_site.auth_asym_id
_atom_site.auth_atom_id
_atom_site.pdbx_PDB_model_num
ATOM   1 N N  . HIS A 1 1 ? 10.104 12.337 4.581 1.00 20.15 ? 25  HIS A N  1
ATOM   2 C CA . HIS A 1 1 ? 11.220 13.010 5.102 1.00 19.80 ? 25  HIS A CA 1
ATOM   3 C CA . GLY A 1 2 B 12.871 12.001 6.440 1.00 21.02 ? 26  GLY A CA 1
HETATM 4 P PA . ATP B 2 . ? 20.512 8.733 1.904 1.00 30.44 ? 301 ATP B PA 1
#
";
    let residues = read_cif_residues(cif.as_bytes()).unwrap();
    let strings: Vec<_> = residues.iter().map(|r| r.to_string()).collect();
    assert_eq!(strings, vec!["A-HIS-25", "A-GLY-26B", "B-ATP-301"]);
}

#[test]
fn test_read_cif_residues_rejects_other_text() {
    assert!(read_cif_residues(b"<html>Service Unavailable</html>").is_err());
    assert!(read_cif_residues(b"").is_err());
}

#[test]
fn test_unmatched_residues() {
    let structure: ResidueSet =
        [Residue::new("A", "HIS", 25), Residue::new("A", "TYR", 258)].into_iter().collect();
    let asd: ResidueSet =
        [Residue::new("A", "HIS", 25), Residue::new("A", "PHE", 258),
         Residue::new("B", "VAL", 325)].into_iter().collect();
    let unmatched: Vec<_> =
        unmatched_residues(&structure, &asd).iter().map(|r| r.to_string()).collect();
    assert_eq!(unmatched, vec!["A-PHE-258", "B-VAL-325"]);

    let found = find_at_position(&structure, &Residue::new("A", "UNK", 258)).unwrap();
    assert_eq!(found.name.as_str(), "TYR");
}
