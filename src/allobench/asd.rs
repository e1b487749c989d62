use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::bio::residue::parse_allosteric_site_residues;
use crate::errors::{CurationError, Result};
use crate::record::{IdStatus, ProteinRecord};

// A parsed XML element: its text and child elements, in document order.
#[derive(Debug, Clone, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    // trimmed text of a child element, None if missing or blank
    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|child| child.text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| text.to_owned())
    }
}

fn set_root(root: &mut Option<XmlNode>, node: XmlNode) -> std::result::Result<(), String> {
    if let Some(first) = root {
        return Err(format!("element <{}> follows the root element <{}>", node.name, first.name));
    }
    *root = Some(node);
    Ok(())
}

fn parse_xml_tree(xml: &str) -> std::result::Result<XmlNode, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = vec![];
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push(XmlNode {
                    name,
                    ..XmlNode::default()
                });
            },
            Ok(Event::Empty(empty)) => {
                let node = XmlNode {
                    name: String::from_utf8_lossy(empty.name().as_ref()).into_owned(),
                    ..XmlNode::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => set_root(&mut root, node)?,
                }
            },
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|err| err.to_string())?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            },
            Ok(Event::CData(cdata)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            },
            Ok(Event::End(_)) => {
                let Some(node) = stack.pop() else {
                    return Err("unbalanced end tag".to_owned());
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => set_root(&mut root, node)?,
                }
            },
            Ok(Event::Eof) => break,
            Ok(_) => (),
            Err(err) => {
                return Err(format!("error at position {}: {}", reader.buffer_position(), err));
            },
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
    }

    root.ok_or_else(|| "no root element".to_owned())
}

fn upper_id(id: Option<String>) -> Option<String> {
    id.map(|id| id.to_uppercase())
}

fn site_record(template: &ProteinRecord, site: &XmlNode, source_name: &str) -> ProteinRecord {
    let mut record = template.clone();

    record.uniprot_id = upper_id(site.child_text("PDB_UniProt_ID")).map(Into::into);
    record.pdb_id = upper_id(site.child_text("Allosteric_PDB")).map(Into::into);
    record.modulator_asd_id = site.child_text("Modulator_ASD_ID");
    record.modulator_alias = site.child_text("Modulator_Alias");
    record.modulator_chain = site.child_text("Modulator_Chain");
    record.modulator_class = site.child_text("Modulator_Class");
    record.allosteric_activity = site.child_text("Modulator_Feature");
    record.modulator_name = site.child_text("Modulator_Name");
    record.modulator_residue = site.child_text("Modulator_Residue");
    record.asd_function = site.child_text("Function");
    record.position = site.child_text("Position");
    record.pubmed_id = site.child_text("PubMed_ID");
    record.reference_title = site.child_text("PubMed_Title");
    record.site_overlap = site.child_text("Site_Overlap");

    if let Some(residues_text) = site.child_text("Allosteric_Site_Residue") {
        let (residues, bad_tokens) = parse_allosteric_site_residues(&residues_text);
        for bad_token in bad_tokens {
            warn!("{}: {}: skipping unparseable allosteric residue \"{}\"",
                  source_name, record.asd_id, bad_token);
        }
        record.allosteric_residues = residues;
    }

    record.uniprot_status =
        if record.uniprot_id.is_some() { IdStatus::Unchecked } else { IdStatus::Missing };
    record.pdb_status =
        if record.pdb_id.is_some() { IdStatus::Unchecked } else { IdStatus::Missing };

    record
}

// Parse one ASD "Organism_Record" document.  There is one record per
// allosteric site; an entry without sites gives a single record with the
// site fields empty.
pub fn parse_asd_xml(xml: &str, source_name: &str) -> Result<Vec<ProteinRecord>> {
    // ASD files contain this character reference, which isn't legal XML
    let xml = xml.replace("&#x2;", "");

    let root = parse_xml_tree(&xml).map_err(|reason| CurationError::parse(source_name, reason))?;

    if root.name != "Organism_Record" {
        return Err(CurationError::parse(source_name,
                                        format!("unexpected root element <{}>", root.name)));
    }

    let asd_id = root.child_text("Organism_ID")
        .ok_or_else(|| CurationError::parse(source_name, "no Organism_ID"))?;

    let mut template = ProteinRecord::new(asd_id.into());
    template.gene = root.child("Gene").and_then(|gene| gene.child_text("Gene_Name"));
    template.organism = root.child_text("Organism");
    template.protein_class = root.child_text("Molecule_Class");

    if let Some(enzyme_list) = root.child("Enzyme_Nomenclature_List") {
        template.ec_numbers = enzyme_list.children_named("Enzyme_Nomenclature")
            .filter_map(|enzyme| enzyme.child_text("Enzyme_DB_ID"))
            .collect();
    }

    template.uniprot_status = IdStatus::Missing;
    template.pdb_status = IdStatus::Missing;

    let sites: Vec<&XmlNode> =
        root.child("Allosteric_Site_List")
        .map(|site_list| {
            site_list.children_named("Allosteric_Site")
                .filter(|site| !site.children.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if sites.is_empty() {
        debug!("{}: {} has no allosteric sites", source_name, template.asd_id);
        return Ok(vec![template]);
    }

    Ok(sites.into_iter()
       .map(|site| site_record(&template, site, source_name))
       .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub entries_read: usize,
    pub entries_skipped: usize,
}

fn parse_entry(bytes: Vec<u8>, source_name: &str, records: &mut Vec<ProteinRecord>,
               summary: &mut LoadSummary) {
    summary.entries_read += 1;

    let result = String::from_utf8(bytes)
        .map_err(|err| CurationError::parse(source_name, err))
        .and_then(|xml| parse_asd_xml(&xml, source_name));

    match result {
        Ok(entry_records) => records.extend(entry_records),
        Err(err) => {
            warn!("skipping ASD entry: {}", err);
            summary.entries_skipped += 1;
        },
    }
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .map(|extension| extension.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

fn is_gzipped_tar(path: &Path) -> bool {
    let name = path.file_name().map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn load_tar_gz(path: &Path, records: &mut Vec<ProteinRecord>,
               summary: &mut LoadSummary) -> Result<()> {
    let file = File::open(path).map_err(|err| CurationError::io(path, err))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let entries = archive.entries().map_err(|err| CurationError::io(path, err))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| CurationError::io(path, err))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_name = entry.path()
            .map(|entry_path| entry_path.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unnamed archive member".to_owned());

        let mut bytes = vec![];
        entry.read_to_end(&mut bytes).map_err(|err| CurationError::io(path, err))?;

        parse_entry(bytes, &entry_name, records, summary);
    }

    Ok(())
}

fn load_directory(path: &Path, records: &mut Vec<ProteinRecord>,
                  summary: &mut LoadSummary) -> Result<()> {
    let mut xml_paths = vec![];

    for dir_entry in fs::read_dir(path).map_err(|err| CurationError::io(path, err))? {
        let dir_entry = dir_entry.map_err(|err| CurationError::io(path, err))?;
        let entry_path = dir_entry.path();
        if entry_path.is_file() && is_xml_file(&entry_path) {
            xml_paths.push(entry_path);
        }
    }

    xml_paths.sort();

    for xml_path in xml_paths {
        let bytes = fs::read(&xml_path).map_err(|err| CurationError::io(&xml_path, err))?;
        parse_entry(bytes, &xml_path.display().to_string(), records, summary);
    }

    Ok(())
}

// Read every entry of the ASD release: a .tar.gz archive, a directory of
// XML files or a single XML file.
pub fn load_asd(path: &Path) -> Result<(Vec<ProteinRecord>, LoadSummary)> {
    if !path.exists() {
        return Err(CurationError::Fatal(format!("ASD archive {} not found - download it from \
                                                 the ASD website first", path.display())));
    }

    let mut records = vec![];
    let mut summary = LoadSummary::default();

    if path.is_dir() {
        load_directory(path, &mut records, &mut summary)?;
    } else if is_gzipped_tar(path) {
        load_tar_gz(path, &mut records, &mut summary)?;
    } else {
        let bytes = fs::read(path).map_err(|err| CurationError::io(path, err))?;
        parse_entry(bytes, &path.display().to_string(), &mut records, &mut summary);
    }

    info!("read {} ASD entries ({} skipped) giving {} records",
          summary.entries_read, summary.entries_skipped, records.len());

    Ok((records, summary))
}

#[test]
fn test_parse_xml_tree() {
    let tree = parse_xml_tree("<a><b>x &amp; y</b><c/><b>z</b></a>").unwrap();
    assert_eq!(tree.name, "a");
    assert_eq!(tree.children.len(), 3);
    assert_eq!(tree.child_text("b").unwrap(), "x & y");
    assert_eq!(tree.children_named("b").count(), 2);
    assert!(tree.child_text("c").is_none());

    assert!(parse_xml_tree("<a><b></a>").is_err());
    assert!(parse_xml_tree("").is_err());

    let err = parse_xml_tree("<a><b>x</b></a><a/>").unwrap_err();
    assert_eq!(err, "element <a> follows the root element <a>");
    assert!(parse_xml_tree("<a></a><z>y</z>").is_err());
}
