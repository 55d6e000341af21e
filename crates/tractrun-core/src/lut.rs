//! VEP parcellation lookup-table generation.
//!
//! Derives the lookup-table family the pipeline binaries consume from
//! three inputs: the FreeSurfer color LUT, the VEP region table and the
//! VEP atlas rules. Four files come out:
//!
//! - the FreeSurfer LUT with the new VEP labels appended,
//! - the MRtrix node LUT (contiguous node numbering for connectomes),
//! - the subcortical label list,
//! - the aparc color LUT (cortical regions only, hemisphere-agnostic).
//!
//! All inputs are validated before anything is written: duplicate colors
//! in the region table, cortical regions without a rule, subcortical
//! regions known to neither the rules nor FreeSurfer, and subcortical
//! rows not grouped at the end of the table are all hard errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Label offsets for VEP regions appended to the FreeSurfer LUT.
pub const SHIFT_LH: u32 = 71_000;
pub const SHIFT_RH: u32 = 72_000;

/// Hemisphere placeholder carried by every rule target.
pub const HEMI_WILDCARD: &str = "%H";

/// RGBA color of one labelled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// One row of a FreeSurfer-style color LUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub index: u32,
    pub name: String,
    pub color: Color,
}

/// FreeSurfer color LUT: the raw text (re-emitted verbatim) plus the
/// parsed rows.
#[derive(Debug, Clone)]
pub struct FsLut {
    raw: String,
    entries: Vec<FsEntry>,
}

impl FsLut {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Lut(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self {
            raw: content.to_string(),
            entries: parse_fs_entries(content)?,
        })
    }

    pub fn entries(&self) -> &[FsEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }
}

/// Region rewrite operations understood by the parcellation converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Merge,
    Rename,
    Split,
    SplitNl,
}

/// One atlas rule: `<op> <source> <target>`. Split targets carry a
/// comma-separated region list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub source: String,
    pub target: String,
}

pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Lut(format!("Failed to read {}: {e}", path.display())))?;
    parse_rules(&content)
}

pub fn parse_rules(content: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for line in data_lines(content) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(Error::Lut(format!("Malformed rule line: {line}")));
        }
        let kind = match tokens[0] {
            "merge" => RuleKind::Merge,
            "rename" => RuleKind::Rename,
            "split" => RuleKind::Split,
            "splitnl" => RuleKind::SplitNl,
            other => {
                return Err(Error::Lut(format!("Unknown rule operation '{other}'")));
            }
        };
        rules.push(Rule {
            kind,
            source: tokens[1].to_string(),
            target: tokens[2].to_string(),
        });
    }
    Ok(rules)
}

/// Region names introduced by the rules, temp placeholders (`%0`-`%9`)
/// dropped. Every surviving name must carry the hemisphere wildcard.
pub fn new_region_names(rules: &[Rule]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for rule in rules {
        match rule.kind {
            RuleKind::Merge | RuleKind::Rename => names.push(rule.target.clone()),
            RuleKind::Split | RuleKind::SplitNl => {
                names.extend(rule.target.split(',').map(str::to_string));
            }
        }
    }
    names.retain(|name| !is_temp_region(name));
    for name in &names {
        if !name.contains(HEMI_WILDCARD) {
            return Err(Error::Lut(format!(
                "Rule target '{name}' lacks the hemisphere wildcard"
            )));
        }
    }
    Ok(names)
}

fn is_temp_region(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 2 && bytes[0] == b'%' && bytes[1].is_ascii_digit()
}

/// One row of the VEP region table: `<iscort> <name> <r> <g> <b> <a>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub cortical: bool,
    pub name: String,
    pub color: Color,
}

pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Lut(format!("Failed to read {}: {e}", path.display())))?;
    parse_regions(&content)
}

pub fn parse_regions(content: &str) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    for line in data_lines(content) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 6 {
            return Err(Error::Lut(format!("Malformed region line: {line}")));
        }
        let cortical: i32 = parse_field(tokens[0], line)?;
        regions.push(Region {
            cortical: cortical != 0,
            name: tokens[1].to_string(),
            color: parse_color(&tokens[2..6], line)?,
        });
    }
    Ok(regions)
}

/// Regions sharing a color, as `(color, first name, second name)`.
pub fn duplicate_colors(regions: &[Region]) -> Vec<(Color, String, String)> {
    let mut seen: HashMap<Color, &str> = HashMap::new();
    let mut dups = Vec::new();
    for region in regions {
        match seen.get(&region.color) {
            Some(first) => dups.push((region.color, (*first).to_string(), region.name.clone())),
            None => {
                seen.insert(region.color, &region.name);
            }
        }
    }
    dups
}

/// Cross-check the region table against the rules and the FreeSurfer LUT.
pub fn validate(fs: &FsLut, regions: &[Region], new_regs: &[String]) -> Result<()> {
    let dups = duplicate_colors(regions);
    if !dups.is_empty() {
        return Err(Error::Lut(format!(
            "Duplicates in the color table: {dups:?}"
        )));
    }

    for region in regions {
        let wildcard_name = format!("{HEMI_WILDCARD}-{}", region.name);
        if region.cortical {
            if !new_regs.contains(&wildcard_name) {
                return Err(Error::Lut(format!(
                    "Rule for region '{}' is missing",
                    region.name
                )));
            }
        } else if !new_regs.contains(&wildcard_name)
            && !(fs.contains(&format!("Left-{}", region.name))
                && fs.contains(&format!("Right-{}", region.name)))
        {
            return Err(Error::Lut(format!(
                "Subcortical region '{}' has no rule and no FreeSurfer entry",
                region.name
            )));
        }
    }

    // Node numbering downstream assumes cortical first, subcortical last.
    if regions
        .windows(2)
        .any(|pair| !pair[0].cortical && pair[1].cortical)
    {
        return Err(Error::Lut(
            "Subcortical regions must follow all cortical regions".into(),
        ));
    }
    Ok(())
}

/// The FreeSurfer LUT with new VEP labels appended. Left-hemisphere
/// labels start at `SHIFT_LH`, right at `SHIFT_RH`; regions FreeSurfer
/// already names keep their original labels and are not re-emitted.
pub fn render_vep_fs_lut(fs: &FsLut, regions: &[Region]) -> String {
    let mut out = fs.raw.clone();
    out.push_str("\n\n#\n# Labels for the VEP parcellation\n#\n\n");
    for (hemi, shift) in [("Left", SHIFT_LH), ("Right", SHIFT_RH)] {
        let mut i = 1;
        for region in regions {
            let name = format!("{hemi}-{}", region.name);
            if fs.contains(&name) {
                continue;
            }
            let Color { r, g, b, a } = region.color;
            out.push_str(&format!(
                "{:>5}  {name:<60} {r:>3} {g:>3} {b:>3} {a:>2}\n",
                shift + i
            ));
            i += 1;
        }
    }
    out
}

/// MRtrix node LUT: contiguous numbering over Left then Right copies of
/// every region, colors taken from the merged FreeSurfer+VEP LUT.
pub fn render_mrtrix_lut(merged: &FsLut, regions: &[Region]) -> Result<String> {
    let mut out = format!("   0   {:<60}  0   0   0   0\n", "Unknown");
    let mut i = 1;
    for hemi in ["Left", "Right"] {
        for region in regions {
            let name = format!("{hemi}-{}", region.name);
            let Color { r, g, b, a } = lookup(merged, &name)?.color;
            out.push_str(&format!(
                "{i:>4}   {name:<60}  {r:>4} {g:>4} {b:>4} {a:>4}\n"
            ));
            i += 1;
        }
    }
    Ok(out)
}

/// Label numbers of the subcortical regions, Left hemisphere then Right.
pub fn render_subcort_list(merged: &FsLut, regions: &[Region]) -> Result<String> {
    let mut out = String::new();
    for hemi in ["Left", "Right"] {
        for region in regions.iter().filter(|region| !region.cortical) {
            let name = format!("{hemi}-{}", region.name);
            out.push_str(&format!("{}\n", lookup(merged, &name)?.index));
        }
    }
    Ok(out)
}

/// Hemisphere-agnostic cortical LUT for aparc volumes; colors come from
/// the Left-hemisphere entries of the merged LUT.
pub fn render_parc_lut(merged: &FsLut, regions: &[Region]) -> Result<String> {
    let mut out = format!("  0 {:<60}   0   0   0   0\n", "Unknown");
    for (i, region) in regions
        .iter()
        .filter(|region| region.cortical)
        .enumerate()
    {
        let Color { r, g, b, a } = lookup(merged, &format!("Left-{}", region.name))?.color;
        out.push_str(&format!(
            "{:>3} {:<60} {r:>3} {g:>3} {b:>3} {a:>3}\n",
            i + 1,
            region.name
        ));
    }
    Ok(out)
}

fn lookup<'a>(lut: &'a FsLut, name: &str) -> Result<&'a FsEntry> {
    lut.entries
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| Error::Lut(format!("Region '{name}' not found in the merged LUT")))
}

/// Destination paths for the four generated files.
#[derive(Debug, Clone)]
pub struct LutOutputs {
    pub fs_lut: PathBuf,
    pub mrtrix_lut: PathBuf,
    pub subcort_list: PathBuf,
    pub aparc_lut: PathBuf,
}

impl LutOutputs {
    /// The conventional file names, rooted in one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            fs_lut: dir.join("VepFreeSurferColorLut.txt"),
            mrtrix_lut: dir.join("VepMrtrixLut.txt"),
            subcort_list: dir.join("subcort.vep.txt"),
            aparc_lut: dir.join("VepAparcColorLut.txt"),
        }
    }
}

/// Validate the inputs and write the four derived files.
pub fn create_luts(
    fs_lut_path: &Path,
    rules_path: &Path,
    regions_path: &Path,
    outputs: &LutOutputs,
) -> Result<()> {
    let fs = FsLut::load(fs_lut_path)?;
    let rules = load_rules(rules_path)?;
    let new_regs = new_region_names(&rules)?;
    let regions = load_regions(regions_path)?;
    validate(&fs, &regions, &new_regs)?;

    let vep_fs = render_vep_fs_lut(&fs, &regions);
    std::fs::write(&outputs.fs_lut, &vep_fs)?;

    // Downstream tables read back the file just written, so their
    // contents always agree with it.
    let merged = FsLut::parse(&vep_fs)?;
    std::fs::write(&outputs.mrtrix_lut, render_mrtrix_lut(&merged, &regions)?)?;
    std::fs::write(
        &outputs.subcort_list,
        render_subcort_list(&merged, &regions)?,
    )?;
    std::fs::write(&outputs.aparc_lut, render_parc_lut(&merged, &regions)?)?;
    Ok(())
}

fn data_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
}

fn parse_field<T: std::str::FromStr>(token: &str, line: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::Lut(format!("Bad numeric field '{token}' in line: {line}")))
}

fn parse_color(tokens: &[&str], line: &str) -> Result<Color> {
    Ok(Color {
        r: parse_field(tokens[0], line)?,
        g: parse_field(tokens[1], line)?,
        b: parse_field(tokens[2], line)?,
        a: parse_field(tokens[3], line)?,
    })
}

fn parse_fs_entries(content: &str) -> Result<Vec<FsEntry>> {
    let mut entries = Vec::new();
    for line in data_lines(content) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 6 {
            return Err(Error::Lut(format!("Malformed LUT line: {line}")));
        }
        entries.push(FsEntry {
            index: parse_field(tokens[0], line)?,
            name: tokens[1].to_string(),
            color: parse_color(&tokens[2..6], line)?,
        });
    }
    Ok(entries)
}
