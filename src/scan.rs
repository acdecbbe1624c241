use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::bids::{convert_to_bids, merge_acqp_data, merge_reco_data, BidsMetadata};
use crate::parameters::{parse_bruker_file, ParameterFile};
use crate::sequence::{echo_file_name, inversion_file_name, mp2rage_pair, Mp2rageParams, SequenceMode};
use crate::sidecar::save_json;
use crate::{io, BidsError, Result};

#[cfg(test)]
mod tests {
    use std::fs;
    use super::*;

    fn write(root:&Path, rel:&str, contents:&str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, contents).unwrap();
    }

    #[test]
    fn locate_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["method","acqp","pdata/1/visu_pars","pdata/1/reco"] {
            write(dir.path(), rel, "");
        }
        let files = ScanFiles::locate(dir.path()).unwrap();
        assert_eq!(files.visu_pars, dir.path().join("pdata/1/visu_pars"));
        assert_eq!(files.reco, dir.path().join("pdata/1/reco"));
    }

    #[test]
    fn locate_falls_back_to_search() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["method","acqp","pdata/2/visu_pars","pdata/2/reco"] {
            write(dir.path(), rel, "");
        }
        let files = ScanFiles::locate(dir.path()).unwrap();
        assert_eq!(files.visu_pars, dir.path().join("pdata/2/visu_pars"));
        assert_eq!(files.reco, dir.path().join("pdata/2/reco"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["method","pdata/1/visu_pars","pdata/1/reco"] {
            write(dir.path(), rel, "");
        }
        match ScanFiles::locate(dir.path()) {
            Err(BidsError::MissingParameterFile{name,..}) => assert_eq!(name, "acqp"),
            other => panic!("expected missing acqp, got {other:?}"),
        }
    }

    #[test]
    fn sidecar_names() {
        let c = Conversion::new(SequenceMode::Mese);
        assert_eq!(c.single_file_name(), "bids_metadata_echo-1_MESE.json");
        let c = Conversion::new(SequenceMode::Rare).with_json_name("sub-01_T2w.json");
        assert_eq!(c.single_file_name(), "sub-01_T2w.json");
        let c = Conversion::new(SequenceMode::Mese).with_json_name("sub-01_MESE.json");
        assert_eq!(c.single_file_name(), "sub-01_echo-1_MESE.json");
    }

    #[test]
    fn output_dir_moves_up_for_mp2rage_and_mese() {
        let out = Path::new("derivatives/sub-01/anat");
        assert_eq!(Conversion::new(SequenceMode::Mp2rage).output_dir(out), Path::new("derivatives/sub-01"));
        assert_eq!(Conversion::new(SequenceMode::Mese).output_dir(out), Path::new("derivatives/sub-01"));
        assert_eq!(Conversion::new(SequenceMode::T2Star).output_dir(out), out);
    }

    #[test]
    fn mp2rage_without_params_is_single_output() {
        let sidecars = Conversion::new(SequenceMode::Mp2rage).sidecars(BidsMetadata::new());
        assert_eq!(sidecars.len(), 1);
        assert_eq!(sidecars[0].0, "bids_metadata.json");
    }
}

pub const VISU_PARS: &str = "visu_pars";
pub const METHOD: &str = "method";
pub const ACQP: &str = "acqp";
pub const RECO: &str = "reco";

const DEFAULT_JSON_NAME: &str = "bids_metadata.json";
const DEFAULT_MESE_JSON_NAME: &str = "bids_metadata_echo-1_MESE.json";
const DEFAULT_MP2RAGE_JSON_NAME: &str = "bids_metadata_MP2RAGE.json";

/// The four parameter files of one scan (experiment) directory
#[derive(Debug,Clone,PartialEq)]
pub struct ScanFiles {
    pub visu_pars: PathBuf,
    pub method: PathBuf,
    pub acqp: PathBuf,
    pub reco: PathBuf,
}

impl ScanFiles {

    /// Finds the parameter files at their usual place (`method`, `acqp`,
    /// `pdata/1/visu_pars`, `pdata/1/reco`), or anywhere below `scan_dir` otherwise.
    pub fn locate(scan_dir:impl AsRef<Path>) -> Result<ScanFiles> {
        let scan_dir = scan_dir.as_ref();
        let pdata = Path::new("pdata").join("1");
        Ok(ScanFiles {
            visu_pars: locate_one(scan_dir, &pdata.join(VISU_PARS), VISU_PARS)?,
            method: locate_one(scan_dir, Path::new(METHOD), METHOD)?,
            acqp: locate_one(scan_dir, Path::new(ACQP), ACQP)?,
            reco: locate_one(scan_dir, &pdata.join(RECO), RECO)?,
        })
    }

    pub fn parse(&self) -> Result<ParsedScan> {
        Ok(ParsedScan {
            visu: parse_bruker_file(&self.visu_pars)?,
            method: parse_bruker_file(&self.method)?,
            acqp: parse_bruker_file(&self.acqp)?,
            reco: parse_bruker_file(&self.reco)?,
        })
    }
}

fn locate_one(scan_dir:&Path, expected:&Path, name:&str) -> Result<PathBuf> {
    let p = scan_dir.join(expected);
    if p.exists() {
        return Ok(p)
    }
    debug!("{} not found, searching {}", p.display(), scan_dir.display());
    io::find_file(scan_dir, name).ok_or_else(|| BidsError::MissingParameterFile {
        name: name.to_string(),
        scan_dir: scan_dir.to_path_buf(),
    })
}

#[derive(Debug,Clone,Default,PartialEq)]
pub struct ParsedScan {
    pub visu: ParameterFile,
    pub method: ParameterFile,
    pub acqp: ParameterFile,
    pub reco: ParameterFile,
}

impl ParsedScan {
    /// convert, then merge acqp and reco
    pub fn to_bids(&self) -> BidsMetadata {
        let bids = convert_to_bids(&self.visu, &self.method);
        let bids = merge_acqp_data(bids, &self.acqp);
        merge_reco_data(bids, &self.reco)
    }
}

/// How a parsed scan becomes one or two sidecar files
#[derive(Debug,Clone,Default)]
pub struct Conversion {
    pub mode: SequenceMode,
    pub mp2rage: Option<Mp2rageParams>,
    pub json_name: Option<String>,
}

impl Conversion {

    pub fn new(mode:SequenceMode) -> Self {
        Conversion{mode, mp2rage: None, json_name: None}
    }

    pub fn with_mp2rage(mut self, params:Mp2rageParams) -> Self {
        self.mp2rage = Some(params);
        self
    }

    pub fn with_json_name(mut self, json_name:impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }

    /// MP2RAGE and MESE sidecars belong one level above the given directory
    pub fn output_dir(&self, output_dir:&Path) -> PathBuf {
        match self.mode {
            SequenceMode::Mp2rage | SequenceMode::Mese => output_dir.parent()
                .unwrap_or(output_dir)
                .to_path_buf(),
            _ => output_dir.to_path_buf(),
        }
    }

    fn single_file_name(&self) -> String {
        match (self.mode, self.json_name.as_deref()) {
            (SequenceMode::Mese, Some(name)) => echo_file_name(name),
            (SequenceMode::Mese, None) => DEFAULT_MESE_JSON_NAME.to_string(),
            (_, Some(name)) => name.to_string(),
            (_, None) => DEFAULT_JSON_NAME.to_string(),
        }
    }

    /// (file name, metadata) for every sidecar the scan produces
    pub fn sidecars(&self, bids:BidsMetadata) -> Vec<(String,BidsMetadata)> {
        if let (SequenceMode::Mp2rage, Some(params)) = (self.mode, self.mp2rage.as_ref()) {
            let json_name = self.json_name.as_deref().unwrap_or(DEFAULT_MP2RAGE_JSON_NAME);
            return mp2rage_pair(&bids, params).into_iter()
                .zip(1..)
                .map(|(bids,index)| (inversion_file_name(json_name, index), bids))
                .collect()
        }
        vec![(self.single_file_name(), self.mode.adapt(bids))]
    }

    /// write all sidecars of `scan` and return their paths
    pub fn write(&self, scan:&ParsedScan, output_dir:impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = self.output_dir(output_dir.as_ref());
        let mut written = vec![];
        for (name,bids) in self.sidecars(scan.to_bids()) {
            let path = dir.join(name);
            save_json(bids, &path)?;
            written.push(path);
        }
        info!("{} mode: {} sidecar(s) written", self.mode, written.len());
        Ok(written)
    }
}
