use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use serde::Deserialize;
use crate::bids::BidsMetadata;
use crate::param_defs::ParameterValue;
use crate::{io, BidsError, Result};


const MP2RAGE_SUFFIX: &str = "MP2RAGE.json";
const MESE_SUFFIX: &str = "MESE.json";

/// Pulse-sequence family of a scan. Exactly one mode applies per conversion.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default)]
pub enum SequenceMode {
    #[default]
    Mp2rage,
    Mese,
    Rare,
    T2Star,
    /// no sequence specific adaptation
    Plain,
}

impl SequenceMode {
    /// Applies the single-output adaptation. MP2RAGE is handled by [`mp2rage_pair`] and
    /// is left untouched here.
    pub fn adapt(&self, bids:BidsMetadata) -> BidsMetadata {
        match self {
            SequenceMode::Mese => adapt_for_mese(bids),
            SequenceMode::Rare => adapt_for_rare(bids),
            SequenceMode::T2Star => adapt_for_t2star(bids),
            SequenceMode::Mp2rage | SequenceMode::Plain => bids,
        }
    }
}

impl FromStr for SequenceMode {
    type Err = BidsError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "MP2RAGE" => Ok(SequenceMode::Mp2rage),
            "MESE" => Ok(SequenceMode::Mese),
            "RARE" => Ok(SequenceMode::Rare),
            "T2STAR" => Ok(SequenceMode::T2Star),
            _ => Err(BidsError::UnknownMode(s.to_string())),
        }
    }
}

impl Display for SequenceMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceMode::Mp2rage => write!(f, "MP2RAGE"),
            SequenceMode::Mese => write!(f, "MESE"),
            SequenceMode::Rare => write!(f, "RARE"),
            SequenceMode::T2Star => write!(f, "T2STAR"),
            SequenceMode::Plain => write!(f, "PLAIN"),
        }
    }
}

/// multi-echo spin echo
pub fn adapt_for_mese(mut bids:BidsMetadata) -> BidsMetadata {
    bids.set("ScanningSequence", "SpinEcho");
    bids.set("SequenceType", "SpinEcho");
    for key in ["MP2_RecoveryTime", "MP2_EchoTrainLength", "EffectiveTI"] {
        bids.remove(key);
    }
    bids.rename("NECHOES", "NumberOfEchoes");
    bids
}

pub fn adapt_for_rare(mut bids:BidsMetadata) -> BidsMetadata {
    bids.set("ScanningSequence", "RARE");
    bids.set("SequenceType", "RARE");
    bids.remove("InversionTime");
    bids
}

/// multi-echo gradient echo used for T2* maps
pub fn adapt_for_t2star(mut bids:BidsMetadata) -> BidsMetadata {
    bids.set("ScanningSequence", "GRADIENT_ECHO");
    bids.set("SequenceType", "GRE");
    bids.rename("NECHOES", "NumberOfEchoes");
    bids
}

/// MP2RAGE timing that is not stored in the ParaVision parameter files
#[derive(Debug,Clone,PartialEq,Deserialize)]
pub struct Mp2rageParams {
    /// excitation repetition time
    #[serde(rename = "TR")]
    pub tr: f64,
    /// time between two inversion pulses
    #[serde(rename = "MP2RAGE_TR")]
    pub mp2rage_tr: f64,
    /// excitations per inversion block
    #[serde(rename = "ETL")]
    pub etl: f64,
    #[serde(rename = "α₁", alias = "alpha1")]
    pub alpha1: f64,
    #[serde(rename = "α₂", alias = "alpha2")]
    pub alpha2: f64,
    #[serde(rename = "TI₁", alias = "TI1")]
    pub ti1: f64,
    #[serde(rename = "TI₂", alias = "TI2")]
    pub ti2: f64,
}

impl Mp2rageParams {
    pub fn from_file(path:impl AsRef<Path>) -> Result<Self> {
        let s = io::read_lossy(path)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn inversion_times(&self) -> [f64;2] {
        [self.ti1, self.ti2]
    }
}

/// Copy of `bids` describing the image acquired at `inversion_time`. The flip angle is
/// α₁ when `inversion_time` equals TI₁ and α₂ otherwise.
pub fn mp2rage(bids:&BidsMetadata, params:&Mp2rageParams, inversion_time:f64) -> BidsMetadata {
    let mut bids = bids.clone();
    bids.set("InversionTime", inversion_time);
    bids.set("RepetitionTimeExcitation", params.tr);
    bids.set("RepetitionTimePreparation", params.mp2rage_tr);
    bids.set("NumberShots", params.etl);
    let flip_angle = if inversion_time == params.ti1 { params.alpha1 } else { params.alpha2 };
    bids.set("FlipAngle", ParameterValue::Scalar(flip_angle));
    bids
}

/// the two sidecars of an MP2RAGE scan, for TI₁ and TI₂
pub fn mp2rage_pair(bids:&BidsMetadata, params:&Mp2rageParams) -> [BidsMetadata;2] {
    params.inversion_times().map(|ti| mp2rage(bids, params, ti))
}

/// `X_MP2RAGE.json` -> `X_inv-N_MP2RAGE.json`, otherwise `stem_inv-N.ext`
pub fn inversion_file_name(json_name:&str, index:usize) -> String {
    insert_entity(json_name, MP2RAGE_SUFFIX, &format!("inv-{index}"))
}

/// `X_MESE.json` -> `X_echo-1_MESE.json`, otherwise `stem_echo-1.ext`
pub fn echo_file_name(json_name:&str) -> String {
    insert_entity(json_name, MESE_SUFFIX, "echo-1")
}

fn insert_entity(json_name:&str, suffix:&str, entity:&str) -> String {
    if json_name.contains(suffix) {
        return json_name.replace(suffix, &format!("{entity}_{suffix}"))
    }
    let p = Path::new(json_name);
    let stem = p.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let file_name = match p.extension() {
        Some(ext) => format!("{stem}_{entity}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{entity}"),
    };
    p.with_file_name(file_name).to_string_lossy().into_owned()
}
