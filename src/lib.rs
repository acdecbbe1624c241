//! Conversion of Bruker ParaVision parameter files (`visu_pars`, `method`, `acqp`,
//! `reco`) into BIDS sidecar metadata.

use std::io::Error as IoError;
use std::path::PathBuf;
use thiserror::Error;

pub mod param_defs;
pub mod parameters;
pub mod io;
pub mod bids;
pub mod sequence;
pub mod sidecar;
pub mod scan;

pub use param_defs::ParameterValue;
pub use parameters::{parse_bruker_file, ParameterFile};
pub use bids::{convert_to_bids, merge_acqp_data, merge_reco_data, BidsMetadata};
pub use sequence::{adapt_for_mese, adapt_for_rare, adapt_for_t2star, mp2rage, Mp2rageParams, SequenceMode};
pub use sidecar::{reorder_keys, save_json};
pub use scan::{Conversion, ParsedScan, ScanFiles};

#[derive(Debug,Error)]
pub enum BidsError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parameter file '{name}' not found under {}", .scan_dir.display())]
    MissingParameterFile {
        name: String,
        scan_dir: PathBuf,
    },
    #[error("unknown sequence mode '{0}'")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T,BidsError>;
