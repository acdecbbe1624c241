use std::path::Path;
use tracing::info;
use crate::bids::BidsMetadata;
use crate::param_defs::ParameterValue;
use crate::{io, Result};


/// Sidecar key order. Keys missing here follow in their existing order.
pub const CANONICAL_ORDER: &[&str] = &[
    "Manufacturer",
    "ManufacturersModelName",
    "InstitutionName",
    "PatientPosition",
    "ProtocolName",
    "SeriesDescription",
    "AcquisitionTime",
    "ReconstructionTime",
    "ReconstructionImageDimensions",
    "ReconstructionImageType",
    "ScanningSequence",
    "SequenceName",
    "SequenceType",
    "RepetitionTime",
    "EchoTime",
    "InversionTime",
    "FlipAngle",
    "SliceThickness",
    "FieldOfView",
    "ImagingFrequency",
    "ImagedNucleus",
    "EchoTrainLength",
    "ScanTime",
    "PixelBandwidth",
    "MagneticFieldStrength",
    "Weight",
    "ReceiveCoilName",
    "TransmitCoilName",
    "operator",
    "station",
    "sw_version",
    "slice_angle",
    "slice_orient",
    "read_offset",
    "phase1_offset",
    "phase2_offset",
    "slice_sepn",
    "slice_thick",
    "slice_offset",
    "time_points",
    "RecovTime",
];

pub fn reorder_keys(mut bids:BidsMetadata) -> BidsMetadata {
    let mut ordered = BidsMetadata::new();
    for key in CANONICAL_ORDER {
        if let Some(value) = bids.remove(key) {
            ordered.set(*key, value);
        }
    }
    for (key,value) in bids {
        ordered.set(key, value);
    }
    ordered
}

/// the metadata exactly as [`save_json`] writes it
pub fn finalize(mut bids:BidsMetadata) -> BidsMetadata {
    bids.set_default("Units", ParameterValue::text("arbitrary"));
    reorder_keys(bids)
}

pub fn save_json(bids:BidsMetadata, output_file:impl AsRef<Path>) -> Result<()> {
    let bids = finalize(bids);
    io::write_json(output_file.as_ref(), &bids)?;
    info!("wrote {} fields to {}", bids.len(), output_file.as_ref().display());
    Ok(())
}
