use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::param_defs::{parse_numeric_tokens, ParameterValue};
use crate::parameters::ParameterFile;

#[cfg(test)]
mod tests {
    use crate::param_defs::ParameterValue;
    use crate::parameters::ParameterFile;
    use super::*;

    fn text(s:&str) -> ParameterValue {
        ParameterValue::text(s)
    }

    #[test]
    fn flip_angle_and_protocol() {
        let visu:ParameterFile = "##$VisuAcqFlipAngle=15".parse().unwrap();
        let method:ParameterFile = "##$Method=<FLASH>".parse().unwrap();
        let bids = convert_to_bids(&visu, &method);
        assert_eq!(bids.get("FlipAngle"), Some(&ParameterValue::Scalar(15.)));
        assert_eq!(bids.get("ProtocolName"), Some(&text("FLASH")));
        assert_eq!(bids.get("Manufacturer"), Some(&text(MANUFACTURER)));
        assert_eq!(bids.get("ManufacturersModelName"), Some(&text("Unknown")));
        assert_eq!(bids.get("InstitutionName"), Some(&text("Unknown")));
        assert_eq!(bids.get("ScanningSequence"), Some(&text("Unknown")));
    }

    #[test]
    fn method_table_wins_over_geometry() {
        let visu = ParameterFile::from_iter([
            ("VisuAcqRepetitionTime", ParameterValue::Scalar(1000.)),
            ("VisuAcquisitionProtocol", text("T2_TurboRARE")),
            ("VisuManufacturer", text("Bruker BioSpin")),
            ("VisuInstitution", text("Lab")),
        ]);
        let method = ParameterFile::from_iter([
            ("PVM_RepetitionTime", ParameterValue::Scalar(2500.)),
            ("Method", text("User:RARE_custom")),
        ]);
        let bids = convert_to_bids(&visu, &method);
        assert_eq!(bids.get("RepetitionTime"), Some(&ParameterValue::Scalar(2500.)));
        assert_eq!(bids.get("ProtocolName"), Some(&text("RARE_custom")));
        assert_eq!(bids.get("ManufacturersModelName"), Some(&text("Bruker BioSpin")));
        assert_eq!(bids.get("InstitutionName"), Some(&text("Lab")));
    }

    #[test]
    fn gradient_echo_detection() {
        let visu = ParameterFile::from_iter([("VisuAcqEchoSequenceType", "GradientEcho")]);
        let bids = convert_to_bids(&visu, &ParameterFile::new());
        assert_eq!(bids.get("ScanningSequence"), Some(&text("GradientEcho")));
        assert_eq!(bids.get("SequenceType"), Some(&text("GradientEcho")));
    }

    #[test]
    fn field_of_view_text() {
        let method = ParameterFile::from_iter([("PVM_Fov", "20 +1.5e1")]);
        // text values are converted when every token parses as a float
        let mut bids = convert_to_bids(&ParameterFile::new(), &method);
        assert_eq!(bids.get("FieldOfView"), Some(&ParameterValue::NumericArray(vec![20., 15.])));

        let method = ParameterFile::from_iter([("PVM_Fov", "20 mm")]);
        bids = convert_to_bids(&ParameterFile::new(), &method);
        assert_eq!(bids.get("FieldOfView"), Some(&text("20 mm")));
    }

    #[test]
    fn non_finite_values_survive_json() {
        let visu:ParameterFile = "##$VisuAcqFlipAngle=1e999".parse().unwrap();
        let method = ParameterFile::from_iter([("PVM_Fov", "nan inf")]);
        let bids = convert_to_bids(&visu, &method);
        assert_eq!(bids.get("FlipAngle"), Some(&text("1e999")));
        assert_eq!(bids.get("FieldOfView"), Some(&text("nan inf")));

        let json = serde_json::to_string(&bids).unwrap();
        let loaded:BidsMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, bids);
    }

    #[test]
    fn acqp_does_not_overwrite() {
        let method = ParameterFile::from_iter([("PVM_EchoTime", 3.5)]);
        let bids = convert_to_bids(&ParameterFile::new(), &method);
        let acqp = ParameterFile::from_iter([
            ("ACQ_echo_time", ParameterValue::Scalar(9.)),
            ("ACQ_flip_angle", ParameterValue::Scalar(30.)),
            ("ACQ_operator", text("nmrsu")),
            ("ACQ_scan_type", text("Localizer")),
            ("ACQ_recov_time", ParameterValue::NumericArray(vec![100., 200.])),
        ]);
        let bids = merge_acqp_data(bids, &acqp);
        assert_eq!(bids.get("EchoTime"), Some(&ParameterValue::Scalar(3.5)));
        assert_eq!(bids.get("FlipAngle"), Some(&ParameterValue::Scalar(30.)));
        assert_eq!(bids.get("operator"), Some(&text("nmrsu")));
        assert_eq!(bids.get("SeriesDescription"), Some(&text("Localizer")));
        assert_eq!(bids.get("RecovTime"), Some(&ParameterValue::NumericArray(vec![100., 200.])));
    }

    #[test]
    fn acquisition_time_from_array() {
        let acqp = ParameterFile::from_iter([("ACQ_abs_time", vec![1700000000., 456., 60.])]);
        let bids = merge_acqp_data(BidsMetadata::new(), &acqp);
        assert_eq!(bids.get("AcquisitionTime"), Some(&text("2023-11-14T22:13:20Z")));
    }

    #[test]
    fn acquisition_time_from_text() {
        let acqp = ParameterFile::from_iter([("ACQ_abs_time", " , 951782400.5, 12")]);
        let bids = merge_acqp_data(BidsMetadata::new(), &acqp);
        assert_eq!(bids.get("AcquisitionTime"), Some(&text("2000-02-29T00:00:00.500000Z")));
    }

    #[test]
    fn unparseable_acquisition_time_is_kept() {
        let acqp = ParameterFile::from_iter([("ACQ_abs_time", "yesterday, 3")]);
        let bids = merge_acqp_data(BidsMetadata::new(), &acqp);
        assert_eq!(bids.get("AcquisitionTime"), Some(&text("yesterday, 3")));

        let acqp = ParameterFile::from_iter([("ACQ_abs_time", vec![1e300, 1.])]);
        let bids = merge_acqp_data(BidsMetadata::new(), &acqp);
        assert_eq!(bids.get("AcquisitionTime"), Some(&ParameterValue::NumericArray(vec![1e300, 1.])));
    }

    #[test]
    fn epoch_conversion() {
        assert_eq!(epoch_to_iso8601(0.).as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(epoch_to_iso8601(-1.).as_deref(), Some("1969-12-31T23:59:59Z"));
        assert_eq!(epoch_to_iso8601(1e-7).as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(epoch_to_iso8601(f64::NAN), None);
        // 1/128 s and 3/128 s are exact halves of a microsecond
        assert_eq!(epoch_to_iso8601(0.0078125).as_deref(), Some("1970-01-01T00:00:00.007812Z"));
        assert_eq!(epoch_to_iso8601(0.0234375).as_deref(), Some("1970-01-01T00:00:00.023438Z"));
    }

    #[test]
    fn reco_merge() {
        let mut bids = BidsMetadata::new();
        bids.set("ReconstructionImageType", "MAGNITUDE_IMAGE");
        let reco = ParameterFile::from_iter([
            ("RECO_time", text("12:30:01,250")),
            ("RECO_size", ParameterValue::NumericArray(vec![128., 128.])),
            ("RECO_image_type", text("COMPLEX_IMAGE")),
        ]);
        let bids = merge_reco_data(bids, &reco);
        assert_eq!(bids.get("ReconstructionTime"), Some(&text("12:30:01.250")));
        assert_eq!(bids.get("ReconstructionImageDimensions"), Some(&ParameterValue::NumericArray(vec![128., 128.])));
        assert_eq!(bids.get("ReconstructionImageType"), Some(&text("MAGNITUDE_IMAGE")));
    }

    #[test]
    fn empty_inputs() {
        let bids = convert_to_bids(&ParameterFile::new(), &ParameterFile::new());
        let bids = merge_reco_data(merge_acqp_data(bids, &ParameterFile::new()), &ParameterFile::new());
        assert_eq!(bids.keys().collect::<Vec<_>>(), vec!["Manufacturer", "ManufacturersModelName", "InstitutionName", "ScanningSequence"]);
    }
}

pub const MANUFACTURER: &str = "Bruker BioSpin MRI GmbH";

/// (method parameter, BIDS key). Applied first, so these take precedence.
pub const METHOD_TABLE: &[(&str,&str)] = &[
    ("Method", "ProtocolName"),
    ("PVM_StudyInstrumentPosition", "PatientPosition"),
    ("PVM_EchoTime", "EchoTime"),
    ("PVM_RepetitionTime", "RepetitionTime"),
    ("PVM_SliceThick", "SliceThickness"),
    ("PVM_Fov", "FieldOfView"),
    ("PVM_FrqWork", "ImagingFrequency"),
    ("PVM_Nucleus1", "ImagedNucleus"),
    ("PVM_SelIrInvTime", "InversionTime"),
    ("MP2_RecoveryTime", "MP2_RecoveryTime"),
    ("MP2_EchoTrainLength", "MP2_EchoTrainLength"),
    ("EffectiveTI", "EffectiveTI"),
    ("PVM_ScanTime", "ScanTime"),
];

/// (visu_pars parameter, BIDS key)
pub const GEOMETRY_TABLE: &[(&str,&str)] = &[
    ("VisuAcqRepetitionTime", "RepetitionTime"),
    ("VisuAcqInversionTime", "InversionTime"),
    ("VisuAcqEchoTrainLength", "EchoTrainLength"),
    ("VisuAcqFlipAngle", "FlipAngle"),
    ("VisuAcqImagingFrequency", "ImagingFrequency"),
    ("VisuAcqImagedNucleus", "ImagedNucleus"),
    ("VisuMagneticFieldStrength", "MagneticFieldStrength"),
    ("VisuSubjectWeight", "Weight"),
    ("VisuSubjectPosition", "PatientPosition"),
    ("VisuAcquisitionProtocol", "ProtocolName"),
    ("VisuAcqPixelBandwidth", "PixelBandwidth"),
    ("VisuAcqSequenceName", "SequenceName"),
    ("VisuAcqEchoSequenceType", "SequenceType"),
    ("VisuCoilReceiveName", "ReceiveCoilName"),
    ("VisuCoilTransmitName", "TransmitCoilName"),
];

/// acqp parameters that duplicate keys the method/visu tables may already have set
pub const ACQP_DUPLICATE_TABLE: &[(&str,&str)] = &[
    ("ACQ_protocol_name", "ProtocolName"),
    ("ACQ_flip_angle", "FlipAngle"),
    ("ACQ_fov", "FieldOfView"),
    ("ACQ_inversion_time", "InversionTime"),
    ("ACQ_echo_time", "EchoTime"),
    ("ACQ_recov_time", "RecovTime"),
];

pub const ACQP_TABLE: &[(&str,&str)] = &[
    ("ACQ_operator", "operator"),
    ("ACQ_station", "station"),
    ("ACQ_sw_version", "sw_version"),
    ("ACQ_slice_angle", "slice_angle"),
    ("ACQ_slice_orient", "slice_orient"),
    ("ACQ_read_offset", "read_offset"),
    ("ACQ_phase1_offset", "phase1_offset"),
    ("ACQ_phase2_offset", "phase2_offset"),
    ("ACQ_slice_sepn", "slice_sepn"),
    ("ACQ_slice_offset", "slice_offset"),
    ("ACQ_time_points", "time_points"),
];

pub const RECO_TABLE: &[(&str,&str)] = &[
    ("RECO_time", "ReconstructionTime"),
    ("RECO_size", "ReconstructionImageDimensions"),
    ("RECO_image_type", "ReconstructionImageType"),
];

/// BIDS sidecar fields in insertion order
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
#[serde(transparent)]
pub struct BidsMetadata {
    fields: IndexMap<String,ParameterValue>,
}

impl BidsMetadata {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key:&str) -> Option<&ParameterValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key:&str) -> bool {
        self.fields.contains_key(key)
    }

    /// insert or overwrite
    pub fn set(&mut self, key:impl Into<String>, value:impl Into<ParameterValue>) -> Option<ParameterValue> {
        self.fields.insert(key.into(), value.into())
    }

    /// insert only if `key` is absent. Returns true if the value was written.
    pub fn set_default(&mut self, key:&str, value:impl Into<ParameterValue>) -> bool {
        if self.fields.contains_key(key) {
            false
        }else {
            self.fields.insert(key.to_string(), value.into());
            true
        }
    }

    pub fn remove(&mut self, key:&str) -> Option<ParameterValue> {
        self.fields.shift_remove(key)
    }

    /// moves the value of `from` to `to`, overwriting `to`
    pub fn rename(&mut self, from:&str, to:&str) {
        if let Some(value) = self.remove(from) {
            self.set(to, value);
        }
    }

    /// for every (source, key) pair, copy `source` from `params` unless `key` is already set
    pub fn fill_from(&mut self, table:&[(&str,&str)], params:&ParameterFile) {
        for (source,key) in table {
            if let Some(value) = params.get(source) {
                self.set_default(key, value.clone());
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item=&str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item=(&String,&ParameterValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String,ParameterValue)> for BidsMetadata {
    fn from_iter<T: IntoIterator<Item=(String,ParameterValue)>>(iter: T) -> Self {
        BidsMetadata{fields: iter.into_iter().collect()}
    }
}

impl IntoIterator for BidsMetadata {
    type Item = (String,ParameterValue);
    type IntoIter = indexmap::map::IntoIter<String,ParameterValue>;
    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Primary conversion from `visu_pars` and `method` parameters
pub fn convert_to_bids(visu:&ParameterFile, method:&ParameterFile) -> BidsMetadata {
    let mut bids = BidsMetadata::new();

    for (source,key) in METHOD_TABLE {
        if let Some(value) = method.get(source) {
            bids.set(*key, value.clone());
        }
    }
    bids.fill_from(GEOMETRY_TABLE, visu);

    bids.set_default("Manufacturer", MANUFACTURER);
    bids.set_default("ManufacturersModelName",
        visu.get("VisuManufacturer").cloned().unwrap_or(ParameterValue::text("Unknown"))
    );
    bids.set_default("InstitutionName",
        visu.get("VisuInstitution").cloned().unwrap_or(ParameterValue::text("Unknown"))
    );

    let gradient_echo = bids.get("SequenceType")
        .and_then(|v| v.as_text())
        .is_some_and(|s| s.to_lowercase() == "gradientecho");
    bids.set_default("ScanningSequence", if gradient_echo {"GradientEcho"} else {"Unknown"});

    for key in ["ProtocolName","SequenceName"] {
        if let Some(ParameterValue::Text(name)) = bids.get(key) {
            let cleaned = name.replace("User:", "").trim().to_string();
            bids.set(key, cleaned);
        }
    }

    if let Some(ParameterValue::Text(fov)) = bids.get("FieldOfView") {
        let tokens = fov.split_whitespace().collect::<Vec<_>>();
        match parse_numeric_tokens(&tokens) {
            Some(values) => {
                bids.set("FieldOfView", values);
            }
            None => debug!("keeping FieldOfView '{fov}' as text"),
        }
    }

    bids
}

/// Merge acquisition protocol (`acqp`) parameters. Keys that are already set are kept.
pub fn merge_acqp_data(mut bids:BidsMetadata, acqp:&ParameterFile) -> BidsMetadata {
    bids.fill_from(ACQP_DUPLICATE_TABLE, acqp);
    bids.fill_from(ACQP_TABLE, acqp);

    if let Some(abs_time) = acqp.get("ACQ_abs_time") {
        bids.set_default("AcquisitionTime", acquisition_time(abs_time));
    }
    if let Some(scan_type) = acqp.get("ACQ_scan_type") {
        bids.set_default("SeriesDescription", scan_type.clone());
    }
    bids
}

/// Merge reconstruction (`reco`) parameters. Keys that are already set are kept.
pub fn merge_reco_data(mut bids:BidsMetadata, reco:&ParameterFile) -> BidsMetadata {
    for (source,key) in RECO_TABLE {
        let Some(value) = reco.get(source) else {
            continue
        };
        let value = match value {
            ParameterValue::Text(s) if *key == "ReconstructionTime" => ParameterValue::Text(s.replace(',', ".")),
            _ => value.clone(),
        };
        bids.set_default(key, value);
    }
    bids
}

/// `ACQ_abs_time` holds seconds since the Unix epoch as its first entry. The raw value is
/// returned unchanged if it cannot be converted.
fn acquisition_time(raw:&ParameterValue) -> ParameterValue {
    let seconds = match raw {
        ParameterValue::NumericArray(v) => v.first().copied(),
        ParameterValue::Text(s) => s.split(',')
            .map(str::trim)
            .find(|part| !part.is_empty())
            .and_then(|part| part.replace(',', ".").parse::<f64>().ok()),
        ParameterValue::Scalar(_) => None,
    };
    match seconds.and_then(epoch_to_iso8601) {
        Some(iso) => ParameterValue::Text(iso),
        None => {
            debug!("keeping unconverted acquisition time {raw}");
            raw.clone()
        }
    }
}

const SECONDS_PER_DAY: i64 = 86_400;
/// 0001-01-01T00:00:00Z
const MIN_EPOCH_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_EPOCH_SECONDS: i64 = 253_402_300_799;

/// UTC ISO-8601 with a trailing `Z`, microseconds only when non-zero
pub fn epoch_to_iso8601(seconds:f64) -> Option<String> {
    if !seconds.is_finite() {
        return None
    }
    let whole = seconds.floor();
    // ties to even, as Python's datetime does
    let mut micros = ((seconds - whole) * 1e6).round_ties_even() as i64;
    let mut secs = whole as i64;
    if micros == 1_000_000 {
        secs += 1;
        micros = 0;
    }
    if !(MIN_EPOCH_SECONDS..=MAX_EPOCH_SECONDS).contains(&secs) {
        return None
    }

    let (year,month,day) = civil_from_days(secs.div_euclid(SECONDS_PER_DAY));
    let sod = secs.rem_euclid(SECONDS_PER_DAY);
    let mut s = format!("{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}", sod / 3600, (sod % 3600) / 60, sod % 60);
    if micros > 0 {
        s.push_str(&format!(".{micros:06}"));
    }
    s.push('Z');
    Some(s)
}

/// proleptic Gregorian (year, month, day) for a day count relative to 1970-01-01
fn civil_from_days(days:i64) -> (i64,u32,u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400;
    (if month <= 2 { year + 1 } else { year }, month, day)
}
