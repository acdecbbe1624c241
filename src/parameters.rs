use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};
use crate::param_defs::{is_continuation, strip_angle_quotes, strip_parens, Comment, Declaration, EndMarker, LineDef, ParameterValue};
use crate::{io, Result};


/// All `##$KEY=value` records of one ParaVision parameter file (`method`, `acqp`,
/// `visu_pars`, `reco`), keyed by parameter name without the `##$` prefix.
#[derive(Debug,Clone,Default,PartialEq)]
pub struct ParameterFile {
    params: HashMap<String,ParameterValue>,
}

/// read and parse a parameter file. Only I/O failures are errors; unreadable content is
/// skipped line by line.
pub fn parse_bruker_file(filepath:impl AsRef<Path>) -> Result<ParameterFile> {
    let text = io::read_lossy(filepath.as_ref())?;
    let lines = text.lines().collect::<Vec<&str>>();
    let params = ParameterFile::from_lines(&lines);
    debug!("parsed {} parameters from {}", params.len(), filepath.as_ref().display());
    Ok(params)
}

impl ParameterFile {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines:&[&str]) -> ParameterFile {
        let mut params = HashMap::<String,ParameterValue>::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if line.is_empty() || Comment::matches(line) || EndMarker::matches(line) || !Declaration::matches(line) {
                i += 1;
                continue;
            }
            let Ok(decl) = Declaration::from_str(line) else {
                debug!("skipping malformed declaration on line {}: {line}", i + 1);
                i += 1;
                continue;
            };
            let (value,consumed) = decode_value(&decl.raw, &lines[i + 1..]);
            trace!("{} = {:?}", decl.key, value);
            params.insert(decl.key, value);
            i += 1 + consumed;
        }
        ParameterFile{params}
    }

    pub fn get(&self, key:&str) -> Option<&ParameterValue> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key:&str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item=(&String,&ParameterValue)> {
        self.params.iter()
    }
}

impl FromStr for ParameterFile {
    type Err = Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lines = s.lines().collect::<Vec<&str>>();
        Ok(ParameterFile::from_lines(&lines))
    }
}

impl<K:Into<String>,V:Into<ParameterValue>> FromIterator<(K,V)> for ParameterFile {
    fn from_iter<T: IntoIterator<Item=(K,V)>>(iter: T) -> Self {
        ParameterFile{
            params: iter.into_iter().map(|(k,v)| (k.into(), v.into())).collect()
        }
    }
}

/// Decode the raw value of a declaration. `following` are the lines after the declaration.
/// Returns the value and the number of following lines it consumed.
fn decode_value(raw:&str, following:&[&str]) -> (ParameterValue, usize) {

    if let Some(inner) = strip_parens(raw) {
        // a dimension header with the value on the next line(s)
        let continues = following.first().is_some_and(|l| is_continuation(l.trim()));
        if continues {
            let block = following.iter()
                .map(|l| l.trim())
                .take_while(|l| is_continuation(l))
                .collect::<Vec<&str>>();
            let joined = block.join(" ");
            let joined = joined.trim();
            let text = strip_angle_quotes(joined).unwrap_or(joined);
            let tokens = text.split_whitespace().collect::<Vec<&str>>();
            return (ParameterValue::classify(&tokens, text), block.len())
        }
        let tokens = inner.split(',').map(str::trim).collect::<Vec<&str>>();
        return (ParameterValue::classify(&tokens, inner), 0)
    }

    if let Some(text) = strip_angle_quotes(raw) {
        return (ParameterValue::text(text), 0)
    }

    let tokens = raw.split_whitespace().collect::<Vec<&str>>();
    (ParameterValue::classify(&tokens, raw), 0)
}
