use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};


static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("invalid regex")
});

/// Line Definition
pub trait LineDef {
    fn patterns<'a>() -> &'a [&'a str];

    /// returns true if the (trimmed) line starts with one of the patterns
    fn matches(s:&str) -> bool {
        Self::patterns().iter().any(|p| s.starts_with(p))
    }

    /// return the byte index in 's' of the first character after the pattern match
    fn idx(s:&str) -> Option<usize> {
        Self::patterns().iter()
            .find(|p| s.starts_with(**p))
            .map(|p| p.len())
    }
}

/******************************
 ********** COMMENT ***********
 ****************************/

/// `$$` lines carry file provenance (path, date, owner) and are ignored
pub struct Comment;

impl LineDef for Comment {
    fn patterns<'a>() -> &'a [&'a str] {
        &["$$"]
    }
}

/******************************
 ********* END MARKER *********
 ****************************/

pub struct EndMarker;

impl LineDef for EndMarker {
    fn patterns<'a>() -> &'a [&'a str] {
        &["##END="]
    }
}

/******************************
 ********** RECORD ************
 ****************************/

/// Any JCAMP-DX labelled record (`##TITLE=`, `##$KEY=`, ...). A record line always
/// terminates a multi-line value.
pub struct Record;

impl LineDef for Record {
    fn patterns<'a>() -> &'a [&'a str] {
        &["##"]
    }
}

/// true if the trimmed line can continue the value of the preceding declaration
pub fn is_continuation(s:&str) -> bool {
    !s.is_empty() && !Record::matches(s) && !Comment::matches(s)
}

/******************************
 ******** DECLARATION *********
 ****************************/

/// A `##$KEY=value` parameter declaration. `raw` is the trimmed text after the first `=`.
#[derive(Debug,Clone,PartialEq)]
pub struct Declaration {
    pub key: String,
    pub raw: String,
}

impl LineDef for Declaration {
    fn patterns<'a>() -> &'a [&'a str] {
        &["##$"]
    }
}

impl FromStr for Declaration {
    type Err = ();
    fn from_str(s: &str) -> Result<Self,()> {
        let idx = Declaration::idx(s).ok_or(())?;
        let (key,raw) = s[idx..].split_once('=').ok_or(())?;
        Ok(Declaration{
            key: key.trim().to_string(),
            raw: raw.trim().to_string(),
        })
    }
}

impl Display for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}={}", Self::patterns()[0], self.key, self.raw)
    }
}

/******************************
 ******* PARAMETER VALUE ******
 ****************************/

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Scalar(f64),
    NumericArray(Vec<f64>),
    Text(String),
}

impl ParameterValue {

    /// Numeric only if every token is a float literal: one token gives a scalar, more
    /// give an array. Anything else keeps `text` verbatim.
    pub fn classify(tokens:&[&str], text:&str) -> ParameterValue {
        match parse_numeric_tokens(tokens) {
            Some(mut nums) if nums.len() == 1 => ParameterValue::Scalar(nums.remove(0)),
            Some(nums) => ParameterValue::NumericArray(nums),
            None => ParameterValue::Text(text.to_string()),
        }
    }

    pub fn text(s:impl Into<String>) -> ParameterValue {
        ParameterValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for ParameterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Scalar(x) => write!(f, "{x}"),
            ParameterValue::NumericArray(v) => write!(f, "{}",
                v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")
            ),
            ParameterValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(x: f64) -> Self {
        ParameterValue::Scalar(x)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(v: Vec<f64>) -> Self {
        ParameterValue::NumericArray(v)
    }
}

impl From<String> for ParameterValue {
    fn from(s: String) -> Self {
        ParameterValue::Text(s)
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Text(s.to_string())
    }
}

pub fn is_numeric_token(s:&str) -> bool {
    NUMERIC_TOKEN.is_match(s)
}

/// Parses every token as a float literal. None if the list is empty, a token is not
/// numeric, or a value overflows to infinity (JSON has no non-finite numbers).
pub fn parse_numeric_tokens<S:AsRef<str>>(tokens:&[S]) -> Option<Vec<f64>> {
    if tokens.is_empty() {
        return None
    }
    tokens.iter()
        .map(|t| Some(t.as_ref())
            .filter(|t| is_numeric_token(t))
            .and_then(|t| t.parse::<f64>().ok())
            .filter(|x| x.is_finite())
        )
        .collect()
}

/// `<text>` -> `text`, trimmed
pub fn strip_angle_quotes(s:&str) -> Option<&str> {
    if s.len() >= 2 && s.starts_with('<') && s.ends_with('>') {
        Some(s[1..s.len() - 1].trim())
    }else {
        None
    }
}

/// `( 3, 4 )` -> `3, 4`, trimmed
pub fn strip_parens(s:&str) -> Option<&str> {
    if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        Some(s[1..s.len() - 1].trim())
    }else {
        None
    }
}
