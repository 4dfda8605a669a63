//! Line protocol of the text config file
//!
//! One directive per line. Module names and attribute names are matched
//! case-insensitively; values keep their case. Three shapes are accepted:
//!
//! ```text
//! Convolver=on
//! Convolver.file=Convolver/impulse.wav
//! Convolver: enabled file="Convolver/impulse.wav" mode=0 adv="-80;-100;0;0;0;0"
//! ```
//!
//! Anything that does not parse is dropped: unknown modules, unknown
//! attributes, and values of the wrong type.

use loudcal_core::prefs::keys;
use loudcal_core::Namespace;
use serde_json::{json, Value};

/// One parsed config line
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Preference values for one DSP module
    Preferences {
        namespace: Namespace,
        values: Vec<(&'static str, Value)>,
    },
    Loudness(LoudnessDirective),
    /// DSP master switch (`powered_on`)
    MasterSwitch(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoudnessDirective {
    /// Loudness compensation on or off
    Enable(bool),
    /// Apply the preset filter for the controller's current target
    Auto(bool),
    /// Apply the preset filter for a listening level in dB SPL
    Volume(f32),
    /// Set the reference curve from a level in dB SPL
    Reference(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    /// Unsigned integer, stored as its string
    Digits,
    Float,
    /// Graphic EQ node list, stored with a `GraphicEQ: ` prefix
    GraphicEqBands,
}

struct Attribute {
    name: &'static str,
    key: &'static str,
    kind: ValueKind,
    /// Setting this attribute alone also enables the module
    enables: bool,
}

struct Module {
    name: &'static str,
    namespace: Namespace,
    enable_key: Option<&'static str>,
    attributes: &'static [Attribute],
}

impl Module {
    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

const fn attr(name: &'static str, key: &'static str, kind: ValueKind) -> Attribute {
    Attribute {
        name,
        key,
        kind,
        enables: false,
    }
}

const fn file_attr(key: &'static str) -> Attribute {
    Attribute {
        name: "file",
        key,
        kind: ValueKind::Text,
        enables: true,
    }
}

static MODULES: &[Module] = &[
    Module {
        name: "Convolver",
        namespace: Namespace::Convolver,
        enable_key: Some(keys::CONVOLVER_ENABLE),
        attributes: &[
            file_attr(keys::CONVOLVER_FILE),
            attr("mode", keys::CONVOLVER_MODE, ValueKind::Digits),
            attr("adv", keys::CONVOLVER_ADV_IMP, ValueKind::Text),
        ],
    },
    Module {
        name: "GraphicEQ",
        namespace: Namespace::GraphicEq,
        enable_key: Some(keys::GEQ_ENABLE),
        attributes: &[attr("bands", keys::GEQ_NODES, ValueKind::GraphicEqBands)],
    },
    Module {
        name: "Equalizer",
        namespace: Namespace::Equalizer,
        enable_key: Some(keys::EQ_ENABLE),
        attributes: &[
            attr("type", keys::EQ_FILTER_TYPE, ValueKind::Digits),
            attr("mode", keys::EQ_INTERPOLATION, ValueKind::Digits),
            attr("bands", keys::EQ_BANDS, ValueKind::Text),
        ],
    },
    Module {
        name: "BassBoost",
        namespace: Namespace::BassBoost,
        enable_key: Some(keys::BASS_ENABLE),
        attributes: &[attr("gain", keys::BASS_MAX_GAIN, ValueKind::Float)],
    },
    Module {
        name: "Reverb",
        namespace: Namespace::Reverb,
        enable_key: Some(keys::REVERB_ENABLE),
        attributes: &[attr("preset", keys::REVERB_PRESET, ValueKind::Digits)],
    },
    Module {
        name: "StereoWide",
        namespace: Namespace::StereoWide,
        enable_key: Some(keys::STEREOWIDE_ENABLE),
        attributes: &[attr("level", keys::STEREOWIDE_MODE, ValueKind::Float)],
    },
    Module {
        name: "Crossfeed",
        namespace: Namespace::Crossfeed,
        enable_key: Some(keys::CROSSFEED_ENABLE),
        attributes: &[attr("mode", keys::CROSSFEED_MODE, ValueKind::Digits)],
    },
    Module {
        name: "Tube",
        namespace: Namespace::Tube,
        enable_key: Some(keys::TUBE_ENABLE),
        attributes: &[attr("drive", keys::TUBE_DRIVE, ValueKind::Float)],
    },
    Module {
        name: "DDC",
        namespace: Namespace::Ddc,
        enable_key: Some(keys::DDC_ENABLE),
        attributes: &[file_attr(keys::DDC_FILE)],
    },
    Module {
        name: "Liveprog",
        namespace: Namespace::Liveprog,
        enable_key: Some(keys::LIVEPROG_ENABLE),
        attributes: &[file_attr(keys::LIVEPROG_FILE)],
    },
    Module {
        name: "Output",
        namespace: Namespace::Output,
        enable_key: None,
        attributes: &[
            attr("gain", keys::OUTPUT_POSTGAIN, ValueKind::Float),
            attr("limiter_threshold", keys::LIMITER_THRESHOLD, ValueKind::Float),
            attr("limiter_release", keys::LIMITER_RELEASE, ValueKind::Float),
        ],
    },
    Module {
        name: "Compander",
        namespace: Namespace::Compander,
        enable_key: Some(keys::COMPANDER_ENABLE),
        attributes: &[
            attr("timeconstant", keys::COMPANDER_TIMECONSTANT, ValueKind::Float),
            attr("granularity", keys::COMPANDER_GRANULARITY, ValueKind::Float),
            attr("tfresolution", keys::COMPANDER_TFTRANSFORMS, ValueKind::Digits),
            attr("response", keys::COMPANDER_RESPONSE, ValueKind::Text),
        ],
    },
];

/// Shape of the text after the module name
enum Syntax<'a> {
    /// `Module=value`
    Switch(&'a str),
    /// `Module.attr=value`
    Attribute(&'a str, &'a str),
    /// `Module: words key=value ...`
    Block(&'a str),
}

enum Token<'a> {
    Word(&'a str),
    /// `None` when the value has an unterminated quote
    Pair(&'a str, Option<&'a str>),
}

/// Parse one line; `None` for comments, blanks and anything unrecognised
pub fn parse_line(line: &str) -> Option<Directive> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let name_end = line
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(name_end);
    let syntax = parse_syntax(rest.trim_start())?;

    if name.eq_ignore_ascii_case("Loudness") {
        return parse_loudness(syntax).map(Directive::Loudness);
    }
    if name.eq_ignore_ascii_case("MasterSwitch") {
        return parse_master_switch(syntax).map(Directive::MasterSwitch);
    }

    let module = MODULES.iter().find(|m| m.name.eq_ignore_ascii_case(name))?;
    parse_module(module, syntax)
}

fn parse_syntax(rest: &str) -> Option<Syntax<'_>> {
    if let Some(value) = rest.strip_prefix('=') {
        Some(Syntax::Switch(value.trim()))
    } else if let Some(attribute) = rest.strip_prefix('.') {
        let (name, value) = attribute.split_once('=')?;
        Some(Syntax::Attribute(name.trim(), value.trim()))
    } else {
        rest.strip_prefix(':').map(|body| Syntax::Block(body.trim()))
    }
}

fn parse_module(module: &Module, syntax: Syntax<'_>) -> Option<Directive> {
    let mut values = Vec::new();

    match syntax {
        Syntax::Switch(raw) => {
            let key = module.enable_key?;
            values.push((key, Value::Bool(parse_bool(raw)?)));
        }
        Syntax::Attribute(name, raw) => {
            let attribute = module.attribute(name)?;
            let value = convert(attribute.kind, unquote(raw)?)?;
            if attribute.enables {
                if let Some(key) = module.enable_key {
                    values.push((key, Value::Bool(true)));
                }
            }
            values.push((attribute.key, value));
        }
        Syntax::Block(body) => {
            let tokens = tokenize(body);
            if let Some(key) = module.enable_key {
                values.push((key, Value::Bool(block_enabled(&tokens))));
            }
            for token in &tokens {
                let Token::Pair(name, Some(raw)) = token else {
                    continue;
                };
                if let Some(attribute) = module.attribute(name) {
                    if let Some(value) = convert(attribute.kind, raw) {
                        values.push((attribute.key, value));
                    }
                }
            }
        }
    }

    if values.is_empty() {
        return None;
    }
    Some(Directive::Preferences {
        namespace: module.namespace,
        values,
    })
}

fn parse_loudness(syntax: Syntax<'_>) -> Option<LoudnessDirective> {
    match syntax {
        Syntax::Switch(raw) => parse_bool(raw).map(LoudnessDirective::Enable),
        Syntax::Block(body) => block_switch(body).map(LoudnessDirective::Enable),
        Syntax::Attribute(name, raw) => {
            let raw = unquote(raw)?;
            match name.to_ascii_lowercase().as_str() {
                "auto" => parse_bool(raw).map(LoudnessDirective::Auto),
                "volume" => parse_finite(raw).map(LoudnessDirective::Volume),
                "reference" => parse_finite(raw).map(LoudnessDirective::Reference),
                _ => None,
            }
        }
    }
}

fn parse_master_switch(syntax: Syntax<'_>) -> Option<bool> {
    match syntax {
        Syntax::Switch(raw) => parse_bool(raw),
        Syntax::Block(body) => block_switch(body),
        Syntax::Attribute(..) => None,
    }
}

/// Enable state of a block with at least one bare word
fn block_switch(body: &str) -> Option<bool> {
    let tokens = tokenize(body);
    tokens
        .iter()
        .any(|t| matches!(t, Token::Word(_)))
        .then(|| block_enabled(&tokens))
}

/// A block is enabled unless it says `disabled` (or `off`) without also
/// saying `enabled`
fn block_enabled(tokens: &[Token<'_>]) -> bool {
    let words: Vec<Option<bool>> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(parse_bool(w)),
            Token::Pair(..) => None,
        })
        .collect();
    words.contains(&Some(true)) || !words.contains(&Some(false))
}

fn tokenize(body: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let (token, tail) = rest.split_at(token_end(rest));
        tokens.push(match token.split_once('=') {
            Some((name, raw)) => Token::Pair(name, unquote(raw)),
            None => Token::Word(token),
        });
        rest = tail.trim_start();
    }
    tokens
}

/// End of the first whitespace-separated token, honouring double quotes
fn token_end(s: &str) -> usize {
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => return i,
            _ => {}
        }
    }
    s.len()
}

/// Strip one pair of surrounding quotes; `None` if a quote is unterminated
fn unquote(raw: &str) -> Option<&str> {
    match raw.strip_prefix('"') {
        Some(inner) => inner.strip_suffix('"'),
        None => Some(raw),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "enabled" | "true" | "1" => Some(true),
        "off" | "disabled" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_finite(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

fn convert(kind: ValueKind, raw: &str) -> Option<Value> {
    match kind {
        ValueKind::Text => (!raw.is_empty()).then(|| Value::from(raw)),
        ValueKind::Digits => {
            (!raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())).then(|| Value::from(raw))
        }
        ValueKind::Float => parse_finite(raw).map(|v| json!(v)),
        ValueKind::GraphicEqBands => {
            (!raw.is_empty()).then(|| Value::from(format!("GraphicEQ: {}", raw)))
        }
    }
}
