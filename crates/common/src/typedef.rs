//! `@IntDef` / `@LongDef` / `@StringDef` constant rules.
//!
//! A typedef rule says "argument N of this method takes one of these named
//! constants". The archived form stores constant *names*; the values come
//! from a separate constants table and are joined at load time.

use crate::Source;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value domain of a typedef.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Deserialize,
    Serialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TypedefKind {
    Int = 0,
    Long = 1,
    #[serde(rename = "string")]
    Str = 2,
}

impl TypedefKind {
    /// AndroidX annotation that declares this kind.
    pub fn annotation(self) -> &'static str {
        match self {
            TypedefKind::Int => "androidx.annotation.IntDef",
            TypedefKind::Long => "androidx.annotation.LongDef",
            TypedefKind::Str => "androidx.annotation.StringDef",
        }
    }

    /// Value an argument of this kind actually carries. An `Int` argument
    /// holds 32 bits, so a value in `0..=u32::MAX` is read as its bit
    /// pattern (`0x80000001` is `-2147483647`).
    pub fn coerce(self, value: i64) -> i64 {
        match (self, u32::try_from(value)) {
            (TypedefKind::Int, Ok(bits)) => i64::from(bits as i32),
            _ => value,
        }
    }
}

/// Archived typedef rule, keyed by canonical method signature text.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct TypedefEntry {
    pub method: String,
    /// 0-based index into the declared parameters (receiver excluded).
    pub argument: u32,
    pub kind: TypedefKind,
    /// `true` for bit-flag typedefs whose values may be OR-ed together.
    pub flag: bool,
    /// Qualified constant names, e.g. `android.view.View.VISIBLE`.
    pub constants: Vec<String>,
    pub source: Source,
    pub artifact: Option<String>,
}

/// Archived constants table row: qualified name → literal text.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct ConstantEntry {
    pub name: String,
    pub value: String,
}

/// A named constant, split into declaring class and field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerdeSerialize)]
pub struct ConstantRef {
    pub owner: String,
    pub name: String,
}

impl ConstantRef {
    /// Splits `android.view.View.VISIBLE` at the last `.`.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (owner, name) = qualified.rsplit_once('.')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }

    /// `View.VISIBLE`: the form a decompiler renders for a static field.
    pub fn short(&self) -> String {
        let simple = self.owner.rsplit('.').next().unwrap_or(&self.owner);
        format!("{simple}.{}", self.name)
    }
}

impl fmt::Display for ConstantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Resolved constant values of one typedef, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedefValues {
    Integral(Vec<(i64, ConstantRef)>),
    Text(Vec<(String, ConstantRef)>),
}

impl TypedefValues {
    pub fn len(&self) -> usize {
        match self {
            TypedefValues::Integral(values) => values.len(),
            TypedefValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runtime typedef rule with constant values joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub argument: u32,
    pub kind: TypedefKind,
    pub flag: bool,
    pub values: TypedefValues,
    pub source: Source,
    pub artifact: Option<String>,
}

impl Typedef {
    /// Joins an archived entry with the constants table.
    ///
    /// Names that are malformed, missing from the table, or whose value does
    /// not parse for the typedef kind are logged and skipped.
    pub fn resolve(entry: &TypedefEntry, constants: &BTreeMap<String, String>) -> Self {
        let mut integral = Vec::new();
        let mut text = Vec::new();

        for qualified in &entry.constants {
            let Some(constant) = ConstantRef::parse(qualified) else {
                tracing::warn!(constant = %qualified, method = %entry.method, "ignored invalid constant name");
                continue;
            };
            let Some(raw) = constants.get(qualified) else {
                tracing::warn!(constant = %qualified, method = %entry.method, "no constant value found");
                continue;
            };
            match entry.kind {
                TypedefKind::Str => text.push((raw.clone(), constant)),
                kind => match parse_literal(raw, kind) {
                    Some(value) => integral.push((value, constant)),
                    None => {
                        tracing::warn!(constant = %qualified, value = %raw, "invalid constant value");
                    }
                },
            }
        }

        let values = match entry.kind {
            TypedefKind::Str => TypedefValues::Text(text),
            TypedefKind::Int | TypedefKind::Long => TypedefValues::Integral(integral),
        };
        Self {
            argument: entry.argument,
            kind: entry.kind,
            flag: entry.flag,
            values,
            source: entry.source,
            artifact: entry.artifact.clone(),
        }
    }
}

/// Parses decimal or `0x` hex literal text for `kind`.
///
/// Hex literals are bit patterns: `0xFFFFFFFF` is `-1` as an `Int`.
/// Decimal `Int` values must fit in 32 bits. Returns `None` for `Str`.
pub fn parse_literal(raw: &str, kind: TypedefKind) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .filter(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()));

    match (kind, hex) {
        (TypedefKind::Str, _) => None,
        (TypedefKind::Int, Some(hex)) => {
            let bits = u32::from_str_radix(hex, 16).ok()? as i32;
            Some(i64::from(if negative { bits.wrapping_neg() } else { bits }))
        }
        (TypedefKind::Long, Some(hex)) => {
            let bits = u64::from_str_radix(hex, 16).ok()? as i64;
            Some(if negative { bits.wrapping_neg() } else { bits })
        }
        (TypedefKind::Int, None) => raw.parse::<i32>().ok().map(i64::from),
        (TypedefKind::Long, None) => raw.parse::<i64>().ok(),
    }
}
