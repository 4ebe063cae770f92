//! Literal argument to named constant resolution (`@IntDef` and friends).

use crate::context::QueryError;
use common::typedef::{ConstantRef, Typedef, TypedefValues};
use common::{RuleDataset, Signature, Source};
use std::fmt;

/// Literal value passed at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue<'a> {
    Integer(i64),
    Text(&'a str),
}

/// What a literal should be rendered as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Constant(ConstantRef),
    /// Bit flags OR-ed together, plus any bits no constant covers.
    Flags {
        value: i64,
        constants: Vec<ConstantRef>,
        remainder: Option<i64>,
    },
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Constant(constant) => f.write_str(&constant.short()),
            Replacement::Flags {
                value,
                constants,
                remainder,
            } => {
                let mut parts: Vec<String> = constants.iter().map(ConstantRef::short).collect();
                if let Some(rest) = remainder {
                    parts.push(rest.to_string());
                }
                write!(f, "{value} = ({})", parts.join(" | "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantResolution {
    pub replacement: Replacement,
    /// Method whose typedef decided the resolution.
    pub declared_on: Signature,
    pub source: Source,
    pub artifact: Option<String>,
}

/// Tries the call's own owner, then each supertype in order. The first owner
/// that declares a typedef for `argument` decides, even if it yields nothing.
pub fn resolve_argument<I, S>(
    dataset: &RuleDataset,
    call: &Signature,
    supertypes: I,
    argument: u32,
    value: ArgValue<'_>,
) -> Result<Option<ConstantResolution>, QueryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if !call.is_method() {
        return Err(QueryError::NotAMethod(call.to_string()));
    }
    let owners = supertypes
        .into_iter()
        .map(|owner| call.with_owner(owner.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    for method in std::iter::once(call).chain(owners.iter()) {
        let Some(typedef) = dataset.typedef_for(method, argument) else {
            continue;
        };
        return Ok(match_value(typedef, value).map(|replacement| ConstantResolution {
            replacement,
            declared_on: method.clone(),
            source: typedef.source,
            artifact: typedef.artifact.clone(),
        }));
    }
    Ok(None)
}

fn match_value(typedef: &Typedef, value: ArgValue<'_>) -> Option<Replacement> {
    match (&typedef.values, value) {
        (TypedefValues::Text(values), ArgValue::Text(text)) => values
            .iter()
            .find(|(candidate, _)| candidate == text)
            .map(|(_, constant)| Replacement::Constant(constant.clone())),
        (TypedefValues::Integral(values), ArgValue::Integer(number)) => {
            let number = typedef.kind.coerce(number);
            if let Some((_, constant)) = values.iter().find(|(candidate, _)| *candidate == number) {
                return Some(Replacement::Constant(constant.clone()));
            }
            if typedef.flag {
                unfold_flags(values, number)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Splits `value` into the declared flags it fully contains. Flags whose bits
/// are already covered by earlier flags are not repeated.
fn unfold_flags(values: &[(i64, ConstantRef)], value: i64) -> Option<Replacement> {
    let mut combined = 0i64;
    let mut constants = Vec::new();
    for (flag, constant) in values {
        let flag = *flag;
        if flag == 0 || value & flag != flag || flag & !combined == 0 {
            continue;
        }
        combined |= flag;
        constants.push(constant.clone());
    }
    if constants.is_empty() {
        return None;
    }
    let rest = value & !combined;
    Some(Replacement::Flags {
        value,
        constants,
        remainder: (rest != 0).then_some(rest),
    })
}
