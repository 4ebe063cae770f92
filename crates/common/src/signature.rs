//! # Signatures: Canonical API Identifiers
//!
//! A [`Signature`] names a class, a field, or a method. Every signature is
//! normalized into exactly one text form before it is indexed or compared:
//!
//! | kind   | canonical text                          |
//! |--------|-----------------------------------------|
//! | class  | `android.webkit.WebView`                |
//! | field  | `android.view.View#VISIBLE`             |
//! | method | `android.webkit.WebView#clearCache(boolean)` |
//!
//! Owners accept dotted, slashed (`android/view/View`) and JVM object
//! descriptor (`Landroid/view/View;`) spellings. Nested classes use `.`
//! (`Outer$Inner` becomes `Outer.Inner`). Parameter lists accept Java source
//! types or a full JVM method descriptor (`(ZLjava/lang/String;)V`).
//! Unqualified names are never widened: `String` and `java.lang.String` stay
//! distinct.

use std::fmt;
use std::str::FromStr;

/// Errors produced while normalizing signature text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("empty signature")]
    Empty,
    #[error("invalid owner `{0}`")]
    InvalidOwner(String),
    #[error("invalid member name `{0}`")]
    InvalidMember(String),
    #[error("invalid parameter type `{0}`")]
    InvalidType(String),
    #[error("unbalanced parameter list in `{0}`")]
    UnbalancedParams(String),
    #[error("invalid JVM descriptor `{0}`")]
    InvalidDescriptor(String),
}

/// Member part of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Member {
    Field { name: String },
    Method { name: String, params: Vec<String> },
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Field { name } | Member::Method { name, .. } => name,
        }
    }
}

/// Canonical identifier for a class, field, or method.
///
/// Immutable value: equality, ordering and hashing are structural over the
/// normalized parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    owner: String,
    member: Option<Member>,
}

impl Signature {
    /// Class-level signature.
    pub fn class(owner: &str) -> Result<Self, SignatureError> {
        Ok(Self {
            owner: normalize_owner(owner)?,
            member: None,
        })
    }

    /// Field signature.
    pub fn field(owner: &str, name: &str) -> Result<Self, SignatureError> {
        Ok(Self {
            owner: normalize_owner(owner)?,
            member: Some(Member::Field {
                name: normalize_member_name(name)?,
            }),
        })
    }

    /// Method signature from Java source parameter types.
    ///
    /// # Examples
    /// ```
    /// # use common::signature::Signature;
    /// let sig = Signature::method("android/webkit/WebView", "clearCache", ["boolean"]).unwrap();
    /// assert_eq!(sig.to_string(), "android.webkit.WebView#clearCache(boolean)");
    /// ```
    pub fn method<I, S>(owner: &str, name: &str, params: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params = params
            .into_iter()
            .map(|p| normalize_type(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            owner: normalize_owner(owner)?,
            member: Some(Member::Method {
                name: normalize_member_name(name)?,
                params,
            }),
        })
    }

    /// Parses any accepted spelling into the canonical signature.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SignatureError::Empty);
        }
        let Some((owner, member)) = text.split_once('#') else {
            return Self::class(text);
        };
        Ok(Self {
            owner: normalize_owner(owner)?,
            member: Some(parse_member(member.trim(), text)?),
        })
    }

    /// Dotted owner class name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn member(&self) -> Option<&Member> {
        self.member.as_ref()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_ref().map(Member::name)
    }

    pub fn is_class(&self) -> bool {
        self.member.is_none()
    }

    pub fn is_method(&self) -> bool {
        matches!(self.member, Some(Member::Method { .. }))
    }

    /// Same member declared on a different owner (used for supertype walks).
    pub fn with_owner(&self, owner: &str) -> Result<Self, SignatureError> {
        Ok(Self {
            owner: normalize_owner(owner)?,
            member: self.member.clone(),
        })
    }

    /// Owner ancestry chain, most specific first.
    ///
    /// `com.android.internal.Foo` yields `com.android.internal.Foo`,
    /// `com.android.internal`, `com.android`, `com`.
    pub fn owner_ancestry(&self) -> OwnerAncestry<'_> {
        OwnerAncestry {
            next: Some(&self.owner),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.owner)?;
        match &self.member {
            None => Ok(()),
            Some(Member::Field { name }) => write!(f, "#{name}"),
            Some(Member::Method { name, params }) => write!(f, "#{name}({})", params.join(",")),
        }
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Iterator over an owner and its enclosing prefixes.
#[derive(Debug, Clone)]
pub struct OwnerAncestry<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for OwnerAncestry<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let current = self.next?;
        self.next = current.rfind('.').map(|idx| &current[..idx]);
        Some(current)
    }
}

/// Key of a rule record: one exact signature, or every signature below an
/// owner prefix (text form `prefix.*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignaturePattern {
    Exact(Signature),
    OwnerPrefix(String),
}

impl SignaturePattern {
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let text = text.trim();
        match text.strip_suffix(".*") {
            Some(prefix) if !prefix.contains('#') => normalize_owner(prefix).map(Self::OwnerPrefix),
            _ => Signature::parse(text).map(Self::Exact),
        }
    }

    pub fn owner_prefix(prefix: &str) -> Result<Self, SignatureError> {
        canonical_prefix(prefix).map(Self::OwnerPrefix)
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, SignaturePattern::OwnerPrefix(_))
    }
}

impl fmt::Display for SignaturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignaturePattern::Exact(sig) => sig.fmt(f),
            SignaturePattern::OwnerPrefix(prefix) => write!(f, "{prefix}.*"),
        }
    }
}

impl From<Signature> for SignaturePattern {
    fn from(sig: Signature) -> Self {
        SignaturePattern::Exact(sig)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonical text of an owner prefix. Accepts the owner spellings of
/// [`Signature::class`] with or without a trailing `.*`.
pub fn canonical_prefix(raw: &str) -> Result<String, SignatureError> {
    let trimmed = raw.trim();
    normalize_owner(trimmed.strip_suffix(".*").unwrap_or(trimmed))
}

fn normalize_owner(raw: &str) -> Result<String, SignatureError> {
    let trimmed = raw.trim();
    let unwrapped = trimmed
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(trimmed);
    let owner: String = unwrapped
        .chars()
        .map(|c| if c == '/' || c == '$' { '.' } else { c })
        .collect();
    if owner.is_empty() || !owner.split('.').all(is_name_segment) {
        return Err(SignatureError::InvalidOwner(trimmed.to_owned()));
    }
    Ok(owner)
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn normalize_member_name(raw: &str) -> Result<String, SignatureError> {
    let name = raw.trim();
    let valid = matches!(name, "<init>" | "<clinit>")
        || (!name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
    if valid {
        Ok(name.to_owned())
    } else {
        Err(SignatureError::InvalidMember(name.to_owned()))
    }
}

fn parse_member(raw: &str, full: &str) -> Result<Member, SignatureError> {
    let Some(open) = raw.find('(') else {
        return Ok(Member::Field {
            name: normalize_member_name(raw)?,
        });
    };
    let close = raw
        .rfind(')')
        .filter(|&close| close > open)
        .ok_or_else(|| SignatureError::UnbalancedParams(full.to_owned()))?;

    let name = normalize_member_name(&raw[..open])?;
    let inner = &raw[open + 1..close];
    let tail = raw[close + 1..].trim();

    // Anything after `)` is a JVM return type: the whole thing is a descriptor.
    let params = if tail.is_empty() {
        split_source_params(inner, full)?
            .into_iter()
            .map(normalize_type)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        parse_jvm_return(tail)?;
        parse_jvm_params(inner)?
    };
    Ok(Member::Method { name, params })
}

/// Splits a source parameter list on top-level commas (generic arguments
/// may contain commas of their own).
fn split_source_params<'a>(inner: &'a str, full: &str) -> Result<Vec<&'a str>, SignatureError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(SignatureError::UnbalancedParams(full.to_owned()));
        }
    }
    if depth != 0 {
        return Err(SignatureError::UnbalancedParams(full.to_owned()));
    }
    parts.push(&inner[start..]);
    Ok(parts)
}

/// Normalizes one Java source type: strips whitespace and generic arguments,
/// turns varargs into an array dimension.
fn normalize_type(raw: &str) -> Result<String, SignatureError> {
    let mut compact = String::with_capacity(raw.len());
    let mut depth = 0i32;
    for c in raw.chars().filter(|c| !c.is_whitespace()) {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            _ if depth == 0 => compact.push(c),
            _ => {}
        }
        if depth < 0 {
            return Err(SignatureError::InvalidType(raw.trim().to_owned()));
        }
    }
    if depth != 0 {
        return Err(SignatureError::InvalidType(raw.trim().to_owned()));
    }

    let mut base = compact.as_str();
    let mut dims = 0usize;
    if let Some(stripped) = base.strip_suffix("...") {
        base = stripped;
        dims += 1;
    }
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dims += 1;
    }
    let base = normalize_owner(base).map_err(|_| SignatureError::InvalidType(raw.trim().to_owned()))?;
    Ok(format!("{base}{}", "[]".repeat(dims)))
}

fn parse_jvm_params(inner: &str) -> Result<Vec<String>, SignatureError> {
    let mut params = Vec::new();
    let mut rest = inner;
    while !rest.is_empty() {
        let (ty, remaining) = parse_jvm_type(rest, inner)?;
        params.push(ty);
        rest = remaining;
    }
    Ok(params)
}

fn parse_jvm_return(tail: &str) -> Result<(), SignatureError> {
    if tail == "V" {
        return Ok(());
    }
    match parse_jvm_type(tail, tail)? {
        (_, "") => Ok(()),
        _ => Err(SignatureError::InvalidDescriptor(tail.to_owned())),
    }
}

/// Parses one JVM field type from the front of `input`, returning the Java
/// source spelling and the unparsed remainder.
fn parse_jvm_type<'a>(input: &'a str, context: &str) -> Result<(String, &'a str), SignatureError> {
    let invalid = || SignatureError::InvalidDescriptor(context.to_owned());
    let dims = input.chars().take_while(|&c| c == '[').count();
    let rest = &input[dims..];
    let mut chars = rest.chars();
    let tag = chars.next().ok_or_else(invalid)?;
    let (base, remaining) = match tag {
        'B' => ("byte".to_owned(), &rest[1..]),
        'C' => ("char".to_owned(), &rest[1..]),
        'D' => ("double".to_owned(), &rest[1..]),
        'F' => ("float".to_owned(), &rest[1..]),
        'I' => ("int".to_owned(), &rest[1..]),
        'J' => ("long".to_owned(), &rest[1..]),
        'S' => ("short".to_owned(), &rest[1..]),
        'Z' => ("boolean".to_owned(), &rest[1..]),
        'L' => {
            let end = rest.find(';').ok_or_else(invalid)?;
            let owner = normalize_owner(&rest[1..end]).map_err(|_| invalid())?;
            (owner, &rest[end + 1..])
        }
        _ => return Err(invalid()),
    };
    Ok((format!("{base}{}", "[]".repeat(dims)), remaining))
}
