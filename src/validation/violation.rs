//! Path-tagged validation violations
//!
//! The validator never stops at the first problem; every violation found in
//! a document is collected into a [`ValidationErrors`] value.

use crate::validation::document::ParameterType;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a field inside a publish document, e.g.
/// `components[2].parameters[0].default`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// The document itself
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<document>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Syntax { message: String },
    UnsupportedExtension { extension: String },
    Missing,
    Empty,
    UnknownKey,
    WrongType { expected: &'static str, found: String },
    InvalidVersion { literal: String },
    UnknownParameterType { literal: String },
    InvalidChoice { literal: String, allowed: &'static [&'static str] },
    TypeMismatch { declared: ParameterType, literal: String },
    OutOfRange { literal: String, bound: String },
    NotAllowed { literal: String },
    InvalidConstraint { message: String },
    FileNotFound { path: String },
    Duplicate { value: String },
    UnresolvedReference { name: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message } => write!(f, "invalid syntax: {}", message),
            Self::UnsupportedExtension { extension } => write!(
                f,
                "unsupported file extension {:?} (expected .yaml, .yml or .json)",
                extension
            ),
            Self::Missing => f.write_str("required field is missing"),
            Self::Empty => f.write_str("must not be empty"),
            Self::UnknownKey => f.write_str("unknown field"),
            Self::WrongType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            Self::InvalidVersion { literal } => write!(
                f,
                "{:?} is not a well-formed version (expected MAJOR.MINOR[.PATCH])",
                literal
            ),
            Self::UnknownParameterType { literal } => write!(
                f,
                "unknown parameter type {:?} (expected string, int, float, bool or date)",
                literal
            ),
            Self::InvalidChoice { literal, allowed } => {
                write!(f, "{:?} is not one of {}", literal, allowed.join(", "))
            }
            Self::TypeMismatch { declared, literal } => {
                write!(f, "type mismatch: {:?} is not a valid {} literal", literal, declared)
            }
            Self::OutOfRange { literal, bound } => {
                write!(f, "{} is out of range ({})", literal, bound)
            }
            Self::NotAllowed { literal } => {
                write!(f, "{} is not in the allowed set", literal)
            }
            Self::InvalidConstraint { message } => write!(f, "invalid constraint: {}", message),
            Self::FileNotFound { path } => write!(f, "file not found or unreadable: {}", path),
            Self::Duplicate { value } => write!(f, "duplicate value {:?}", value),
            Self::UnresolvedReference { name } => {
                write!(f, "{:?} does not name an application of the container", name)
            }
        }
    }
}

/// One violated constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: FieldPath, kind: ViolationKind) -> Self {
        Self { path, kind }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

/// Aggregate of every violation found in one document. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    pub fn single(path: FieldPath, kind: ViolationKind) -> Self {
        Self::new(vec![Violation::new(path, kind)])
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Rendered paths, in discovery order
    pub fn paths(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.path.to_string()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "publish file is invalid ({} violation{})",
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
