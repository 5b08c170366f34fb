use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DataSource, GenerationQuery, ObjectMeta, Report, ScheduledReport};

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    GenerationQuery,
    Report,
    ScheduledReport,
    DataSource,
}

impl Kind {
    pub const ALL: [Kind; 4] = [
        Kind::GenerationQuery,
        Kind::Report,
        Kind::ScheduledReport,
        Kind::DataSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::GenerationQuery => "GenerationQuery",
            Kind::Report => "Report",
            Kind::ScheduledReport => "ScheduledReport",
            Kind::DataSource => "DataSource",
        }
    }

    /// Lowercase plural used in HTTP paths.
    pub fn plural(&self) -> &'static str {
        match self {
            Kind::GenerationQuery => "generationqueries",
            Kind::Report => "reports",
            Kind::ScheduledReport => "scheduledreports",
            Kind::DataSource => "datasources",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the kind name or its lowercase plural.
impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.plural() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown kind {:?}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

// ---------------------------------------------------------------------------
// AnyObject
// ---------------------------------------------------------------------------

/// Kind-tagged union used wherever objects of different kinds travel the
/// same path: the store boundary, watch events, manifests, HTTP bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AnyObject {
    GenerationQuery(GenerationQuery),
    Report(Report),
    ScheduledReport(ScheduledReport),
    DataSource(DataSource),
}

impl AnyObject {
    pub fn kind(&self) -> Kind {
        match self {
            AnyObject::GenerationQuery(_) => Kind::GenerationQuery,
            AnyObject::Report(_) => Kind::Report,
            AnyObject::ScheduledReport(_) => Kind::ScheduledReport,
            AnyObject::DataSource(_) => Kind::DataSource,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            AnyObject::GenerationQuery(o) => &o.metadata,
            AnyObject::Report(o) => &o.metadata,
            AnyObject::ScheduledReport(o) => &o.metadata,
            AnyObject::DataSource(o) => &o.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            AnyObject::GenerationQuery(o) => &mut o.metadata,
            AnyObject::Report(o) => &mut o.metadata,
            AnyObject::ScheduledReport(o) => &mut o.metadata,
            AnyObject::DataSource(o) => &mut o.metadata,
        }
    }

    /// Replace this object's status with `other`'s. Both must be the same
    /// kind; a mismatch leaves `self` unchanged.
    pub fn copy_status_from(&mut self, other: &AnyObject) {
        match (self, other) {
            (AnyObject::GenerationQuery(a), AnyObject::GenerationQuery(b)) => {
                a.status = b.status.clone()
            }
            (AnyObject::Report(a), AnyObject::Report(b)) => a.status = b.status.clone(),
            (AnyObject::ScheduledReport(a), AnyObject::ScheduledReport(b)) => {
                a.status = b.status.clone()
            }
            (AnyObject::DataSource(a), AnyObject::DataSource(b)) => a.status = b.status.clone(),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Resource: typed access to AnyObject
// ---------------------------------------------------------------------------

/// Implemented by each concrete kind so stores and caches can hand out typed
/// values.
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn meta(&self) -> &ObjectMeta;
    fn into_any(self) -> AnyObject;
    fn from_any(obj: AnyObject) -> Result<Self, WrongKind>;
}

/// An `AnyObject` of one kind was read where another kind was expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongKind {
    pub expected: Kind,
    pub got: Kind,
}

impl fmt::Display for WrongKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a {}, got a {}", self.expected, self.got)
    }
}

impl std::error::Error for WrongKind {}

macro_rules! impl_resource {
    ($ty:ident) => {
        impl Resource for $ty {
            const KIND: Kind = Kind::$ty;

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn into_any(self) -> AnyObject {
                AnyObject::$ty(self)
            }

            fn from_any(obj: AnyObject) -> Result<Self, WrongKind> {
                match obj {
                    AnyObject::$ty(o) => Ok(o),
                    other => Err(WrongKind {
                        expected: Kind::$ty,
                        got: other.kind(),
                    }),
                }
            }
        }

        impl From<$ty> for AnyObject {
            fn from(o: $ty) -> Self {
                AnyObject::$ty(o)
            }
        }
    };
}

impl_resource!(GenerationQuery);
impl_resource!(Report);
impl_resource!(ScheduledReport);
impl_resource!(DataSource);
