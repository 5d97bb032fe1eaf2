use std::fmt;

/// Identifies one widget request issued by the coordinator.
///
/// Ids are handed out in strictly increasing order starting at 1 and are never reused for the
/// lifetime of a coordinator. `RequestId::NONE` (0) is the sentinel returned when a request is
/// rejected before it was accepted.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Debug, Default)]
pub struct RequestId(pub u64);

impl RequestId {
    pub const NONE: RequestId = RequestId(0);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }
}

impl fmt::Display for RequestId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
