//! Identifiers for the `tc` object hierarchy managed inside a sidecar.
//!
//! The kernel addresses qdiscs and classes by `major:minor` handles, printed
//! in hexadecimal. This engine keeps a fixed skeleton: an htb root (`1:`)
//! with two classes (`1:1`, `1:2`), each parenting one of two alternating
//! working qdiscs (`2:` and `3:`). At any time exactly one working qdisc is
//! live; the other is the staging side that gets torn down and rebuilt on
//! every update.

use std::fmt;

/// Handle of a `tc` queueing discipline, rendered as `<major>:` in hex
/// (minor is always zero for qdiscs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdiscId(u32);

impl QdiscId {
    pub const fn new(major: u32) -> Self {
        Self(major)
    }

    pub const fn major(self) -> u32 {
        self.0
    }
}

impl fmt::Display for QdiscId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:", self.0)
    }
}

/// Handle of a `tc` class, rendered as `<qdisc major>:<minor>` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassId {
    major: u32,
    minor: u32,
}

impl ClassId {
    /// A class handle under `parent`, e.g. minor 1 under qdisc `3:` is `3:1`.
    pub const fn new(parent: QdiscId, minor: u32) -> Self {
        Self { major: parent.major(), minor }
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.major, self.minor)
    }
}

/// Handle of a `tc` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterId {
    major: u32,
    minor: u32,
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.major, self.minor)
    }
}

/// The always-present htb root qdisc.
pub const ROOT_QDISC_ID: QdiscId = QdiscId::new(1);
/// Working qdisc A, child of root class `1:1`.
pub const QDISC_A_ID: QdiscId = QdiscId::new(2);
/// Working qdisc B, child of root class `1:2`.
pub const QDISC_B_ID: QdiscId = QdiscId::new(3);

/// Root class parenting working qdisc A.
pub const ROOT_CLASS_A_ID: ClassId = ClassId { major: 1, minor: 1 };
/// Root class parenting working qdisc B.
pub const ROOT_CLASS_B_ID: ClassId = ClassId { major: 1, minor: 2 };

/// The root `basic` filter whose `flowid` target decides which working qdisc
/// receives live traffic. Replacing its target is the atomic cutover.
pub const ROOT_FILTER_ID: FilterId = FilterId { major: 1, minor: 0 };

/// Highest qdisc major number taken by the init skeleton (qdisc B's).
pub const LAST_INIT_QDISC_MAJOR: u32 = 3;

/// One of the two alternating working qdiscs.
///
/// Exactly one of them is live at any time; its counterpart is the staging
/// side. Modeled as an enum so "neither A nor B" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingQdisc {
    A,
    B,
}

impl WorkingQdisc {
    /// The counterpart of this working qdisc.
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub const fn qdisc_id(self) -> QdiscId {
        match self {
            Self::A => QDISC_A_ID,
            Self::B => QDISC_B_ID,
        }
    }

    /// The root class this working qdisc hangs off of.
    pub const fn root_class_id(self) -> ClassId {
        match self {
            Self::A => ROOT_CLASS_A_ID,
            Self::B => ROOT_CLASS_B_ID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("unrecognized parent qdisc id '{0}'")]
    UnrecognizedParent(QdiscId),
}

/// Returns the next qdisc handle to allocate under `parent`, given the major
/// number of the most recently allocated qdisc.
///
/// Children of qdisc A take even majors and children of qdisc B odd majors,
/// so the two subtrees never collide no matter how the update calls
/// interleave. Only the working qdiscs are valid parents; passing anything
/// else (the root included) is a caller bug.
pub fn next_unused_qdisc_id(
    parent: QdiscId,
    previous_major: u32,
) -> Result<(QdiscId, u32), IdError> {
    let mut major = previous_major + 1;
    match parent {
        QDISC_A_ID => {
            if major % 2 != 0 {
                major += 1;
            }
        }
        QDISC_B_ID => {
            if major % 2 == 0 {
                major += 1;
            }
        }
        other => return Err(IdError::UnrecognizedParent(other)),
    }
    Ok((QdiscId::new(major), major))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qdisc_a_children_get_even_hex_majors() {
        let expected = [(4, "4:"), (6, "6:"), (8, "8:"), (10, "a:"), (12, "c:"), (14, "e:"), (16, "10:")];

        let mut previous_major = LAST_INIT_QDISC_MAJOR;
        for (expected_major, expected_id) in expected {
            let (id, major) = next_unused_qdisc_id(QDISC_A_ID, previous_major).unwrap();
            assert_eq!(major, expected_major);
            assert_eq!(id.to_string(), expected_id);
            previous_major = major;
        }
    }

    #[test]
    fn qdisc_b_children_get_odd_hex_majors() {
        let expected = [(5, "5:"), (7, "7:"), (9, "9:"), (11, "b:"), (13, "d:"), (15, "f:"), (17, "11:")];

        let mut previous_major = LAST_INIT_QDISC_MAJOR;
        for (expected_major, expected_id) in expected {
            let (id, major) = next_unused_qdisc_id(QDISC_B_ID, previous_major).unwrap();
            assert_eq!(major, expected_major);
            assert_eq!(id.to_string(), expected_id);
            previous_major = major;
        }
    }

    #[test]
    fn root_qdisc_is_not_a_valid_parent() {
        let err = next_unused_qdisc_id(ROOT_QDISC_ID, LAST_INIT_QDISC_MAJOR).unwrap_err();
        assert_eq!(err, IdError::UnrecognizedParent(ROOT_QDISC_ID));
        assert_eq!(err.to_string(), "unrecognized parent qdisc id '1:'");
    }

    #[test]
    fn class_ids_render_in_hex() {
        assert_eq!(ClassId::new(QDISC_B_ID, 1).to_string(), "3:1");
        assert_eq!(ClassId::new(QdiscId::new(10), 12).to_string(), "a:c");
    }

    #[test]
    fn working_qdiscs_alternate() {
        assert_eq!(WorkingQdisc::A.other(), WorkingQdisc::B);
        assert_eq!(WorkingQdisc::B.other(), WorkingQdisc::A);
        assert_eq!(WorkingQdisc::A.other().other(), WorkingQdisc::A);
    }

    #[test]
    fn working_qdisc_handles_match_the_skeleton() {
        assert_eq!(WorkingQdisc::A.qdisc_id(), QDISC_A_ID);
        assert_eq!(WorkingQdisc::A.root_class_id().to_string(), "1:1");
        assert_eq!(WorkingQdisc::B.qdisc_id(), QDISC_B_ID);
        assert_eq!(WorkingQdisc::B.root_class_id().to_string(), "1:2");
        assert_eq!(ROOT_FILTER_ID.to_string(), "1:0");
    }
}
