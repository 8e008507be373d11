//! Job and item lifecycle statuses.
//!
//! Jobs move monotonically `PENDING -> RUNNING -> {DONE, FAILED, CANCELLED}`.
//! Items share the same vocabulary plus `SYSTEM_FAILURE`, which is also the
//! error code stamped on items cancelled by crash reconciliation.

define_text_enum! {
    /// Job lifecycle status.
    JobStatus {
        Pending = "PENDING",
        Running = "RUNNING",
        Done = "DONE",
        Failed = "FAILED",
        Cancelled = "CANCELLED",
    }
}

define_text_enum! {
    /// Item lifecycle status.
    ItemStatus {
        Pending = "PENDING",
        Running = "RUNNING",
        Done = "DONE",
        Failed = "FAILED",
        Cancelled = "CANCELLED",
        SystemFailure = "SYSTEM_FAILURE",
    }
}

impl JobStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}
