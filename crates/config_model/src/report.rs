use config_store::ConfigDefinition;
use std::fmt;

/// Outcome of binding one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberStatus {
    /// Newly bound in this pass.
    Bound,
    /// Already bound to the same file; nothing was done.
    Unchanged,
    /// A pre-bind hook opted out of the standard binding.
    Skipped,
    /// The member slot was empty and has been filled with an unbound default.
    Uninitialized,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberReport {
    pub name: String,
    /// Settings the member is bound to; arrays report one per element.
    pub definitions: Vec<ConfigDefinition>,
    pub status: MemberStatus,
}

/// Summary of a model bind, one entry per registered member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Why the whole bind was abandoned before any member was touched.
    pub aborted: Option<String>,
    pub members: Vec<MemberReport>,
}

impl BindReport {
    pub(crate) fn aborted(reason: impl Into<String>) -> Self {
        Self {
            aborted: Some(reason.into()),
            members: Vec::new(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// True when the bind ran and every member ended up bound or unchanged.
    pub fn is_success(&self) -> bool {
        !self.is_aborted()
            && self
                .members
                .iter()
                .all(|m| matches!(m.status, MemberStatus::Bound | MemberStatus::Unchanged | MemberStatus::Skipped))
    }

    pub fn member(&self, name: &str) -> Option<&MemberReport> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn count(&self, status: &MemberStatus) -> usize {
        self.members.iter().filter(|m| &m.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MemberReport> {
        self.members
            .iter()
            .filter(|m| matches!(m.status, MemberStatus::Failed(_) | MemberStatus::Uninitialized))
    }
}

impl fmt::Display for BindReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.aborted {
            return write!(f, "aborted: {reason}");
        }
        write!(
            f,
            "{} bound, {} unchanged, {} skipped, {} failed",
            self.count(&MemberStatus::Bound),
            self.count(&MemberStatus::Unchanged),
            self.count(&MemberStatus::Skipped),
            self.failures().count()
        )
    }
}
