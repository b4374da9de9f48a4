/// Outcome of the security engine, ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Decision {
    Allow,
    Ask,
    Block,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Ask => "ask",
            Decision::Block => "block",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Ask => "ASK",
            Decision::Block => "BLOCK",
        }
    }
}

/// A decision plus the reason it was reached.
///
/// `fail_closed` marks a block that was issued because the input or the
/// policy could not be validated, as opposed to a rule that matched. The
/// transport layer turns it into the abnormal exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub decision: Decision,
    pub reason: String,
    pub fail_closed: bool,
}

impl RuleMatch {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
            fail_closed: false,
        }
    }

    pub fn ask(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Ask,
            reason: reason.into(),
            fail_closed: false,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            reason: reason.into(),
            fail_closed: false,
        }
    }

    /// Block because validation could not run.
    pub fn fail_closed(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            reason: reason.into(),
            fail_closed: true,
        }
    }
}
