use std::fmt;

/// Lifecycle phases of a single seed crawl
///
/// A seed moves strictly forward: `Pending → Crawling → Draining → Done`.
/// `Pending` may also jump straight to `Done` when the seed is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedPhase {
    /// Seed accepted, waiting for a global crawl slot
    Pending,

    /// Workers are fetching pages and admitting links
    Crawling,

    /// Queue is closed; buffered pages are being archived and handed off
    Draining,

    /// Batch handed to delivery, final counts published
    Done,
}

impl SeedPhase {
    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: SeedPhase) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Crawling)
                | (Self::Pending, Self::Done)
                | (Self::Crawling, Self::Draining)
                | (Self::Draining, Self::Done)
        )
    }

    /// Returns true once nothing more will happen for this seed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
