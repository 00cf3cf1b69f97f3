use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

/// An event of a transition system. Events are opaque to the algorithms in this crate, they
/// only need to be cheap to copy, totally ordered and hashable. One of them may be designated
/// as silent by the caller.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash {
    /// Renders the event for log and error messages.
    fn show(&self) -> String;
}

impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Display> Symbol for S {
    fn show(&self) -> String {
        self.to_string()
    }
}
