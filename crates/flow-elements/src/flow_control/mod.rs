//! Flow control elements
//!
//! Entry and exit points plus the branching elements that open and close
//! outgoing edges at runtime.

mod case;
mod end;
mod flow_select;
mod start;

pub use case::{CaseElement, Comparator, Condition};
pub use end::EndElement;
pub use flow_select::FlowSelectElement;
pub use start::StartElement;
