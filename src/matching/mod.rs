pub mod graph;
pub mod union_find;

pub use graph::{Cluster, DuplicateGraph, Linkage, cluster};
pub use union_find::UnionFind;

use crate::models::AddressRecord;

/// Pairwise duplicate predicate. Implementations must be symmetric; they need
/// not be transitive, since clustering follows graph connectivity.
pub trait Matcher {
    fn matches(&self, a: &AddressRecord, b: &AddressRecord) -> bool;
}

/// Exact equality on number and unit, token-normalized equality on street.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressMatcher;

impl Matcher for AddressMatcher {
    fn matches(&self, a: &AddressRecord, b: &AddressRecord) -> bool {
        a.number == b.number && a.street_normal() == b.street_normal() && a.unit == b.unit
    }
}

/// Adapts a closure into a [`Matcher`].
pub struct FnMatcher<F>(pub F);

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&AddressRecord, &AddressRecord) -> bool,
{
    fn matches(&self, a: &AddressRecord, b: &AddressRecord) -> bool {
        (self.0)(a, b)
    }
}
