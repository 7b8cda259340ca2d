//! Lazy sequence combinators used by adjacency traversal.

use crate::types::{GraphError, Iid};

/// Boxed lazy sequence of vertex IIDs.
pub type VertexIter<'a> = Box<dyn Iterator<Item = Result<Iid, GraphError>> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    First,
    Second,
    Done,
}

/// Concatenation of two sequences with an explicit state.
///
/// Once the first sequence is exhausted it is never polled again, and once
/// both are exhausted the link stays exhausted.
#[derive(Debug)]
pub struct Link<A, B> {
    first: A,
    second: B,
    state: LinkState,
}

/// Yield every item of `first`, then every item of `second`.
pub fn link<A, B>(first: A, second: B) -> Link<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator<Item = A::Item>,
{
    Link {
        first: first.into_iter(),
        second: second.into_iter(),
        state: LinkState::First,
    }
}

impl<A, B> Iterator for Link<A, B>
where
    A: Iterator,
    B: Iterator<Item = A::Item>,
{
    type Item = A::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                LinkState::First => match self.first.next() {
                    Some(item) => return Some(item),
                    None => self.state = LinkState::Second,
                },
                LinkState::Second => match self.second.next() {
                    Some(item) => return Some(item),
                    None => self.state = LinkState::Done,
                },
                LinkState::Done => return None,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
