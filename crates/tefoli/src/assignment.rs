//! Assignment traversal
//!
//! The extension exposes the values of a model through a cursor protocol:
//! `assignment_begin` yields an initial cursor and every successful
//! `assignment_next` moves it to the next index. The iterators below wrap
//! that protocol for one solver thread.

use crate::error::TheoryResult;
use crate::theory::Theory;
use crate::value::{Symbol, Value};
use std::iter::FusedIterator;

/// Indices of the current assignment, including unassigned ones
#[derive(Debug)]
pub struct AssignmentIndices<'a> {
    theory: &'a Theory,
    thread_id: u32,
    cursor: usize,
    finished: bool,
}

impl<'a> AssignmentIndices<'a> {
    pub(crate) fn begin(theory: &'a Theory, thread_id: u32) -> TheoryResult<Self> {
        let cursor = theory.assignment_begin(thread_id)?;
        Ok(Self {
            theory,
            thread_id,
            cursor,
            finished: false,
        })
    }

    /// Thread whose model is traversed
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }
}

impl Iterator for AssignmentIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.finished {
            return None;
        }
        match self.theory.assignment_next(self.thread_id, &mut self.cursor) {
            Ok(true) => Some(self.cursor),
            // Only fails once the theory is destroyed, which ends the traversal too
            Ok(false) | Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl FusedIterator for AssignmentIndices<'_> {}

/// Symbol/value pairs of the current assignment
///
/// Entries without a value are skipped. The first error is yielded once and
/// ends the traversal.
#[derive(Debug)]
pub struct Assignment<'a> {
    indices: AssignmentIndices<'a>,
    failed: bool,
}

impl<'a> Assignment<'a> {
    pub(crate) fn begin(theory: &'a Theory, thread_id: u32) -> TheoryResult<Self> {
        Ok(Self {
            indices: AssignmentIndices::begin(theory, thread_id)?,
            failed: false,
        })
    }

    fn entry(&self, index: usize) -> TheoryResult<Option<(Symbol, Value)>> {
        let theory = self.indices.theory;
        let thread_id = self.indices.thread_id;
        if !theory.has_value(thread_id, index)? {
            return Ok(None);
        }
        let symbol = theory.get_symbol(index)?;
        let value = theory.get_value(thread_id, index)?;
        Ok(Some((symbol, value)))
    }
}

impl Iterator for Assignment<'_> {
    type Item = TheoryResult<(Symbol, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(index) = self.indices.next() {
            match self.entry(index) {
                Ok(Some(pair)) => return Some(Ok(pair)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl FusedIterator for Assignment<'_> {}
