//! Concat operator: union of several input streams in input order.
//!
//! Concat is the merge point of OR filter branches; every branch reads a
//! duplicate of the same stateless upstream, so pushes reach each branch
//! once and the union may contain duplicates. A Distinct downstream
//! collapses them.

use crate::fetch::{FetchMode, FetchRequest};
use crate::operators::{OperatorNode, OperatorRef};
use crate::source::SourceChange;
use alloc::vec::Vec;
use rill_core::{Change, Error, Node, Result, TableSchema};

#[derive(Debug)]
pub struct Concat {
    inputs: Vec<OperatorNode>,
}

impl Concat {
    /// Creates a concat over the branches; at least one is required.
    pub fn new(inputs: Vec<OperatorNode>) -> Result<Self> {
        if inputs.is_empty() {
            return Err(Error::invariant("concat requires at least one input"));
        }
        Ok(Self { inputs })
    }

    pub fn schema(&self) -> &TableSchema {
        self.inputs[0].schema()
    }

    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        let mut out = Vec::new();
        for input in &mut self.inputs {
            out.extend(input.pull(mode, request));
        }
        out
    }

    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        let mut out = Vec::new();
        for input in &mut self.inputs {
            out.extend(input.push_source(table, change)?);
        }
        Ok(out)
    }

    pub fn destroy(&mut self) {
        for input in &mut self.inputs {
            input.destroy();
        }
    }

    pub fn contains(&self, target: &OperatorRef) -> bool {
        self.inputs.iter().any(|input| input.contains(target))
    }

    pub fn duplicate_stateless(&self) -> Result<Concat> {
        let inputs = self
            .inputs
            .iter()
            .map(|input| input.duplicate_stateless())
            .collect::<Result<Vec<_>>>()?;
        Ok(Concat { inputs })
    }

    pub fn storage_is_empty(&self) -> bool {
        self.inputs.iter().all(|input| input.storage_is_empty())
    }
}
