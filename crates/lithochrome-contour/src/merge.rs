//! Downward merge of layer outlines.
//!
//! A printed layer must rest on material. Walking the stack from the top,
//! every outline is grown to include everything printed above it.

use std::time::Instant;

use crate::extract::LayerStack;
use crate::ops;

/// New stack where each `(filament, layers)` outline is the union of its own
/// outline and every outline above it in print order.
///
/// Print order runs by filament, then by layer count; the topmost pair keeps
/// its own outline.
pub fn merge_downward(stack: &LayerStack) -> LayerStack {
    let start = Instant::now();
    let mut merged: LayerStack = stack
        .iter()
        .map(|ladder| vec![ops::empty(); ladder.len()])
        .collect();

    let mut running = None;
    for (i, ladder) in stack.iter().enumerate().rev() {
        for (rung, own) in ladder.iter().enumerate().rev() {
            let result = match &running {
                None => own.clone(),
                Some(above) => ops::union(own, above),
            };
            merged[i][rung] = result.clone();
            running = Some(result);
        }
    }
    log::debug!("merged {} ladders in {:.2?}", stack.len(), start.elapsed());
    merged
}
