//! Non-repeating random traversal over a view.
//!
//! Every entry of the view is served once per cycle. When a cycle runs out the
//! view is reshuffled, and the new cycle never opens with the entry that closed
//! the previous one (unless the view holds a single entry).

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::collection::{Collection, EntryId};
use crate::error::{AppError, Result};
use crate::ordering::{build_view, ViewSpec};

pub struct RandomSequencer<R = StdRng> {
    rng: R,
    spec: ViewSpec,
    generation: u64,
    permutation: Vec<EntryId>,
    cursor: usize,
    last_served: Option<EntryId>,
    cycles: u64,
}

impl RandomSequencer<StdRng> {
    /// Sequencer seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Sequencer with a reproducible traversal order.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomSequencer<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomSequencer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            spec: ViewSpec::default(),
            generation: 0,
            permutation: Vec::new(),
            cursor: 0,
            last_served: None,
            cycles: 0,
        }
    }

    /// (Re)start over `spec` applied to `collection`, forgetting all history.
    pub fn start(&mut self, collection: &Collection, spec: ViewSpec) {
        self.spec = spec;
        self.generation = collection.generation();
        self.last_served = None;
        self.cycles = 0;
        self.shuffle(collection);
    }

    /// Serve the next entry, reshuffling when the current cycle is used up.
    ///
    /// Fails with [`AppError::StaleGeneration`] if `collection` changed since
    /// [`start`](Self::start), and with [`AppError::EmptyView`] if there is
    /// nothing to serve.
    pub fn next(&mut self, collection: &Collection) -> Result<EntryId> {
        self.ensure_current(collection)?;
        if self.cursor >= self.permutation.len() && self.shuffle(collection) == 0 {
            return Err(AppError::EmptyView);
        }
        let id = self.permutation[self.cursor];
        self.cursor += 1;
        self.last_served = Some(id);
        Ok(id)
    }

    /// Step back to the entry served before the current one.
    ///
    /// Returns `None` at the start of the cycle's history. Never draws.
    pub fn previous(&mut self, collection: &Collection) -> Result<Option<EntryId>> {
        self.ensure_current(collection)?;
        if self.cursor < 2 {
            return Ok(None);
        }
        self.cursor -= 1;
        let id = self.permutation[self.cursor - 1];
        self.last_served = Some(id);
        Ok(Some(id))
    }

    /// Whether the sequencer was started on this generation of `collection`.
    pub fn is_current(&self, collection: &Collection) -> bool {
        self.generation == collection.generation()
    }

    pub fn spec(&self) -> &ViewSpec {
        &self.spec
    }

    pub fn permutation(&self) -> &[EntryId] {
        &self.permutation
    }

    /// Index of the next entry to serve.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn last_served(&self) -> Option<EntryId> {
        self.last_served
    }

    /// Number of shuffles since the last start (the start itself counts).
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn ensure_current(&self, collection: &Collection) -> Result<()> {
        if self.is_current(collection) {
            Ok(())
        } else {
            Err(AppError::StaleGeneration {
                expected: self.generation,
                actual: collection.generation(),
            })
        }
    }

    /// Draw a fresh permutation of the view and rewind. Returns its length.
    fn shuffle(&mut self, collection: &Collection) -> usize {
        let mut permutation = build_view(collection, &self.spec).ids().to_vec();
        permutation.shuffle(&mut self.rng);

        if permutation.len() > 1 && self.last_served == Some(permutation[0]) {
            let swap_with = self.rng.random_range(1..permutation.len());
            permutation.swap(0, swap_with);
        }

        debug!(
            "sequencer: shuffled {} entries (cycle {})",
            permutation.len(),
            self.cycles + 1
        );
        self.permutation = permutation;
        self.cursor = 0;
        self.cycles += 1;
        self.permutation.len()
    }
}
