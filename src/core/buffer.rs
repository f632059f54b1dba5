use crate::core::record::PlayerRecord;
use tracing::warn;

/// Staging area for the entries of whichever category is currently on the board.
/// It only learns its category when it gets committed.
#[derive(Debug)]
pub struct AccumulationBuffer {
    records: Vec<PlayerRecord>,
    // A full board page; a new rank 1 on top of that means a second pass started.
    page_size: usize,
}

impl AccumulationBuffer {
    pub fn new(page_size: usize) -> Self {
        AccumulationBuffer {
            records: Vec::with_capacity(page_size),
            page_size,
        }
    }

    pub fn push(&mut self, record: PlayerRecord) {
        if record.rank == 1 && self.records.len() >= self.page_size {
            warn!(
                "Rank 1 arrived on top of {} buffered entries, discarding the partial pass.",
                self.records.len()
            );
            self.records.clear();
        }
        self.records.push(record);
    }

    /// Hands over the buffered entries and leaves the buffer empty.
    pub fn take(&mut self) -> Vec<PlayerRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }
}
