use crate::app::record::KeyRecord;

pub const DISPLAY_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub items: Vec<KeyRecord>,
    pub complete: bool,
}

/// Reveals a completed scan to the list pane a slice at a time.
#[derive(Debug, Default)]
pub struct BatchDispatcher {
    pending: Vec<KeyRecord>,
    index: usize,
}

impl BatchDispatcher {
    pub fn reset(&mut self, items: Vec<KeyRecord>) {
        self.pending = items;
        self.index = 0;
    }

    pub fn next_batch(&mut self) -> Batch {
        let end = (self.index + DISPLAY_BATCH_SIZE).min(self.pending.len());
        let items = self.pending[self.index..end].to_vec();
        self.index = end;
        Batch {
            items,
            complete: self.is_complete(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.pending.len()
    }

    pub fn total(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(count: usize) -> Vec<KeyRecord> {
        (0..count)
            .map(|i| KeyRecord::unloaded(format!("key:{}", i)))
            .collect()
    }

    #[test]
    fn batches_concatenate_to_the_full_list() {
        let all = records(123);
        let mut dispatcher = BatchDispatcher::default();
        dispatcher.reset(all.clone());

        let mut emitted = Vec::new();
        let mut flags = Vec::new();
        loop {
            let batch = dispatcher.next_batch();
            flags.push((batch.items.len(), batch.complete));
            emitted.extend(batch.items);
            if batch.complete {
                break;
            }
        }

        assert_eq!(emitted, all);
        assert_eq!(flags, vec![(50, false), (50, false), (23, true)]);
    }

    #[test]
    fn exact_multiple_completes_on_last_full_batch() {
        let mut dispatcher = BatchDispatcher::default();
        dispatcher.reset(records(100));

        assert!(!dispatcher.next_batch().complete);
        let last = dispatcher.next_batch();
        assert_eq!(last.items.len(), 50);
        assert!(last.complete);
    }

    #[test]
    fn empty_list_is_one_complete_empty_batch() {
        let mut dispatcher = BatchDispatcher::default();
        dispatcher.reset(Vec::new());

        let batch = dispatcher.next_batch();
        assert!(batch.items.is_empty());
        assert!(batch.complete);
    }
}
