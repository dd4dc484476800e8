//! Block store: the ordered block list of one document.
//!
//! The `Vec` order is the source of truth; every block's `position` mirrors
//! its index and is rewritten after each structural change, so consumers
//! always see dense positions `0..n-1`. All mutations are synchronous and
//! complete before returning, so no caller can observe an intermediate order.

use std::collections::{HashMap, HashSet};

use quire_types::{
    BlockId, BlockKind, BlockPatch, ContentBlock, SourceMode, SourceRef, UploadHandle,
};

use crate::{DocError, PermutationError, Result};

/// Ordered collection of blocks with stable identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStore {
    /// Blocks in document order.
    blocks: Vec<ContentBlock>,

    /// Active (selected) block, if any.
    selected: Option<BlockId>,

    /// Store version (bumped on any mutation).
    version: u64,
}

impl BlockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from blocks in document order.
    ///
    /// Checks for duplicate IDs and the per-kind caps; positions are
    /// recomputed from list order.
    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Result<Self> {
        let mut store = Self::new();
        for block in blocks {
            store.push(block)?;
        }
        store.version = 0;
        Ok(store)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the store has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get the current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Get a block by ID.
    pub fn get(&self, id: &BlockId) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == *id)
    }

    /// Block IDs in document order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    /// How many blocks of `kind` the store holds.
    pub fn count_of(&self, kind: BlockKind) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).count()
    }

    /// The active block, if any.
    pub fn selected(&self) -> Option<BlockId> {
        self.selected
    }

    /// Make `id` the active block. Returns false if no such block.
    pub fn select(&mut self, id: &BlockId) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(*id);
            true
        } else {
            false
        }
    }

    /// Clear the active block.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn check_capacity(&self, kind: BlockKind) -> Result<()> {
        if let Some(limit) = kind.max_per_document() {
            if self.count_of(kind) >= limit {
                tracing::warn!(%kind, limit, "insert rejected: capacity reached");
                return Err(DocError::Capacity { kind, limit });
            }
        }
        Ok(())
    }

    fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == *id)
    }

    fn renumber(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.position = i as u32;
        }
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Append a new block of `kind` with default fields and select it.
    ///
    /// Rejected with no state change when the kind's cap is reached.
    pub fn insert(&mut self, kind: BlockKind) -> Result<ContentBlock> {
        self.check_capacity(kind)?;
        let block = ContentBlock::with_defaults(kind, self.blocks.len() as u32);
        self.selected = Some(block.id);
        self.blocks.push(block.clone());
        self.touch();
        tracing::debug!(id = ?block.id, %kind, position = block.position, "block inserted");
        Ok(block)
    }

    /// Append an existing block (restore path). Its position is overwritten.
    pub fn push(&mut self, mut block: ContentBlock) -> Result<BlockId> {
        if self.get(&block.id).is_some() {
            return Err(DocError::DuplicateBlock(block.id));
        }
        self.check_capacity(block.kind)?;
        block.position = self.blocks.len() as u32;
        let id = block.id;
        self.blocks.push(block);
        self.touch();
        Ok(id)
    }

    /// Merge `patch` into the block with `id`. Returns false (no-op) if absent.
    pub fn update(&mut self, id: &BlockId, patch: BlockPatch) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == *id) else {
            return false;
        };
        block.apply(patch);
        self.touch();
        tracing::debug!(?id, "block updated");
        true
    }

    /// Remove the block with `id`, clearing selection if it was active.
    pub fn remove(&mut self, id: &BlockId) -> Option<ContentBlock> {
        let idx = self.index_of(id)?;
        let removed = self.blocks.remove(idx);
        if self.selected == Some(*id) {
            self.selected = None;
        }
        self.renumber();
        self.touch();
        tracing::debug!(?id, remaining = self.blocks.len(), "block removed");
        Some(removed)
    }

    /// Reorder to match `order`, which must be a permutation of all current IDs.
    ///
    /// On error the store is unchanged.
    pub fn reorder(&mut self, order: &[BlockId]) -> std::result::Result<(), PermutationError> {
        if order.len() != self.blocks.len() {
            return Err(PermutationError::LengthMismatch {
                expected: self.blocks.len(),
                got: order.len(),
            });
        }

        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) {
                return Err(PermutationError::Duplicate(*id));
            }
            if self.get(id).is_none() {
                return Err(PermutationError::Unknown(*id));
            }
        }

        let rank: HashMap<BlockId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        self.blocks.sort_by_key(|b| rank[&b.id]);
        self.renumber();
        self.touch();
        tracing::debug!(count = order.len(), "blocks reordered");
        Ok(())
    }

    /// Move one block to `to` (clamped to the end). Returns false if absent.
    ///
    /// Convenience for drag-and-drop; goes through [`reorder`](Self::reorder).
    pub fn move_block(&mut self, id: &BlockId, to: usize) -> bool {
        let Some(from) = self.index_of(id) else {
            return false;
        };
        let mut order = self.ids();
        let moved = order.remove(from);
        order.insert(to.min(order.len()), moved);
        self.reorder(&order).is_ok()
    }

    /// Point a block at a local upload handle (`local-upload` mode).
    pub(crate) fn set_pending(&mut self, id: &BlockId, handle: UploadHandle) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == *id) else {
            return false;
        };
        block.source_mode = Some(SourceMode::LocalUpload);
        block.source_ref = Some(SourceRef::Pending(handle));
        self.touch();
        true
    }

    /// Replace pending handles with their durable URLs.
    ///
    /// Returns how many blocks were rewritten.
    pub(crate) fn resolve_uploads(&mut self, resolved: &HashMap<UploadHandle, String>) -> usize {
        let mut count = 0;
        for block in &mut self.blocks {
            let Some(handle) = block.pending_upload() else {
                continue;
            };
            if let Some(url) = resolved.get(&handle) {
                block.source_ref = Some(SourceRef::Url(url.clone()));
                block.source_mode = Some(SourceMode::RemoteUrl);
                count += 1;
            }
        }
        if count > 0 {
            self.touch();
        }
        count
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::seq::SliceRandom;

    fn positions(store: &BlockStore) -> Vec<u32> {
        store.blocks().iter().map(|b| b.position).collect()
    }

    fn assert_dense(store: &BlockStore) {
        let expected: Vec<u32> = (0..store.len() as u32).collect();
        assert_eq!(positions(store), expected);
    }

    #[test]
    fn test_insert_appends_and_selects() {
        let mut store = BlockStore::new();
        let a = store.insert(BlockKind::Heading).unwrap();
        let b = store.insert(BlockKind::Paragraph).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);
        assert_eq!(store.selected(), Some(b.id));
        assert_eq!(store.ids(), vec![a.id, b.id]);
    }

    #[test]
    fn test_sixth_image_rejected() {
        let mut store = BlockStore::new();
        for _ in 0..5 {
            store.insert(BlockKind::Image).unwrap();
        }
        let before = store.clone();

        let err = store.insert(BlockKind::Image).unwrap_err();
        assert_eq!(
            err,
            DocError::Capacity {
                kind: BlockKind::Image,
                limit: 5
            }
        );
        assert_eq!(store.count_of(BlockKind::Image), 5);
        assert_eq!(store, before);
    }

    #[test]
    fn test_video_cap_independent_of_image_cap() {
        let mut store = BlockStore::new();
        for _ in 0..5 {
            store.insert(BlockKind::Image).unwrap();
        }
        for _ in 0..5 {
            store.insert(BlockKind::Video).unwrap();
        }
        assert!(store.insert(BlockKind::Video).is_err());
        // Files are uncapped.
        for _ in 0..10 {
            store.insert(BlockKind::File).unwrap();
        }
        assert_eq!(store.len(), 20);
    }

    #[test]
    fn test_update_merges_and_ignores_unknown() {
        let mut store = BlockStore::new();
        let h = store.insert(BlockKind::Heading).unwrap();

        assert!(store.update(&h.id, BlockPatch::content("Welcome")));
        assert_eq!(store.get(&h.id).unwrap().content, "Welcome");

        let version = store.version();
        assert!(!store.update(&BlockId::new(), BlockPatch::content("nope")));
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_remove_clears_selection_and_renumbers() {
        let mut store = BlockStore::new();
        let a = store.insert(BlockKind::Heading).unwrap();
        let b = store.insert(BlockKind::Paragraph).unwrap();
        let c = store.insert(BlockKind::Link).unwrap();

        store.select(&b.id);
        let removed = store.remove(&b.id).unwrap();
        assert_eq!(removed.id, b.id);
        assert_eq!(store.selected(), None);
        assert_eq!(store.ids(), vec![a.id, c.id]);
        assert_dense(&store);

        // Removing an unselected block keeps the selection.
        store.select(&c.id);
        store.remove(&a.id);
        assert_eq!(store.selected(), Some(c.id));
        assert!(store.remove(&a.id).is_none());
    }

    #[test]
    fn test_reorder_identity_is_noop() {
        let mut store = BlockStore::new();
        for kind in BlockKind::ALL {
            store.insert(kind).unwrap();
        }
        let before = store.blocks().to_vec();
        store.reorder(&store.ids()).unwrap();
        assert_eq!(store.blocks(), before.as_slice());
    }

    #[test]
    fn test_reorder_rejects_bad_permutations() {
        let mut store = BlockStore::new();
        let a = store.insert(BlockKind::Heading).unwrap().id;
        let b = store.insert(BlockKind::Paragraph).unwrap().id;
        let before = store.clone();

        assert_eq!(
            store.reorder(&[a]),
            Err(PermutationError::LengthMismatch { expected: 2, got: 1 })
        );
        assert_eq!(store.reorder(&[a, a]), Err(PermutationError::Duplicate(a)));
        let stranger = BlockId::new();
        assert_eq!(
            store.reorder(&[b, stranger]),
            Err(PermutationError::Unknown(stranger))
        );
        assert_eq!(store, before);
    }

    #[test]
    fn test_move_block() {
        let mut store = BlockStore::new();
        let a = store.insert(BlockKind::Heading).unwrap().id;
        let b = store.insert(BlockKind::Paragraph).unwrap().id;
        let c = store.insert(BlockKind::Link).unwrap().id;

        assert!(store.move_block(&c, 0));
        assert_eq!(store.ids(), vec![c, a, b]);
        assert!(store.move_block(&c, 99));
        assert_eq!(store.ids(), vec![a, b, c]);
        assert!(!store.move_block(&BlockId::new(), 0));
        assert_dense(&store);
    }

    #[test]
    fn test_from_blocks_renumbers_and_checks() {
        let mut blocks: Vec<ContentBlock> = (0..3)
            .map(|_| ContentBlock::with_defaults(BlockKind::Paragraph, 7))
            .collect();
        let store = BlockStore::from_blocks(blocks.clone()).unwrap();
        assert_dense(&store);

        blocks.push(blocks[0].clone());
        assert!(matches!(
            BlockStore::from_blocks(blocks),
            Err(DocError::DuplicateBlock(_))
        ));

        let images: Vec<ContentBlock> = (0..6)
            .map(|i| ContentBlock::with_defaults(BlockKind::Image, i))
            .collect();
        assert!(matches!(
            BlockStore::from_blocks(images),
            Err(DocError::Capacity { .. })
        ));
    }

    #[test]
    fn test_resolve_uploads_rewrites_pending() {
        let mut store = BlockStore::new();
        let file = store.insert(BlockKind::File).unwrap().id;
        let handle = UploadHandle::new();
        assert!(store.set_pending(&file, handle));

        let resolved = HashMap::from([(handle, "https://cdn.example.com/f.pdf".to_string())]);
        assert_eq!(store.resolve_uploads(&resolved), 1);

        let block = store.get(&file).unwrap();
        assert_eq!(block.url(), Some("https://cdn.example.com/f.pdf"));
        assert_eq!(block.source_mode, Some(SourceMode::RemoteUrl));
        assert_eq!(store.resolve_uploads(&resolved), 0);
    }

    // ── Randomized properties ─────────────────────────────────────────

    #[test]
    fn test_positions_stay_dense_under_random_ops() {
        let mut rng = rand::thread_rng();
        let mut store = BlockStore::new();

        for _ in 0..500 {
            match rng.gen_range(0..3) {
                0 | 1 => {
                    let kind = *BlockKind::ALL.choose(&mut rng).unwrap();
                    let _ = store.insert(kind);
                }
                _ => {
                    if let Some(id) = store.ids().choose(&mut rng).copied() {
                        store.remove(&id);
                    }
                }
            }
            assert_dense(&store);
            let unique: HashSet<u32> = positions(&store).into_iter().collect();
            assert_eq!(unique.len(), store.len());
        }
    }

    #[test]
    fn test_reorder_then_inverse_restores_positions() {
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let mut store = BlockStore::new();
            for _ in 0..rng.gen_range(1..20) {
                store.insert(BlockKind::Paragraph).unwrap();
            }
            let original: Vec<(BlockId, u32)> =
                store.blocks().iter().map(|b| (b.id, b.position)).collect();

            let mut shuffled = store.ids();
            shuffled.shuffle(&mut rng);
            store.reorder(&shuffled).unwrap();
            assert_dense(&store);

            // Inverse: original order expressed as a permutation of the shuffled one.
            let inverse: Vec<BlockId> = original.iter().map(|(id, _)| *id).collect();
            store.reorder(&inverse).unwrap();

            let restored: Vec<(BlockId, u32)> =
                store.blocks().iter().map(|b| (b.id, b.position)).collect();
            assert_eq!(restored, original);
        }
    }
}
