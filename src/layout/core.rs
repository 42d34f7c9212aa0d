use crate::block::{Block, BlockId};
use crate::geometry::Span;

/// Placement recorded for one visible block during a layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub id: BlockId,
    pub span: Span,
}

/// Lay blocks out from the right edge of the surface towards the left.
///
/// `blocks` is given in creation order; the walk runs in reverse so the most
/// recently created block sits rightmost. Hidden blocks are skipped without
/// consuming space. For every visible block `place` is called with the block
/// and the right edge it must end at, and returns the measured width (negative
/// widths are treated as zero). The block's `right_edge`/`width` are updated in
/// place and the placements are returned in walk order.
pub fn layout_right_to_left<'a, I, F>(blocks: I, surface_width: i32, mut place: F) -> Vec<Placement>
where
    I: DoubleEndedIterator<Item = &'a mut Block>,
    F: FnMut(&Block, i32) -> i32,
{
    let mut right_cursor = surface_width;
    let mut placements = Vec::new();

    for block in blocks.rev() {
        if block.is_hidden() {
            continue;
        }

        let width = place(block, right_cursor).max(0);
        block.record_placement(right_cursor, width);
        placements.push(Placement {
            id: block.id(),
            span: Span::from_right(right_cursor, width),
        });
        right_cursor = right_cursor.saturating_sub(width);
    }

    placements
}

/// Resolve an x coordinate to the block under it.
///
/// Walks visible blocks in the same order as [`layout_right_to_left`] using the
/// widths recorded by the most recent paint, not a fresh measurement.
pub fn hit_test<'a, I>(blocks: I, surface_width: i32, x: i32) -> Option<BlockId>
where
    I: DoubleEndedIterator<Item = &'a Block>,
{
    let mut right_cursor = surface_width;

    for block in blocks.rev() {
        if block.is_hidden() {
            continue;
        }

        if Span::from_right(right_cursor, block.width()).contains(x) {
            return Some(block.id());
        }
        right_cursor = right_cursor.saturating_sub(block.width());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blocks_with(texts: &[&str]) -> Vec<Block> {
        texts
            .iter()
            .enumerate()
            .map(|(idx, text)| {
                let mut block = Block::new(BlockId::from_raw(idx as u64 + 1));
                block.update_text(text);
                block
            })
            .collect()
    }

    fn widths(text: &str) -> i32 {
        match text {
            "CPU: 5%" => 80,
            "MEM: 10%" => 90,
            other => other.chars().count() as i32 * 10,
        }
    }

    #[test]
    fn newest_block_is_rightmost() {
        let mut blocks = blocks_with(&["CPU: 5%", "MEM: 10%"]);
        let placements = layout_right_to_left(blocks.iter_mut(), 200, |b, _| widths(b.text()));

        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].id, BlockId::from_raw(2));
        assert_eq!(placements[0].span, Span::new(110, 200));
        assert_eq!(placements[1].span, Span::new(30, 110));
        assert_eq!(blocks[0].right_edge(), 110);
        assert_eq!(blocks[0].width(), 80);
        assert_eq!(blocks[1].right_edge(), 200);
    }

    #[test]
    fn place_receives_the_running_right_edge() {
        let mut blocks = blocks_with(&["aa", "bbb"]);
        let mut edges = Vec::new();
        layout_right_to_left(blocks.iter_mut(), 100, |b, right| {
            edges.push(right);
            widths(b.text())
        });
        assert_eq!(edges, vec![100, 70]);
    }

    #[test]
    fn clicks_resolve_against_recorded_widths() {
        let mut blocks = blocks_with(&["CPU: 5%", "MEM: 10%"]);
        layout_right_to_left(blocks.iter_mut(), 200, |b, _| widths(b.text()));

        assert_eq!(hit_test(blocks.iter(), 200, 150), Some(BlockId::from_raw(2)));
        assert_eq!(hit_test(blocks.iter(), 200, 50), Some(BlockId::from_raw(1)));
        assert_eq!(hit_test(blocks.iter(), 200, 10), None);
        assert_eq!(hit_test(blocks.iter(), 200, 200), None);
    }

    #[test]
    fn hidden_blocks_consume_no_space() {
        let mut blocks = blocks_with(&["CPU: 5%", "MEM: 10%", "x"]);
        blocks[2].update_hidden(true);
        layout_right_to_left(blocks.iter_mut(), 200, |b, _| widths(b.text()));

        assert_eq!(blocks[1].right_edge(), 200);
        assert_eq!(blocks[1].width(), 90);
        assert_eq!(blocks[0].right_edge(), 110);
        assert_eq!(hit_test(blocks.iter(), 200, 195), Some(BlockId::from_raw(2)));
    }

    #[test]
    fn hit_test_uses_stale_widths_until_next_paint() {
        let mut blocks = blocks_with(&["CPU: 5%"]);
        layout_right_to_left(blocks.iter_mut(), 200, |b, _| widths(b.text()));
        blocks[0].update_text("a much longer status string");

        assert_eq!(hit_test(blocks.iter(), 200, 125), Some(BlockId::from_raw(1)));
        assert_eq!(hit_test(blocks.iter(), 200, 119), None);
    }

    #[test]
    fn empty_store_never_matches() {
        let blocks: Vec<Block> = Vec::new();
        assert_eq!(hit_test(blocks.iter(), 200, 100), None);
    }

    proptest! {
        #[test]
        fn spans_tile_leftward_from_surface_edge(
            measured in proptest::collection::vec(0i32..120, 0..12),
            surface_width in 0i32..2000,
        ) {
            let mut blocks: Vec<Block> = (0..measured.len())
                .map(|idx| Block::new(BlockId::from_raw(idx as u64 + 1)))
                .collect();
            let mut iter = measured.iter().rev().copied();
            layout_right_to_left(blocks.iter_mut(), surface_width, |_, _| iter.next().unwrap_or(0));

            let mut expected_right = surface_width;
            for block in blocks.iter().rev() {
                prop_assert_eq!(block.right_edge(), expected_right);
                expected_right -= block.width();
            }
        }

        #[test]
        fn every_point_inside_a_span_hits_that_block(
            measured in proptest::collection::vec(1i32..60, 1..10),
            probe in 0i32..800,
        ) {
            let mut blocks: Vec<Block> = (0..measured.len())
                .map(|idx| Block::new(BlockId::from_raw(idx as u64 + 1)))
                .collect();
            let mut iter = measured.iter().rev().copied();
            layout_right_to_left(blocks.iter_mut(), 800, |_, _| iter.next().unwrap_or(0));

            let owner = blocks.iter().find(|b| b.span().contains(probe)).map(|b| b.id());
            prop_assert_eq!(hit_test(blocks.iter(), 800, probe), owner);
        }
    }
}
